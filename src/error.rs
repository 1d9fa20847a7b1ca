//! 错误类型
//! 校验错误、数据存储错误、记录不存在三类，统一汇总到 AppError

use serde::Serialize;
use thiserror::Error;

/// 表单校验失败，只报告第一个出错的字段
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// 远端（或本地）数据存储调用失败
#[derive(Debug, Error)]
pub enum DatastoreError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<reqwest::Error> for DatastoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DatastoreError::Decode(err.to_string())
        } else {
            DatastoreError::Network(err.to_string())
        }
    }
}

impl From<rusqlite::Error> for DatastoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ref code, _)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                DatastoreError::Constraint(err.to_string())
            }
            other => DatastoreError::Storage(other.to_string()),
        }
    }
}

/// 请求的记录不存在
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{entity} not found: {key}")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub key: String,
}

impl NotFoundError {
    pub fn problem(key: impl Into<String>) -> Self {
        Self {
            entity: "problem",
            key: key.into(),
        }
    }

    pub fn category(key: impl Into<String>) -> Self {
        Self {
            entity: "category",
            key: key.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Datastore(#[from] DatastoreError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),
}

pub type AppResult<T> = Result<T, AppError>;
