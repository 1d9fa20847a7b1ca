//! 运行配置
//! 全部来自环境变量，未设置的项使用默认值并记录日志

use crate::services::supabase::SupabaseConfig;
use crate::utils::get_database_path;
use log::{info, LevelFilter};
use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} is required when CODEGRID_BACKEND=supabase")]
    Missing { key: &'static str },

    #[error("Invalid {key} value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// 后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    Supabase,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(BackendKind::Local),
            "supabase" => Ok(BackendKind::Supabase),
            other => Err(format!("expected 'local' or 'supabase', got '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub backend: BackendKind,
    pub supabase: Option<SupabaseConfig>,
    pub db_path: PathBuf,
    pub log_level: LevelFilter,
    pub log_file: Option<PathBuf>,
    /// 启动时自动登录使用的账号
    pub credentials: Option<(String, String)>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 从任意键值来源读取，便于测试
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend: BackendKind = try_load(&lookup, "CODEGRID_BACKEND", "local")?;
        let timeout_secs: u64 = try_load(&lookup, "CODEGRID_HTTP_TIMEOUT_SECS", "30")?;
        let log_level: LevelFilter = try_load(&lookup, "CODEGRID_LOG", "info")?;

        let supabase = match backend {
            BackendKind::Local => None,
            BackendKind::Supabase => {
                let mut config = SupabaseConfig::new(
                    required(&lookup, "SUPABASE_URL")?,
                    required(&lookup, "SUPABASE_ANON_KEY")?,
                );
                config.timeout = Duration::from_secs(timeout_secs);
                Some(config)
            }
        };

        let db_path = lookup("CODEGRID_DB_PATH")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let path = get_database_path();
                info!("CODEGRID_DB_PATH not set, using default: {}", path.display());
                path
            });

        let log_file = lookup("CODEGRID_LOG_FILE")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let credentials = match (lookup("CODEGRID_EMAIL"), lookup("CODEGRID_PASSWORD")) {
            (Some(email), Some(password)) if !email.trim().is_empty() => Some((email, password)),
            _ => None,
        };

        Ok(Self {
            backend,
            supabase,
            db_path,
            log_level,
            log_file,
            credentials,
        })
    }
}

fn required<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing { key })
}

fn try_load<F, T>(lookup: &F, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    let value = lookup(key).unwrap_or_else(|| {
        info!("{} not set, using default: {}", key, default);
        default.to_string()
    });

    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: value.clone(),
        reason: e.to_string(),
    })
}
