//! CodeGrid：编程面试题目录
//!
//! 公开浏览题目、按分类查看详情，管理员维护题目与分类。
//! 数据存储可以是托管的 Supabase 后端，也可以是本地 SQLite 文件。

pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

pub use error::{AppError, AppResult, DatastoreError, NotFoundError, ValidationError};
pub use models::{Category, Difficulty, Problem, ProblemForm, Session, User};
pub use routes::Route;
