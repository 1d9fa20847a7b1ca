// 本地数据库服务模块
// 使用 SQLite 实现与托管后端相同的表结构，供离线开发与测试使用

use crate::error::DatastoreError;
use crate::models::{Category, CategoryRecord, Difficulty, Problem, ProblemRecord, Session, User};
use crate::services::datastore::{Datastore, SessionCell};
use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, info};
use rusqlite::{Connection, OptionalExtension, Row};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use uuid::Uuid;

const PROBLEM_COLUMNS: &str = "id, title, description, solution, explanation, difficulty, category,
     reference_link, youtube_explanation_link, created_at";

const CATEGORY_COLUMNS: &str = "id, name, image_url, created_at";

/// 本地数据库
pub struct LocalStore {
    pool: Arc<Mutex<Connection>>,
    db_path: Option<PathBuf>,
    session: SessionCell,
}

impl LocalStore {
    /// 打开（必要时创建）数据库文件
    pub fn open(db_path: &Path) -> Result<Self, DatastoreError> {
        // 确保数据目录存在
        if let Some(parent) = db_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    DatastoreError::Storage(format!("Failed to create data dir: {}", e))
                })?;
            }
        }

        let conn = Connection::open(db_path)?;
        let store = Self {
            pool: Arc::new(Mutex::new(conn)),
            db_path: Some(db_path.to_path_buf()),
            session: SessionCell::new(),
        };

        store.initialize()?;
        info!("Opened local store at {}", db_path.display());
        Ok(store)
    }

    /// 内存数据库，测试用
    pub fn open_in_memory() -> Result<Self, DatastoreError> {
        let store = Self {
            pool: Arc::new(Mutex::new(Connection::open_in_memory()?)),
            db_path: None,
            session: SessionCell::new(),
        };

        store.initialize()?;
        Ok(store)
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DatastoreError> {
        self.pool
            .lock()
            .map_err(|e| DatastoreError::Storage(format!("Connection lock poisoned: {}", e)))
    }

    /// 初始化数据库表结构
    pub fn initialize(&self) -> Result<(), DatastoreError> {
        let conn = self.conn()?;

        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS problems (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL CHECK(length(title) BETWEEN 1 AND 200),
                description TEXT NOT NULL,
                solution TEXT NOT NULL,
                explanation TEXT NOT NULL,
                difficulty TEXT NOT NULL CHECK(difficulty IN ('Easy', 'Medium', 'Hard')),
                category TEXT,
                reference_link TEXT,
                youtube_explanation_link TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_problems_created_at ON problems(created_at);
            CREATE INDEX IF NOT EXISTS idx_problems_category ON problems(category);

            CREATE TABLE IF NOT EXISTS categories (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE CHECK(length(name) > 0),
                image_url TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS user_roles (
                user_id TEXT NOT NULL,
                role TEXT NOT NULL,
                PRIMARY KEY (user_id, role),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            ",
        )?;

        Ok(())
    }

    // ==================== 用户与角色 ====================

    /// 注册本地用户
    pub fn create_user(&self, email: &str, password: &str) -> Result<User, DatastoreError> {
        let conn = self.conn()?;
        let id = Uuid::new_v4().to_string();

        conn.execute(
            "INSERT INTO users (id, email, password_hash, created_at) VALUES (?, ?, ?, ?)",
            rusqlite::params![id, email, hash_password(&id, password), timestamp(Utc::now())],
        )?;

        info!("Created local user {}", id);
        Ok(User {
            id,
            email: Some(email.to_string()),
        })
    }

    /// 授予管理员角色
    pub fn grant_admin(&self, user_id: &str) -> Result<(), DatastoreError> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT OR IGNORE INTO user_roles (user_id, role) VALUES (?, 'admin')",
            rusqlite::params![user_id],
        )?;

        info!("Granted admin role to {}", user_id);
        Ok(())
    }

    // ==================== 辅助方法 ====================

    fn select_problem(conn: &Connection, id: &str) -> Result<Option<Problem>, DatastoreError> {
        let sql = format!("SELECT {} FROM problems WHERE id = ?", PROBLEM_COLUMNS);
        let problem = conn
            .query_row(&sql, rusqlite::params![id], |row| Self::row_to_problem(row))
            .optional()?;
        Ok(problem)
    }

    fn select_category(conn: &Connection, id: &str) -> Result<Option<Category>, DatastoreError> {
        let sql = format!("SELECT {} FROM categories WHERE id = ?", CATEGORY_COLUMNS);
        let category = conn
            .query_row(&sql, rusqlite::params![id], |row| Self::row_to_category(row))
            .optional()?;
        Ok(category)
    }

    /// 从数据库行转换为 Problem
    fn row_to_problem(row: &Row) -> Result<Problem, rusqlite::Error> {
        let difficulty: String = row.get(5)?;
        Ok(Problem {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            solution: row.get(3)?,
            explanation: row.get(4)?,
            difficulty: difficulty.parse::<Difficulty>().map_err(|e: String| {
                rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, e.into())
            })?,
            category: row.get(6)?,
            reference_link: row.get(7)?,
            youtube_explanation_link: row.get(8)?,
            created_at: parse_timestamp(row, 9)?,
        })
    }

    /// 从数据库行转换为 Category
    fn row_to_category(row: &Row) -> Result<Category, rusqlite::Error> {
        Ok(Category {
            id: row.get(0)?,
            name: row.get(1)?,
            image_url: row.get(2)?,
            created_at: parse_timestamp(row, 3)?,
        })
    }
}

/// 定长时间戳，保证按字符串排序与时间顺序一致
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(row: &Row, idx: usize) -> Result<DateTime<Utc>, rusqlite::Error> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl Datastore for LocalStore {
    // ==================== 题目 CRUD ====================

    async fn list_problems(&self) -> Result<Vec<Problem>, DatastoreError> {
        let conn = self.conn()?;

        let sql = format!(
            "SELECT {} FROM problems ORDER BY created_at DESC, rowid DESC",
            PROBLEM_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| Self::row_to_problem(row))?;

        let mut problems = Vec::new();
        for row in rows {
            problems.push(row?);
        }

        debug!("Listed {} problems", problems.len());
        Ok(problems)
    }

    async fn get_problem(&self, id: &str) -> Result<Option<Problem>, DatastoreError> {
        let conn = self.conn()?;
        Self::select_problem(&conn, id)
    }

    async fn insert_problem(&self, record: &ProblemRecord) -> Result<Problem, DatastoreError> {
        let conn = self.conn()?;
        let id = Uuid::new_v4().to_string();

        conn.execute(
            "INSERT INTO problems
             (id, title, description, solution, explanation, difficulty, category,
              reference_link, youtube_explanation_link, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            rusqlite::params![
                id,
                record.title,
                record.description,
                record.solution,
                record.explanation,
                record.difficulty.as_str(),
                record.category,
                record.reference_link,
                record.youtube_explanation_link,
                timestamp(Utc::now()),
            ],
        )?;

        Self::select_problem(&conn, &id)?
            .ok_or_else(|| DatastoreError::Storage(format!("Inserted problem {} vanished", id)))
    }

    async fn update_problem(
        &self,
        id: &str,
        record: &ProblemRecord,
    ) -> Result<Option<Problem>, DatastoreError> {
        let conn = self.conn()?;

        let changed = conn.execute(
            "UPDATE problems SET
                title = ?, description = ?, solution = ?, explanation = ?, difficulty = ?,
                category = ?, reference_link = ?, youtube_explanation_link = ?
             WHERE id = ?",
            rusqlite::params![
                record.title,
                record.description,
                record.solution,
                record.explanation,
                record.difficulty.as_str(),
                record.category,
                record.reference_link,
                record.youtube_explanation_link,
                id,
            ],
        )?;

        if changed == 0 {
            return Ok(None);
        }
        Self::select_problem(&conn, id)
    }

    async fn delete_problem(&self, id: &str) -> Result<bool, DatastoreError> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM problems WHERE id = ?", rusqlite::params![id])?;
        Ok(deleted > 0)
    }

    // ==================== 分类 CRUD ====================

    async fn list_categories(&self) -> Result<Vec<Category>, DatastoreError> {
        let conn = self.conn()?;

        let sql = format!(
            "SELECT {} FROM categories ORDER BY created_at DESC, rowid DESC",
            CATEGORY_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| Self::row_to_category(row))?;

        let mut categories = Vec::new();
        for row in rows {
            categories.push(row?);
        }

        Ok(categories)
    }

    async fn get_category(&self, id: &str) -> Result<Option<Category>, DatastoreError> {
        let conn = self.conn()?;
        Self::select_category(&conn, id)
    }

    async fn insert_category(&self, record: &CategoryRecord) -> Result<Category, DatastoreError> {
        let conn = self.conn()?;
        let id = Uuid::new_v4().to_string();

        conn.execute(
            "INSERT INTO categories (id, name, image_url, created_at) VALUES (?, ?, ?, ?)",
            rusqlite::params![id, record.name, record.image_url, timestamp(Utc::now())],
        )?;

        Self::select_category(&conn, &id)?
            .ok_or_else(|| DatastoreError::Storage(format!("Inserted category {} vanished", id)))
    }

    async fn update_category(
        &self,
        id: &str,
        record: &CategoryRecord,
    ) -> Result<Option<Category>, DatastoreError> {
        let conn = self.conn()?;

        let changed = conn.execute(
            "UPDATE categories SET name = ?, image_url = ? WHERE id = ?",
            rusqlite::params![record.name, record.image_url, id],
        )?;

        if changed == 0 {
            return Ok(None);
        }
        Self::select_category(&conn, id)
    }

    async fn delete_category(&self, id: &str) -> Result<bool, DatastoreError> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM categories WHERE id = ?", rusqlite::params![id])?;
        Ok(deleted > 0)
    }

    // ==================== 认证 ====================

    async fn is_admin(&self, user_id: &str) -> Result<bool, DatastoreError> {
        let conn = self.conn()?;

        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM user_roles WHERE user_id = ? AND role = 'admin'",
                rusqlite::params![user_id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(found.is_some())
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, DatastoreError> {
        let user = {
            let conn = self.conn()?;
            let row: Option<(String, String)> = conn
                .query_row(
                    "SELECT id, password_hash FROM users WHERE email = ?",
                    rusqlite::params![email],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            match row {
                Some((id, stored)) if stored == hash_password(&id, password) => User {
                    id,
                    email: Some(email.to_string()),
                },
                _ => {
                    return Err(DatastoreError::PermissionDenied(
                        "Invalid login credentials".to_string(),
                    ))
                }
            }
        };

        let session = Session {
            user,
            access_token: Uuid::new_v4().to_string(),
            refresh_token: None,
            expires_at: None,
        };

        self.session.set(Some(session.clone()));
        info!("Signed in local user {}", session.user.id);
        Ok(session)
    }

    async fn current_session(&self) -> Result<Option<Session>, DatastoreError> {
        Ok(self.session.current())
    }

    async fn sign_out(&self) -> Result<(), DatastoreError> {
        self.session.set(None);
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.session.subscribe()
    }
}
