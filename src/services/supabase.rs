//! 托管后端客户端
//! 通过 REST（/rest/v1）与认证（/auth/v1）接口访问 problems、categories、user_roles 表

use crate::error::DatastoreError;
use crate::models::{Category, CategoryRecord, Problem, ProblemRecord, Session, User};
use crate::services::datastore::{Datastore, SessionCell};
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use log::{debug, info, warn};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::Duration;

const PROBLEMS_TABLE: &str = "problems";
const CATEGORIES_TABLE: &str = "categories";
const ROLES_TABLE: &str = "user_roles";

/// 客户端配置
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
    pub timeout: Duration,
}

impl SupabaseConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: anon_key.into(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// 错误响应体，兼容 REST 与认证接口的字段命名
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
    code: Option<serde_json::Value>,
}

impl ApiErrorBody {
    fn text(&self, status: StatusCode) -> String {
        self.message
            .clone()
            .or_else(|| self.msg.clone())
            .or_else(|| self.error_description.clone())
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| status.to_string())
    }

    /// Postgres 完整性约束错误码（23xxx）
    fn is_constraint(&self) -> bool {
        matches!(&self.code, Some(serde_json::Value::String(code)) if code.starts_with("23"))
    }
}

#[derive(Debug, Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    email: Option<String>,
}

/// 令牌接口响应
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    expires_at: Option<i64>,
    user: AuthUser,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(at), _) => Utc.timestamp_opt(at, 0).single(),
            (None, Some(secs)) => Some(Utc::now() + ChronoDuration::seconds(secs)),
            (None, None) => None,
        };

        Session {
            user: User {
                id: self.user.id,
                email: self.user.email,
            },
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
        }
    }
}

/// 托管后端客户端
pub struct SupabaseClient {
    http: reqwest::Client,
    rest_url: String,
    auth_url: String,
    anon_key: String,
    session: SessionCell,
}

impl SupabaseClient {
    pub fn new(config: SupabaseConfig) -> Result<Self, DatastoreError> {
        let base = config.url.trim_end_matches('/');
        reqwest::Url::parse(base)
            .map_err(|e| DatastoreError::Network(format!("Invalid backend url {}: {}", base, e)))?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DatastoreError::Network(format!("Failed to build http client: {}", e)))?;

        Ok(Self {
            http,
            rest_url: format!("{}/rest/v1", base),
            auth_url: format!("{}/auth/v1", base),
            anon_key: config.anon_key,
            session: SessionCell::new(),
        })
    }

    fn bearer(&self) -> String {
        self.session
            .current()
            .map(|s| s.access_token)
            .unwrap_or_else(|| self.anon_key.clone())
    }

    /// 构建表级请求，附带 apikey 与 Bearer 令牌
    fn table(&self, method: Method, table: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/{}", self.rest_url, table))
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer())
    }

    fn auth(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/{}", self.auth_url, path))
            .header("apikey", &self.anon_key)
    }

    async fn select_all<T: DeserializeOwned>(&self, table: &str) -> Result<Vec<T>, DatastoreError> {
        let response = self
            .table(Method::GET, table)
            .query(&[("select", "*"), ("order", "created_at.desc")])
            .send()
            .await?;
        read_rows(response).await
    }

    async fn select_by_id<T: DeserializeOwned>(
        &self,
        table: &str,
        id: &str,
    ) -> Result<Option<T>, DatastoreError> {
        let response = self
            .table(Method::GET, table)
            .query(&[("select", "*".to_string()), ("id", format!("eq.{}", id))])
            .send()
            .await?;
        let rows: Vec<T> = read_rows(response).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_row<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        body: &B,
    ) -> Result<T, DatastoreError> {
        let response = self
            .table(Method::POST, table)
            .header("Prefer", "return=representation")
            .json(&[body])
            .send()
            .await?;
        let rows: Vec<T> = read_rows(response).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| DatastoreError::Decode(format!("Insert into {} returned no row", table)))
    }

    async fn update_row<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        id: &str,
        body: &B,
    ) -> Result<Option<T>, DatastoreError> {
        let response = self
            .table(Method::PATCH, table)
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;
        let rows: Vec<T> = read_rows(response).await?;
        Ok(rows.into_iter().next())
    }

    async fn delete_row(&self, table: &str, id: &str) -> Result<bool, DatastoreError> {
        let response = self
            .table(Method::DELETE, table)
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation")
            .send()
            .await?;
        let rows: Vec<serde_json::Value> = read_rows(response).await?;
        Ok(!rows.is_empty())
    }

    /// 使用 refresh token 换取新会话
    async fn refresh(&self, refresh_token: &str) -> Result<Session, DatastoreError> {
        let response = self
            .auth(Method::POST, "token")
            .query(&[("grant_type", "refresh_token")])
            .json(&RefreshGrant { refresh_token })
            .send()
            .await?;
        let token: TokenResponse = check_auth(response).await?.json().await?;
        Ok(token.into_session())
    }
}

/// 非 2xx 响应转换为 DatastoreError
async fn check(response: Response) -> Result<Response, DatastoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body: ApiErrorBody = response.json().await.unwrap_or_default();
    let message = body.text(status);
    warn!("Datastore request failed ({}): {}", status, message);

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DatastoreError::PermissionDenied(message),
        StatusCode::CONFLICT => DatastoreError::Constraint(message),
        _ if body.is_constraint() => DatastoreError::Constraint(message),
        _ => DatastoreError::Rejected {
            status: status.as_u16(),
            message,
        },
    })
}

/// 认证接口把错误凭据报告为 400
async fn check_auth(response: Response) -> Result<Response, DatastoreError> {
    match check(response).await {
        Err(DatastoreError::Rejected { status: 400, message }) => {
            Err(DatastoreError::PermissionDenied(message))
        }
        other => other,
    }
}

async fn read_rows<T: DeserializeOwned>(response: Response) -> Result<Vec<T>, DatastoreError> {
    let response = check(response).await?;
    let rows = response.json::<Vec<T>>().await?;
    Ok(rows)
}

/// 查询某用户 admin 角色行的过滤参数
fn admin_role_query(user_id: &str) -> [(&'static str, String); 3] {
    [
        ("select", "role".to_string()),
        ("user_id", format!("eq.{}", user_id)),
        ("role", "eq.admin".to_string()),
    ]
}

impl Datastore for SupabaseClient {
    async fn list_problems(&self) -> Result<Vec<Problem>, DatastoreError> {
        let problems: Vec<Problem> = self.select_all(PROBLEMS_TABLE).await?;
        debug!("Fetched {} problems", problems.len());
        Ok(problems)
    }

    async fn get_problem(&self, id: &str) -> Result<Option<Problem>, DatastoreError> {
        self.select_by_id(PROBLEMS_TABLE, id).await
    }

    async fn insert_problem(&self, record: &ProblemRecord) -> Result<Problem, DatastoreError> {
        self.insert_row(PROBLEMS_TABLE, record).await
    }

    async fn update_problem(
        &self,
        id: &str,
        record: &ProblemRecord,
    ) -> Result<Option<Problem>, DatastoreError> {
        self.update_row(PROBLEMS_TABLE, id, record).await
    }

    async fn delete_problem(&self, id: &str) -> Result<bool, DatastoreError> {
        self.delete_row(PROBLEMS_TABLE, id).await
    }

    async fn list_categories(&self) -> Result<Vec<Category>, DatastoreError> {
        self.select_all(CATEGORIES_TABLE).await
    }

    async fn get_category(&self, id: &str) -> Result<Option<Category>, DatastoreError> {
        self.select_by_id(CATEGORIES_TABLE, id).await
    }

    async fn insert_category(&self, record: &CategoryRecord) -> Result<Category, DatastoreError> {
        self.insert_row(CATEGORIES_TABLE, record).await
    }

    async fn update_category(
        &self,
        id: &str,
        record: &CategoryRecord,
    ) -> Result<Option<Category>, DatastoreError> {
        self.update_row(CATEGORIES_TABLE, id, record).await
    }

    async fn delete_category(&self, id: &str) -> Result<bool, DatastoreError> {
        self.delete_row(CATEGORIES_TABLE, id).await
    }

    async fn is_admin(&self, user_id: &str) -> Result<bool, DatastoreError> {
        let response = self
            .table(Method::GET, ROLES_TABLE)
            .query(&admin_role_query(user_id))
            .send()
            .await?;
        // 只关心是否存在匹配行
        let rows: Vec<serde_json::Value> = read_rows(response).await?;
        Ok(!rows.is_empty())
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, DatastoreError> {
        let response = self
            .auth(Method::POST, "token")
            .query(&[("grant_type", "password")])
            .json(&PasswordGrant { email, password })
            .send()
            .await?;
        let token: TokenResponse = check_auth(response).await?.json().await?;

        let session = token.into_session();
        self.session.set(Some(session.clone()));
        info!("Signed in as {}", session.user.id);
        Ok(session)
    }

    /// 返回当前会话；过期时尝试刷新，刷新失败视为会话结束
    async fn current_session(&self) -> Result<Option<Session>, DatastoreError> {
        let Some(session) = self.session.current() else {
            return Ok(None);
        };

        if !session.is_expired(Utc::now()) {
            return Ok(Some(session));
        }

        let Some(refresh_token) = session.refresh_token.as_deref() else {
            info!("Session for {} expired", session.user.id);
            self.session.set(None);
            return Ok(None);
        };

        match self.refresh(refresh_token).await {
            Ok(refreshed) => {
                debug!("Refreshed session for {}", refreshed.user.id);
                self.session.set(Some(refreshed.clone()));
                Ok(Some(refreshed))
            }
            Err(DatastoreError::PermissionDenied(message)) => {
                info!("Session refresh refused: {}", message);
                self.session.set(None);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// 本地会话总是清除；远端登出失败时返回错误
    async fn sign_out(&self) -> Result<(), DatastoreError> {
        let Some(session) = self.session.current() else {
            return Ok(());
        };
        self.session.set(None);

        let response = self
            .auth(Method::POST, "logout")
            .bearer_auth(&session.access_token)
            .send()
            .await?;
        check(response).await?;

        info!("Signed out {}", session.user.id);
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.session.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_base_url() {
        let result = SupabaseClient::new(SupabaseConfig::new("not a url", "key"));
        assert!(matches!(result, Err(DatastoreError::Network(_))));
    }

    #[test]
    fn test_endpoints_strip_trailing_slash() {
        let client = SupabaseClient::new(SupabaseConfig::new("https://abc.supabase.co/", "key")).unwrap();
        assert_eq!(client.rest_url, "https://abc.supabase.co/rest/v1");
        assert_eq!(client.auth_url, "https://abc.supabase.co/auth/v1");
        assert_eq!(client.bearer(), "key");
    }

    #[test]
    fn test_problem_row_decodes() {
        let json = r#"[{
            "id": "0b6f7c3e-2f55-4a8e-9d4e-1f0c2a7b9e11",
            "title": "Two Sum",
            "description": "Find two numbers.",
            "solution": "function twoSum() {}",
            "explanation": "Hash map.",
            "difficulty": "Easy",
            "category": null,
            "reference_link": "https://leetcode.com/problems/two-sum/",
            "youtube_explanation_link": null,
            "created_at": "2025-01-05T10:20:30.123456+00:00"
        }]"#;
        let rows: Vec<Problem> = serde_json::from_str(json).unwrap();
        assert_eq!(rows[0].title, "Two Sum");
        assert_eq!(rows[0].category, None);
        assert_eq!(rows[0].created_at.timestamp(), 1736072430);
    }

    #[test]
    fn test_token_response_into_session() {
        let json = r#"{
            "access_token": "jwt",
            "refresh_token": "refresh",
            "expires_in": 3600,
            "expires_at": 1736072430,
            "token_type": "bearer",
            "user": {"id": "user-1", "email": "a@b.c", "role": "authenticated"}
        }"#;
        let token: TokenResponse = serde_json::from_str(json).unwrap();
        let session = token.into_session();
        assert_eq!(session.user.id, "user-1");
        assert_eq!(session.refresh_token.as_deref(), Some("refresh"));
        assert_eq!(session.expires_at.unwrap().timestamp(), 1736072430);
    }

    #[test]
    fn test_error_body_text_and_constraint() {
        let body: ApiErrorBody = serde_json::from_str(
            r#"{"code":"23505","message":"duplicate key value violates unique constraint"}"#,
        )
        .unwrap();
        assert!(body.is_constraint());
        assert_eq!(
            body.text(StatusCode::BAD_REQUEST),
            "duplicate key value violates unique constraint"
        );

        let auth: ApiErrorBody = serde_json::from_str(
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        )
        .unwrap();
        assert!(!auth.is_constraint());
        assert_eq!(auth.text(StatusCode::BAD_REQUEST), "Invalid login credentials");

        let numeric: ApiErrorBody =
            serde_json::from_str(r#"{"code":400,"msg":"bad"}"#).unwrap();
        assert!(!numeric.is_constraint());
        assert_eq!(numeric.text(StatusCode::BAD_REQUEST), "bad");
    }

    #[test]
    fn test_admin_role_lookup_filters_and_rows() {
        let query = admin_role_query("user-1");
        assert_eq!(query[1], ("user_id", "eq.user-1".to_string()));
        assert_eq!(query[2], ("role", "eq.admin".to_string()));

        let rows: Vec<serde_json::Value> =
            serde_json::from_str(r#"[{"role":"admin","user_id":"user-1"}]"#).unwrap();
        assert_eq!(rows.len(), 1);
        let rows: Vec<serde_json::Value> = serde_json::from_str("[]").unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_error() {
        let mut config = SupabaseConfig::new("http://127.0.0.1:9", "key");
        config.timeout = Duration::from_secs(2);
        let client = SupabaseClient::new(config).unwrap();

        let err = client.list_problems().await.unwrap_err();
        assert!(matches!(err, DatastoreError::Network(_)));
        let err = client.is_admin("user-1").await.unwrap_err();
        assert!(matches!(err, DatastoreError::Network(_)));
        assert!(client.current_session().await.unwrap().is_none());
    }
}
