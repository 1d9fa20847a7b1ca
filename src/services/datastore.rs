//! 数据存储接口
//! 托管后端与本地 SQLite 实现同一套表级操作与认证接口

use crate::error::DatastoreError;
use crate::models::{Category, CategoryRecord, Problem, ProblemRecord, Session};
use crate::services::database::LocalStore;
use crate::services::supabase::SupabaseClient;
use tokio::sync::watch;

/// 表级读写与认证操作
///
/// 列表按 created_at 降序返回。按 id 查找/更新不到记录时返回 `None`，
/// 删除不到记录时返回 `false`，由上层决定是否视为 NotFound。
#[allow(async_fn_in_trait)]
pub trait Datastore {
    async fn list_problems(&self) -> Result<Vec<Problem>, DatastoreError>;
    async fn get_problem(&self, id: &str) -> Result<Option<Problem>, DatastoreError>;
    async fn insert_problem(&self, record: &ProblemRecord) -> Result<Problem, DatastoreError>;
    async fn update_problem(
        &self,
        id: &str,
        record: &ProblemRecord,
    ) -> Result<Option<Problem>, DatastoreError>;
    async fn delete_problem(&self, id: &str) -> Result<bool, DatastoreError>;

    async fn list_categories(&self) -> Result<Vec<Category>, DatastoreError>;
    async fn get_category(&self, id: &str) -> Result<Option<Category>, DatastoreError>;
    async fn insert_category(&self, record: &CategoryRecord) -> Result<Category, DatastoreError>;
    async fn update_category(
        &self,
        id: &str,
        record: &CategoryRecord,
    ) -> Result<Option<Category>, DatastoreError>;
    async fn delete_category(&self, id: &str) -> Result<bool, DatastoreError>;

    /// 查询角色表，判断用户是否为管理员
    async fn is_admin(&self, user_id: &str) -> Result<bool, DatastoreError>;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, DatastoreError>;
    async fn current_session(&self) -> Result<Option<Session>, DatastoreError>;
    async fn sign_out(&self) -> Result<(), DatastoreError>;

    /// 订阅认证状态变化（登录、登出、令牌刷新）
    fn subscribe(&self) -> watch::Receiver<Option<Session>>;
}

/// 当前会话及其变更通知
#[derive(Debug)]
pub struct SessionCell {
    tx: watch::Sender<Option<Session>>,
}

impl SessionCell {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    pub fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    pub fn set(&self, session: Option<Session>) {
        self.tx.send_replace(session);
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }
}

impl Default for SessionCell {
    fn default() -> Self {
        Self::new()
    }
}

/// 运行时选择的后端
pub enum Backend {
    Supabase(SupabaseClient),
    Local(LocalStore),
}

impl Datastore for Backend {
    async fn list_problems(&self) -> Result<Vec<Problem>, DatastoreError> {
        match self {
            Backend::Supabase(c) => c.list_problems().await,
            Backend::Local(s) => s.list_problems().await,
        }
    }

    async fn get_problem(&self, id: &str) -> Result<Option<Problem>, DatastoreError> {
        match self {
            Backend::Supabase(c) => c.get_problem(id).await,
            Backend::Local(s) => s.get_problem(id).await,
        }
    }

    async fn insert_problem(&self, record: &ProblemRecord) -> Result<Problem, DatastoreError> {
        match self {
            Backend::Supabase(c) => c.insert_problem(record).await,
            Backend::Local(s) => s.insert_problem(record).await,
        }
    }

    async fn update_problem(
        &self,
        id: &str,
        record: &ProblemRecord,
    ) -> Result<Option<Problem>, DatastoreError> {
        match self {
            Backend::Supabase(c) => c.update_problem(id, record).await,
            Backend::Local(s) => s.update_problem(id, record).await,
        }
    }

    async fn delete_problem(&self, id: &str) -> Result<bool, DatastoreError> {
        match self {
            Backend::Supabase(c) => c.delete_problem(id).await,
            Backend::Local(s) => s.delete_problem(id).await,
        }
    }

    async fn list_categories(&self) -> Result<Vec<Category>, DatastoreError> {
        match self {
            Backend::Supabase(c) => c.list_categories().await,
            Backend::Local(s) => s.list_categories().await,
        }
    }

    async fn get_category(&self, id: &str) -> Result<Option<Category>, DatastoreError> {
        match self {
            Backend::Supabase(c) => c.get_category(id).await,
            Backend::Local(s) => s.get_category(id).await,
        }
    }

    async fn insert_category(&self, record: &CategoryRecord) -> Result<Category, DatastoreError> {
        match self {
            Backend::Supabase(c) => c.insert_category(record).await,
            Backend::Local(s) => s.insert_category(record).await,
        }
    }

    async fn update_category(
        &self,
        id: &str,
        record: &CategoryRecord,
    ) -> Result<Option<Category>, DatastoreError> {
        match self {
            Backend::Supabase(c) => c.update_category(id, record).await,
            Backend::Local(s) => s.update_category(id, record).await,
        }
    }

    async fn delete_category(&self, id: &str) -> Result<bool, DatastoreError> {
        match self {
            Backend::Supabase(c) => c.delete_category(id).await,
            Backend::Local(s) => s.delete_category(id).await,
        }
    }

    async fn is_admin(&self, user_id: &str) -> Result<bool, DatastoreError> {
        match self {
            Backend::Supabase(c) => c.is_admin(user_id).await,
            Backend::Local(s) => s.is_admin(user_id).await,
        }
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, DatastoreError> {
        match self {
            Backend::Supabase(c) => c.sign_in_with_password(email, password).await,
            Backend::Local(s) => s.sign_in_with_password(email, password).await,
        }
    }

    async fn current_session(&self) -> Result<Option<Session>, DatastoreError> {
        match self {
            Backend::Supabase(c) => c.current_session().await,
            Backend::Local(s) => s.current_session().await,
        }
    }

    async fn sign_out(&self) -> Result<(), DatastoreError> {
        match self {
            Backend::Supabase(c) => c.sign_out().await,
            Backend::Local(s) => s.sign_out().await,
        }
    }

    fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        match self {
            Backend::Supabase(c) => c.subscribe(),
            Backend::Local(s) => s.subscribe(),
        }
    }
}

/// 测试用后端：角色查询总是失败，其余操作交给本地存储
#[cfg(test)]
pub(crate) struct RoleLookupDown(pub LocalStore);

#[cfg(test)]
impl Datastore for RoleLookupDown {
    async fn list_problems(&self) -> Result<Vec<Problem>, DatastoreError> {
        self.0.list_problems().await
    }

    async fn get_problem(&self, id: &str) -> Result<Option<Problem>, DatastoreError> {
        self.0.get_problem(id).await
    }

    async fn insert_problem(&self, record: &ProblemRecord) -> Result<Problem, DatastoreError> {
        self.0.insert_problem(record).await
    }

    async fn update_problem(
        &self,
        id: &str,
        record: &ProblemRecord,
    ) -> Result<Option<Problem>, DatastoreError> {
        self.0.update_problem(id, record).await
    }

    async fn delete_problem(&self, id: &str) -> Result<bool, DatastoreError> {
        self.0.delete_problem(id).await
    }

    async fn list_categories(&self) -> Result<Vec<Category>, DatastoreError> {
        self.0.list_categories().await
    }

    async fn get_category(&self, id: &str) -> Result<Option<Category>, DatastoreError> {
        self.0.get_category(id).await
    }

    async fn insert_category(&self, record: &CategoryRecord) -> Result<Category, DatastoreError> {
        self.0.insert_category(record).await
    }

    async fn update_category(
        &self,
        id: &str,
        record: &CategoryRecord,
    ) -> Result<Option<Category>, DatastoreError> {
        self.0.update_category(id, record).await
    }

    async fn delete_category(&self, id: &str) -> Result<bool, DatastoreError> {
        self.0.delete_category(id).await
    }

    async fn is_admin(&self, _user_id: &str) -> Result<bool, DatastoreError> {
        Err(DatastoreError::Network("role lookup unavailable".to_string()))
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, DatastoreError> {
        self.0.sign_in_with_password(email, password).await
    }

    async fn current_session(&self) -> Result<Option<Session>, DatastoreError> {
        self.0.current_session().await
    }

    async fn sign_out(&self) -> Result<(), DatastoreError> {
        self.0.sign_out().await
    }

    fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.0.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;

    fn session(id: &str) -> Session {
        Session {
            user: User {
                id: id.to_string(),
                email: None,
            },
            access_token: format!("token-{}", id),
            refresh_token: None,
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn test_session_cell_notifies_subscribers() {
        let cell = SessionCell::new();
        let mut rx = cell.subscribe();
        assert!(rx.borrow().is_none());

        cell.set(Some(session("u1")));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().as_ref().map(|s| s.user.id.clone()), Some("u1".to_string()));

        cell.set(None);
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_none());
        assert!(cell.current().is_none());
    }

    #[test]
    fn test_session_cell_set_without_subscribers() {
        let cell = SessionCell::default();
        cell.set(Some(session("u2")));
        assert_eq!(cell.current().unwrap().user.id, "u2");
    }
}
