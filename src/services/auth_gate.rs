//! 管理员访问控制
//! 会话与角色查询决定门禁状态；每次认证状态变化后重新判定，不缓存管理员标记

use crate::error::DatastoreError;
use crate::models::{Session, User};
use crate::routes::Route;
use crate::services::datastore::Datastore;
use crate::services::facade::CatalogFacade;
use log::{debug, warn};
use serde::Serialize;
use tokio::sync::watch;

/// 门禁状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum GateState {
    Unresolved,
    Anonymous,
    AuthenticatedNonAdmin(User),
    AuthenticatedAdmin(User),
}

/// 受保护视图的准入结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Admission {
    /// 仍在加载会话或角色，显示加载占位
    Pending,
    Render,
    Redirect(Route),
}

impl GateState {
    pub fn user(&self) -> Option<&User> {
        match self {
            GateState::AuthenticatedNonAdmin(user) | GateState::AuthenticatedAdmin(user) => Some(user),
            GateState::Unresolved | GateState::Anonymous => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, GateState::AuthenticatedAdmin(_))
    }

    /// 管理员视图的准入判定
    pub fn admit(&self) -> Admission {
        match self {
            GateState::Unresolved => Admission::Pending,
            GateState::Anonymous => Admission::Redirect(Route::SignIn),
            GateState::AuthenticatedNonAdmin(_) => Admission::Redirect(Route::AdminSetup),
            GateState::AuthenticatedAdmin(_) => Admission::Render,
        }
    }

    /// 任意路由的准入判定：管理员路由走 `admit`，角色申请页只要求登录
    pub fn admit_route(&self, route: &Route) -> Admission {
        if route.requires_admin() {
            return self.admit();
        }
        match (route, self) {
            (Route::AdminSetup, GateState::Unresolved) => Admission::Pending,
            (Route::AdminSetup, GateState::Anonymous) => Admission::Redirect(Route::SignIn),
            _ => Admission::Render,
        }
    }
}

/// 门禁：持有最近一次判定结果
pub struct RoleGate {
    state: GateState,
}

impl Default for RoleGate {
    fn default() -> Self {
        Self::new()
    }
}

impl RoleGate {
    pub fn new() -> Self {
        Self {
            state: GateState::Unresolved,
        }
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    /// 重新获取会话与角色
    ///
    /// 角色查询失败时状态落在 AuthenticatedNonAdmin，并把错误返回给调用方展示。
    pub async fn resolve<D: Datastore>(
        &mut self,
        facade: &CatalogFacade<D>,
    ) -> Result<&GateState, DatastoreError> {
        self.state = GateState::Unresolved;

        let session = match facade.current_session().await {
            Ok(session) => session,
            Err(e) => {
                self.state = GateState::Anonymous;
                return Err(e);
            }
        };

        let Some(session) = session else {
            self.state = GateState::Anonymous;
            return Ok(&self.state);
        };

        let is_admin = facade.is_admin(&session.user.id).await;
        match is_admin {
            Ok(true) => self.state = GateState::AuthenticatedAdmin(session.user),
            Ok(false) => self.state = GateState::AuthenticatedNonAdmin(session.user),
            Err(e) => {
                warn!("Role lookup failed for {}: {}", session.user.id, e);
                self.state = GateState::AuthenticatedNonAdmin(session.user);
                return Err(e);
            }
        }

        debug!("Gate resolved to {:?}", self.state);
        Ok(&self.state)
    }

    /// 等待下一次认证状态变化并重新判定；发送端关闭时返回 `None`
    pub async fn next_change<D: Datastore>(
        &mut self,
        facade: &CatalogFacade<D>,
        changes: &mut watch::Receiver<Option<Session>>,
    ) -> Option<Result<&GateState, DatastoreError>> {
        if changes.changed().await.is_err() {
            return None;
        }
        Some(self.resolve(facade).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::database::LocalStore;
    use crate::services::datastore::RoleLookupDown;

    fn facade_with_user(admin: bool) -> (CatalogFacade<LocalStore>, User) {
        let store = LocalStore::open_in_memory().unwrap();
        let user = store.create_user("dev@example.com", "secret").unwrap();
        if admin {
            store.grant_admin(&user.id).unwrap();
        }
        (CatalogFacade::new(store), user)
    }

    #[test]
    fn test_admission_table() {
        let user = User {
            id: "u".to_string(),
            email: None,
        };
        assert_eq!(GateState::Unresolved.admit(), Admission::Pending);
        assert_eq!(
            GateState::Anonymous.admit(),
            Admission::Redirect(Route::SignIn)
        );
        assert_eq!(
            GateState::AuthenticatedNonAdmin(user.clone()).admit(),
            Admission::Redirect(Route::AdminSetup)
        );
        assert_eq!(GateState::AuthenticatedAdmin(user).admit(), Admission::Render);
    }

    #[test]
    fn test_admit_route() {
        let user = User {
            id: "u".to_string(),
            email: None,
        };
        assert_eq!(GateState::Anonymous.admit_route(&Route::Home), Admission::Render);
        assert_eq!(
            GateState::Anonymous.admit_route(&Route::AdminSetup),
            Admission::Redirect(Route::SignIn)
        );
        assert_eq!(
            GateState::AuthenticatedNonAdmin(user.clone()).admit_route(&Route::AdminSetup),
            Admission::Render
        );
        assert_eq!(
            GateState::AuthenticatedNonAdmin(user).admit_route(&Route::AdminNew),
            Admission::Redirect(Route::AdminSetup)
        );
    }

    #[tokio::test]
    async fn test_no_session_resolves_anonymous() {
        let (facade, _) = facade_with_user(true);
        let mut gate = RoleGate::new();
        assert_eq!(gate.state(), &GateState::Unresolved);

        let state = gate.resolve(&facade).await.unwrap();
        assert_eq!(state, &GateState::Anonymous);
        assert_ne!(state.admit(), Admission::Render);
    }

    #[tokio::test]
    async fn test_admin_session_renders() {
        let (facade, user) = facade_with_user(true);
        facade.sign_in("dev@example.com", "secret").await.unwrap();

        let mut gate = RoleGate::new();
        let state = gate.resolve(&facade).await.unwrap();
        assert_eq!(state, &GateState::AuthenticatedAdmin(user));
        assert_eq!(state.admit(), Admission::Render);
    }

    #[tokio::test]
    async fn test_non_admin_session_redirects_to_setup() {
        let (facade, _) = facade_with_user(false);
        facade.sign_in("dev@example.com", "secret").await.unwrap();

        let mut gate = RoleGate::new();
        let state = gate.resolve(&facade).await.unwrap();
        assert!(matches!(state, GateState::AuthenticatedNonAdmin(_)));
        assert_eq!(state.admit(), Admission::Redirect(Route::AdminSetup));
    }

    #[tokio::test]
    async fn test_role_lookup_failure_fails_closed() {
        let store = LocalStore::open_in_memory().unwrap();
        let user = store.create_user("dev@example.com", "secret").unwrap();
        store.grant_admin(&user.id).unwrap();
        let facade = CatalogFacade::new(RoleLookupDown(store));
        facade.sign_in("dev@example.com", "secret").await.unwrap();

        let mut gate = RoleGate::new();
        let err = gate.resolve(&facade).await.unwrap_err();
        assert!(matches!(err, DatastoreError::Network(_)));
        assert_eq!(gate.state(), &GateState::AuthenticatedNonAdmin(user));
        assert!(!gate.state().is_admin());
        assert_eq!(gate.state().admit(), Admission::Redirect(Route::AdminSetup));
    }

    #[tokio::test]
    async fn test_reevaluates_on_auth_change() {
        let (facade, _) = facade_with_user(true);
        let mut changes = facade.subscribe();
        let mut gate = RoleGate::new();
        gate.resolve(&facade).await.unwrap();
        assert_eq!(gate.state(), &GateState::Anonymous);

        facade.sign_in("dev@example.com", "secret").await.unwrap();
        let state = gate.next_change(&facade, &mut changes).await.unwrap().unwrap();
        assert!(state.is_admin());

        facade.sign_out().await.unwrap();
        let state = gate.next_change(&facade, &mut changes).await.unwrap().unwrap();
        assert_eq!(state, &GateState::Anonymous);
    }
}
