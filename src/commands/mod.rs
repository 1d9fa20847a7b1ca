// 视图命令模块
// 每个页面动作对应一个异步命令；错误统一转换为提示消息，并可附带跳转路由

pub mod auth;
pub mod categories;
pub mod problems;

use crate::error::{AppError, DatastoreError};
use crate::models::User;
use crate::routes::Route;
use crate::services::auth_gate::{Admission, RoleGate};
use crate::services::datastore::Datastore;
use crate::services::facade::CatalogFacade;
use log::{error, warn};
use serde::Serialize;

pub use auth::{admin_setup_info, sign_in, sign_out, AdminSetupInfo, Credentials};

pub use categories::{delete_category, list_categories, submit_category};

pub use problems::{
    admin_dashboard,
    delete_problem,
    load_category_listing,
    load_listing,
    load_problem_detail,
    load_problem_form,
    submit_problem,
    AdminDashboard,
    CategoryPage,
    ListingPage,
    ListingQuery,
};

/// 命令共享状态
pub struct AppState<D> {
    pub facade: CatalogFacade<D>,
}

impl<D: Datastore> AppState<D> {
    pub fn new(store: D) -> Self {
        Self {
            facade: CatalogFacade::new(store),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NotificationVariant {
    Default,
    Destructive,
}

/// 短暂显示的提示消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub variant: NotificationVariant,
}

impl Notification {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: NotificationVariant::Default,
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: NotificationVariant::Destructive,
        }
    }

    pub fn is_error(&self) -> bool {
        self.variant == NotificationVariant::Destructive
    }
}

/// 写操作成功的结果
#[derive(Debug, Clone, Serialize)]
pub struct Completed<T> {
    pub value: T,
    pub notification: Notification,
    pub redirect: Option<Route>,
}

/// 命令失败：提示消息与可选的跳转
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandFailure {
    pub notification: Notification,
    pub redirect: Option<Route>,
}

impl CommandFailure {
    pub fn new(notification: Notification) -> Self {
        Self {
            notification,
            redirect: None,
        }
    }

    pub fn redirect_to(mut self, route: Route) -> Self {
        self.redirect = Some(route);
        self
    }

    /// 读取失败：数据存储错误只显示固定文案，详细原因写日志
    pub fn load_failed(err: AppError, description: &str) -> Self {
        match err {
            AppError::NotFound(_) => Self::from_error(err, description),
            other => {
                error!("{}: {}", description, other);
                Self::new(Notification::error("Error", description))
            }
        }
    }

    /// 写入失败：显示具体原因，原因为空时使用 `fallback`
    pub fn from_error(err: AppError, fallback: &str) -> Self {
        let notification = match &err {
            AppError::Validation(v) => Notification::error("Validation Error", v.message.clone()),
            AppError::NotFound(n) if n.entity == "problem" => {
                Notification::error("Problem not found", "The requested problem does not exist")
            }
            AppError::NotFound(_) => {
                Notification::error("Category not found", "The requested category does not exist")
            }
            AppError::Datastore(e) => {
                warn!("{}: {}", fallback, e);
                Notification::error("Error", datastore_message(e, fallback))
            }
        };
        Self::new(notification)
    }
}

impl From<AppError> for CommandFailure {
    fn from(err: AppError) -> Self {
        Self::from_error(err, "Something went wrong")
    }
}

impl From<DatastoreError> for CommandFailure {
    fn from(err: DatastoreError) -> Self {
        AppError::from(err).into()
    }
}

fn datastore_message(err: &DatastoreError, fallback: &str) -> String {
    let message = match err {
        DatastoreError::Network(m)
        | DatastoreError::PermissionDenied(m)
        | DatastoreError::Constraint(m)
        | DatastoreError::Decode(m)
        | DatastoreError::Storage(m) => m.as_str(),
        DatastoreError::Rejected { message, .. } => message.as_str(),
    };
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message.to_string()
    }
}

pub type CommandResult<T> = Result<T, CommandFailure>;

/// 管理员视图的守卫：判定门禁，非管理员返回对应跳转
pub async fn require_admin<D: Datastore>(state: &AppState<D>) -> CommandResult<User> {
    let mut gate = RoleGate::new();
    let resolved = gate.resolve(&state.facade).await.map(|_| ());

    if let Err(e) = resolved {
        let failure = CommandFailure::from_error(e.into(), "Failed to check admin role");
        return Err(match gate.state().user() {
            Some(_) => failure.redirect_to(Route::AdminSetup),
            None => failure.redirect_to(Route::SignIn),
        });
    }

    match gate.state().admit() {
        Admission::Render => match gate.state().user() {
            Some(user) => Ok(user.clone()),
            None => Err(CommandFailure::new(Notification::error(
                "Error",
                "Admin session has no user",
            ))),
        },
        Admission::Redirect(route) => Err(CommandFailure::new(Notification::error(
            "Admin access required",
            "Sign in with an admin account to continue",
        ))
        .redirect_to(route)),
        Admission::Pending => Err(CommandFailure::new(Notification::error(
            "Error",
            "Session is still loading",
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{NotFoundError, ValidationError};
    use crate::services::database::LocalStore;
    use crate::services::datastore::RoleLookupDown;

    #[test]
    fn test_validation_failure_uses_field_message() {
        let failure = CommandFailure::from(AppError::from(ValidationError::new(
            "title",
            "Title is required",
        )));
        assert_eq!(failure.notification.title, "Validation Error");
        assert_eq!(failure.notification.description, "Title is required");
        assert!(failure.notification.is_error());
        assert_eq!(failure.redirect, None);
    }

    #[test]
    fn test_load_failure_hides_datastore_detail() {
        let err = AppError::from(DatastoreError::Network("connection reset".to_string()));
        let failure = CommandFailure::load_failed(err, "Failed to load problems");
        assert_eq!(failure.notification.description, "Failed to load problems");

        let missing = CommandFailure::load_failed(NotFoundError::problem("x").into(), "Failed to load problem");
        assert_eq!(missing.notification.title, "Problem not found");
    }

    #[test]
    fn test_write_failure_falls_back_on_empty_message() {
        let err = AppError::from(DatastoreError::Storage(String::new()));
        let failure = CommandFailure::from_error(err, "Failed to save problem");
        assert_eq!(failure.notification.description, "Failed to save problem");

        let err = AppError::from(DatastoreError::Constraint("duplicate key".to_string()));
        let failure = CommandFailure::from_error(err, "Failed to save category");
        assert_eq!(failure.notification.description, "duplicate key");
    }

    #[tokio::test]
    async fn test_require_admin_redirects() {
        let store = LocalStore::open_in_memory().unwrap();
        let user = store.create_user("ada@example.com", "pw").unwrap();
        let state = AppState::new(store);

        let anonymous = require_admin(&state).await.unwrap_err();
        assert_eq!(anonymous.redirect, Some(Route::SignIn));

        state.facade.sign_in("ada@example.com", "pw").await.unwrap();
        let non_admin = require_admin(&state).await.unwrap_err();
        assert_eq!(non_admin.redirect, Some(Route::AdminSetup));

        state.facade.store().grant_admin(&user.id).unwrap();
        assert_eq!(require_admin(&state).await.unwrap(), user);
    }

    #[tokio::test]
    async fn test_require_admin_when_role_lookup_fails() {
        let store = LocalStore::open_in_memory().unwrap();
        let user = store.create_user("ada@example.com", "pw").unwrap();
        store.grant_admin(&user.id).unwrap();
        let state = AppState::new(RoleLookupDown(store));

        let anonymous = require_admin(&state).await.unwrap_err();
        assert_eq!(anonymous.redirect, Some(Route::SignIn));

        state.facade.sign_in("ada@example.com", "pw").await.unwrap();
        let failure = require_admin(&state).await.unwrap_err();
        assert_eq!(failure.redirect, Some(Route::AdminSetup));
        assert_eq!(failure.notification.description, "role lookup unavailable");
        assert!(failure.notification.is_error());
    }
}
