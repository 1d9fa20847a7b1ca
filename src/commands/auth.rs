// 认证命令模块
// 登录、登出与管理员角色申请页

use super::{AppState, CommandFailure, CommandResult, Completed, Notification};
use crate::models::User;
use crate::routes::Route;
use crate::services::auth_gate::{GateState, RoleGate};
use crate::services::datastore::Datastore;
use log::info;
use serde::{Deserialize, Serialize};

/// 登录表单
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// 角色申请页：展示用户 id 与授予管理员角色所需的 SQL
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminSetupInfo {
    pub user_id: String,
    pub email: Option<String>,
    pub already_admin: bool,
    pub grant_sql: String,
}

impl AdminSetupInfo {
    fn new(user: &User, already_admin: bool) -> Self {
        Self {
            user_id: user.id.clone(),
            email: user.email.clone(),
            already_admin,
            grant_sql: grant_admin_sql(&user.id),
        }
    }
}

/// 运维人员在后端执行的授权语句
pub fn grant_admin_sql(user_id: &str) -> String {
    format!(
        "INSERT INTO public.user_roles (user_id, role) VALUES ('{}', 'admin');",
        user_id.replace('\'', "''")
    )
}

/// 邮箱密码登录，成功后进入管理后台
pub async fn sign_in<D: Datastore>(
    credentials: &Credentials,
    state: &AppState<D>,
) -> CommandResult<Completed<User>> {
    if credentials.email.trim().is_empty() || credentials.password.is_empty() {
        return Err(CommandFailure::new(Notification::error(
            "Sign in failed",
            "Email and password are required",
        )));
    }

    let session = state
        .facade
        .sign_in(&credentials.email, &credentials.password)
        .await
        .map_err(|e| {
            let failure = CommandFailure::from(e);
            CommandFailure::new(Notification::error(
                "Sign in failed",
                failure.notification.description,
            ))
        })?;

    Ok(Completed {
        value: session.user,
        notification: Notification::success("Welcome back", "Signed in successfully"),
        redirect: Some(Route::Admin),
    })
}

pub async fn sign_out<D: Datastore>(state: &AppState<D>) -> CommandResult<Completed<()>> {
    state.facade.sign_out().await?;
    info!("Session closed");
    Ok(Completed {
        value: (),
        notification: Notification::success("Signed out", "You have been signed out"),
        redirect: Some(Route::Home),
    })
}

/// 角色申请页数据；未登录时跳转到登录页
pub async fn admin_setup_info<D: Datastore>(state: &AppState<D>) -> CommandResult<AdminSetupInfo> {
    let mut gate = RoleGate::new();
    let resolved = gate.resolve(&state.facade).await.map(|_| ());

    match (gate.state(), resolved) {
        (GateState::AuthenticatedAdmin(user), _) => Ok(AdminSetupInfo::new(user, true)),
        (GateState::AuthenticatedNonAdmin(user), _) => Ok(AdminSetupInfo::new(user, false)),
        (_, Err(e)) => Err(CommandFailure::from(e).redirect_to(Route::SignIn)),
        (_, Ok(())) => Err(CommandFailure::new(Notification::error(
            "Sign in required",
            "Sign in to request admin access",
        ))
        .redirect_to(Route::SignIn)),
    }
}
