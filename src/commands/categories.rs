// 分类命令模块
// 管理后台的分类列表与增删改

use super::{require_admin, AppState, CommandFailure, CommandResult, Completed, Notification};
use crate::error::AppError;
use crate::models::{Category, CategoryForm};
use crate::services::datastore::Datastore;

/// 分类列表（公开读取）
pub async fn list_categories<D: Datastore>(state: &AppState<D>) -> CommandResult<Vec<Category>> {
    state
        .facade
        .list_categories()
        .await
        .map_err(|e| CommandFailure::load_failed(e, "Failed to load categories"))
}

/// 新建或改名分类
pub async fn submit_category<D: Datastore>(
    id: Option<&str>,
    form: &CategoryForm,
    state: &AppState<D>,
) -> CommandResult<Completed<Category>> {
    require_admin(state).await?;

    let (result, message) = match id {
        Some(id) => (
            state.facade.update_category(id, form).await,
            "Category updated successfully",
        ),
        None => (
            state.facade.create_category(form).await,
            "Category created successfully",
        ),
    };

    let category = result.map_err(category_failure("Failed to save category"))?;
    Ok(Completed {
        value: category,
        notification: Notification::success("Success", message),
        redirect: None,
    })
}

/// 删除分类；引用它的题目保留原标签
pub async fn delete_category<D: Datastore>(
    id: &str,
    state: &AppState<D>,
) -> CommandResult<Completed<()>> {
    require_admin(state).await?;

    state
        .facade
        .delete_category(id)
        .await
        .map_err(category_failure("Failed to delete category"))?;

    Ok(Completed {
        value: (),
        notification: Notification::success("Success", "Category deleted successfully"),
        redirect: None,
    })
}

/// 分类表单的校验错误沿用 "Error" 标题
fn category_failure(fallback: &'static str) -> impl Fn(AppError) -> CommandFailure {
    move |err| match err {
        AppError::Validation(v) => CommandFailure::new(Notification::error("Error", v.message)),
        other => CommandFailure::from_error(other, fallback),
    }
}
