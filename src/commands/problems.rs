// 题目命令模块
// 首页、分类页、详情页的读取，以及管理后台的题目增删改

use super::{require_admin, AppState, CommandFailure, CommandResult, Completed, Notification};
use crate::error::{AppError, ValidationError};
use crate::models::{Category, Difficulty, Problem, ProblemForm, User};
use crate::routes::Route;
use crate::services::catalog::{CatalogView, CategoryCard, ProblemDetailView, ProblemSummary};
use crate::services::datastore::Datastore;
use crate::services::filter::{CategoryFilter, DifficultyFilter, ProblemFilter};
use crate::utils::UNCATEGORIZED_SLUG;
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

/// 列表页查询参数（搜索框与下拉框的原始取值）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingQuery {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default)]
    pub category: String,
}

impl ListingQuery {
    fn to_filter(&self) -> CommandResult<ProblemFilter> {
        let difficulty = DifficultyFilter::parse(&self.difficulty).map_err(|_| {
            CommandFailure::from(AppError::from(ValidationError::new(
                "difficulty",
                "Invalid difficulty",
            )))
        })?;
        Ok(ProblemFilter::new(self.search.clone())
            .with_difficulty(difficulty)
            .with_category(CategoryFilter::parse(&self.category)))
    }
}

/// 首页
#[derive(Debug, Clone, Serialize)]
pub struct ListingPage {
    pub problems: Vec<ProblemSummary>,
    pub categories: Vec<CategoryCard>,
    /// 过滤前的题目总数
    pub total: usize,
}

/// 分类页
#[derive(Debug, Clone, Serialize)]
pub struct CategoryPage {
    pub name: String,
    pub slug: String,
    pub problems: Vec<ProblemSummary>,
}

/// 管理后台题目行
#[derive(Debug, Clone, Serialize)]
pub struct AdminProblemRow {
    pub id: String,
    pub title: String,
    pub difficulty: Difficulty,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub view: Route,
    pub edit: Route,
}

/// 管理后台首页
#[derive(Debug, Clone, Serialize)]
pub struct AdminDashboard {
    pub user: User,
    pub problems: Vec<AdminProblemRow>,
    pub categories: Vec<Category>,
    /// 题目引用但分类表中不存在的分类名
    pub orphaned_categories: Vec<String>,
}

async fn load_view<D: Datastore>(state: &AppState<D>, description: &str) -> CommandResult<CatalogView> {
    CatalogView::load(&state.facade)
        .await
        .map_err(|e| CommandFailure::load_failed(e, description))
}

/// 首页列表
pub async fn load_listing<D: Datastore>(
    query: &ListingQuery,
    state: &AppState<D>,
) -> CommandResult<ListingPage> {
    let filter = query.to_filter()?;
    let view = load_view(state, "Failed to load problems").await?;

    Ok(ListingPage {
        problems: view.filtered(&filter),
        categories: view.category_cards(),
        total: view.problems().len(),
    })
}

/// 分类页列表；分类表和题目标签都找不到该 slug 时视为不存在
pub async fn load_category_listing<D: Datastore>(
    category: &str,
    query: &ListingQuery,
    state: &AppState<D>,
) -> CommandResult<CategoryPage> {
    let filter = query.to_filter()?;
    let view = load_view(state, "Failed to load problems").await?;

    let name = match view.category_name(category) {
        Some(name) => name,
        None if category == UNCATEGORIZED_SLUG => "Uncategorized".to_string(),
        None => {
            return Err(CommandFailure::new(Notification::error(
                "Category not found",
                "The requested category does not exist",
            ))
            .redirect_to(Route::Home))
        }
    };

    Ok(CategoryPage {
        name,
        slug: category.to_string(),
        problems: view.in_category(category, &filter),
    })
}

/// 详情页；找不到时提示并返回首页
pub async fn load_problem_detail<D: Datastore>(
    category: &str,
    slug: &str,
    state: &AppState<D>,
) -> CommandResult<ProblemDetailView> {
    let view = load_view(state, "Failed to load problem")
        .await
        .map_err(|f| f.redirect_to(Route::Home))?;

    view.detail(category, slug).ok_or_else(|| {
        CommandFailure::new(Notification::error(
            "Problem not found",
            "The requested problem does not exist",
        ))
        .redirect_to(Route::Home)
    })
}

/// 管理后台题目列表
pub async fn admin_dashboard<D: Datastore>(state: &AppState<D>) -> CommandResult<AdminDashboard> {
    let user = require_admin(state).await?;
    let view = load_view(state, "Failed to load problems").await?;

    let problems = view
        .problems()
        .iter()
        .map(|p| AdminProblemRow {
            id: p.id.clone(),
            title: p.title.clone(),
            difficulty: p.difficulty,
            category: p.category.clone(),
            created_at: p.created_at,
            view: view.link_for(p),
            edit: Route::AdminEdit { id: p.id.clone() },
        })
        .collect();

    Ok(AdminDashboard {
        user,
        problems,
        categories: view.categories().to_vec(),
        orphaned_categories: view.orphaned_categories(),
    })
}

/// 新建或编辑页的表单初始值
pub async fn load_problem_form<D: Datastore>(
    id: Option<&str>,
    state: &AppState<D>,
) -> CommandResult<ProblemForm> {
    require_admin(state).await?;

    let Some(id) = id else {
        return Ok(ProblemForm {
            difficulty: Difficulty::default().to_string(),
            ..Default::default()
        });
    };

    let problem = state
        .facade
        .get_problem(id)
        .await
        .map_err(|e| CommandFailure::load_failed(e, "Failed to load problem").redirect_to(Route::Admin))?;
    Ok(ProblemForm::from(&problem))
}

/// 提交表单：`id` 为空时新建，否则整体更新
pub async fn submit_problem<D: Datastore>(
    id: Option<&str>,
    form: &ProblemForm,
    state: &AppState<D>,
) -> CommandResult<Completed<Problem>> {
    require_admin(state).await?;

    let (result, message) = match id {
        Some(id) => (
            state.facade.update_problem(id, form).await,
            "Problem updated successfully",
        ),
        None => (
            state.facade.create_problem(form).await,
            "Problem created successfully",
        ),
    };

    let problem = result.map_err(|e| CommandFailure::from_error(e, "Failed to save problem"))?;
    Ok(Completed {
        value: problem,
        notification: Notification::success("Success!", message),
        redirect: Some(Route::Admin),
    })
}

/// 删除题目，调用方负责事先确认
pub async fn delete_problem<D: Datastore>(
    id: &str,
    state: &AppState<D>,
) -> CommandResult<Completed<()>> {
    require_admin(state).await?;

    state
        .facade
        .delete_problem(id)
        .await
        .map_err(|e| CommandFailure::from_error(e, "Failed to delete problem"))?;

    info!("Problem {} removed from dashboard", id);
    Ok(Completed {
        value: (),
        notification: Notification::success("Success", "Problem deleted successfully"),
        redirect: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::database::LocalStore;

    async fn admin_state() -> AppState<LocalStore> {
        let store = LocalStore::open_in_memory().unwrap();
        let user = store.create_user("admin@example.com", "hunter2").unwrap();
        store.grant_admin(&user.id).unwrap();
        let state = AppState::new(store);
        state.facade.sign_in("admin@example.com", "hunter2").await.unwrap();
        state
    }

    fn form(title: &str, difficulty: &str, category: &str) -> ProblemForm {
        ProblemForm {
            title: title.to_string(),
            description: format!("{} description", title),
            solution: "return 42;".to_string(),
            explanation: "It is always 42.".to_string(),
            difficulty: difficulty.to_string(),
            category: category.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_then_list_and_open_detail() {
        let state = admin_state().await;
        let done = submit_problem(None, &form("Two Sum", "Easy", "Arrays"), &state)
            .await
            .unwrap();
        assert_eq!(done.notification.description, "Problem created successfully");
        assert_eq!(done.redirect, Some(Route::Admin));

        let page = load_listing(&ListingQuery::default(), &state).await.unwrap();
        assert_eq!(page.total, 1);
        let link = page.problems[0].link.clone();
        assert_eq!(link.path(), "/arrays/two-sum");

        let Route::ProblemDetail { category, slug } = link else {
            panic!("expected detail route");
        };
        let detail = load_problem_detail(&category, &slug, &state).await.unwrap();
        assert_eq!(detail.problem.id, done.value.id);
        assert!(detail.description_html.starts_with("<p>"));
    }

    #[tokio::test]
    async fn test_listing_filters_and_rejects_bad_difficulty() {
        let state = admin_state().await;
        submit_problem(None, &form("Two Sum", "Easy", "Arrays"), &state).await.unwrap();
        submit_problem(None, &form("Word Ladder", "Hard", "Graphs"), &state).await.unwrap();

        let query = ListingQuery {
            difficulty: "Hard".to_string(),
            ..Default::default()
        };
        let page = load_listing(&query, &state).await.unwrap();
        assert_eq!(page.problems.len(), 1);
        assert_eq!(page.problems[0].title, "Word Ladder");
        assert_eq!(page.total, 2);

        let bad = ListingQuery {
            difficulty: "Impossible".to_string(),
            ..Default::default()
        };
        let failure = load_listing(&bad, &state).await.unwrap_err();
        assert_eq!(failure.notification.description, "Invalid difficulty");
    }

    #[tokio::test]
    async fn test_category_listing() {
        let state = admin_state().await;
        submit_problem(None, &form("Two Sum", "Easy", "Arrays"), &state).await.unwrap();
        submit_problem(None, &form("FizzBuzz", "Easy", ""), &state).await.unwrap();

        let arrays = load_category_listing("arrays", &ListingQuery::default(), &state)
            .await
            .unwrap();
        assert_eq!(arrays.name, "Arrays");
        assert_eq!(arrays.problems.len(), 1);

        let loose = load_category_listing("uncategorized", &ListingQuery::default(), &state)
            .await
            .unwrap();
        assert_eq!(loose.problems[0].title, "FizzBuzz");

        let missing = load_category_listing("trees", &ListingQuery::default(), &state)
            .await
            .unwrap_err();
        assert_eq!(missing.redirect, Some(Route::Home));
    }

    #[tokio::test]
    async fn test_unknown_detail_redirects_home() {
        let state = admin_state().await;
        let failure = load_problem_detail("arrays", "nope", &state).await.unwrap_err();
        assert_eq!(failure.notification.title, "Problem not found");
        assert_eq!(failure.redirect, Some(Route::Home));
    }

    #[tokio::test]
    async fn test_invalid_form_reports_first_field() {
        let state = admin_state().await;
        let failure = submit_problem(None, &form("", "Easy", ""), &state)
            .await
            .unwrap_err();
        assert_eq!(failure.notification.title, "Validation Error");
        assert_eq!(failure.notification.description, "Title is required");
        assert_eq!(failure.redirect, None);
    }

    #[tokio::test]
    async fn test_edit_flow() {
        let state = admin_state().await;
        let created = submit_problem(None, &form("Two Sum", "Easy", "Arrays"), &state)
            .await
            .unwrap()
            .value;

        let blank = load_problem_form(None, &state).await.unwrap();
        assert_eq!(blank.difficulty, "Medium");

        let mut loaded = load_problem_form(Some(created.id.as_str()), &state).await.unwrap();
        assert_eq!(loaded.title, "Two Sum");
        loaded.difficulty = "Hard".to_string();

        let done = submit_problem(Some(created.id.as_str()), &loaded, &state).await.unwrap();
        assert_eq!(done.notification.description, "Problem updated successfully");
        assert_eq!(done.value.difficulty, Difficulty::Hard);

        let missing = load_problem_form(Some("missing"), &state).await.unwrap_err();
        assert_eq!(missing.redirect, Some(Route::Admin));
    }

    #[tokio::test]
    async fn test_dashboard_and_delete() {
        let state = admin_state().await;
        let created = submit_problem(None, &form("Two Sum", "Easy", "Ghost"), &state)
            .await
            .unwrap()
            .value;

        let dashboard = admin_dashboard(&state).await.unwrap();
        assert_eq!(dashboard.user.email.as_deref(), Some("admin@example.com"));
        assert_eq!(dashboard.problems.len(), 1);
        assert_eq!(dashboard.problems[0].edit.path(), format!("/admin/edit/{}", created.id));
        assert_eq!(dashboard.orphaned_categories, vec!["Ghost".to_string()]);

        let done = delete_problem(&created.id, &state).await.unwrap();
        assert_eq!(done.notification.description, "Problem deleted successfully");
        assert!(admin_dashboard(&state).await.unwrap().problems.is_empty());

        let again = delete_problem(&created.id, &state).await.unwrap_err();
        assert_eq!(again.notification.title, "Problem not found");
    }

    #[tokio::test]
    async fn test_admin_commands_require_admin() {
        let store = LocalStore::open_in_memory().unwrap();
        let state = AppState::new(store);

        let failure = submit_problem(None, &form("Two Sum", "Easy", ""), &state)
            .await
            .unwrap_err();
        assert_eq!(failure.redirect, Some(Route::SignIn));
        assert!(state.facade.list_problems().await.unwrap().is_empty());
    }
}
