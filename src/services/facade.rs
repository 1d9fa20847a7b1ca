//! 数据访问门面
//! 所有读写都经过这里：写操作先做表单校验，查不到记录统一转换为 NotFoundError

use crate::error::{AppResult, DatastoreError, NotFoundError};
use crate::models::{Category, CategoryForm, Problem, ProblemForm, Session};
use crate::services::datastore::Datastore;
use crate::services::validation::{validate_category, validate_problem};
use log::{info, warn};
use tokio::sync::watch;

/// 题目与分类的数据访问门面
pub struct CatalogFacade<D> {
    store: D,
}

impl<D: Datastore> CatalogFacade<D> {
    pub fn new(store: D) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &D {
        &self.store
    }

    // ==================== 题目 ====================

    pub async fn list_problems(&self) -> AppResult<Vec<Problem>> {
        Ok(self.store.list_problems().await?)
    }

    pub async fn get_problem(&self, id: &str) -> AppResult<Problem> {
        self.store
            .get_problem(id)
            .await?
            .ok_or_else(|| NotFoundError::problem(id).into())
    }

    /// 校验表单后创建题目
    pub async fn create_problem(&self, form: &ProblemForm) -> AppResult<Problem> {
        let record = validate_problem(form)?;
        let problem = self.store.insert_problem(&record).await?;
        info!("Created problem {} ({})", problem.id, problem.title);
        Ok(problem)
    }

    /// 校验表单后整体更新题目
    pub async fn update_problem(&self, id: &str, form: &ProblemForm) -> AppResult<Problem> {
        let record = validate_problem(form)?;
        let problem = self
            .store
            .update_problem(id, &record)
            .await?
            .ok_or_else(|| NotFoundError::problem(id))?;
        info!("Updated problem {} ({})", problem.id, problem.title);
        Ok(problem)
    }

    /// 立即删除，不可恢复
    pub async fn delete_problem(&self, id: &str) -> AppResult<()> {
        if !self.store.delete_problem(id).await? {
            return Err(NotFoundError::problem(id).into());
        }
        info!("Deleted problem {}", id);
        Ok(())
    }

    // ==================== 分类 ====================

    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        Ok(self.store.list_categories().await?)
    }

    pub async fn get_category(&self, id: &str) -> AppResult<Category> {
        self.store
            .get_category(id)
            .await?
            .ok_or_else(|| NotFoundError::category(id).into())
    }

    pub async fn create_category(&self, form: &CategoryForm) -> AppResult<Category> {
        let record = validate_category(form)?;
        let category = self.store.insert_category(&record).await?;
        info!("Created category {} ({})", category.id, category.name);
        Ok(category)
    }

    /// 改名不会同步题目上的分类标签
    pub async fn update_category(&self, id: &str, form: &CategoryForm) -> AppResult<Category> {
        let record = validate_category(form)?;
        let previous = self.get_category(id).await?;
        let category = self
            .store
            .update_category(id, &record)
            .await?
            .ok_or_else(|| NotFoundError::category(id))?;

        if previous.name != category.name {
            self.warn_orphans(&previous.name).await;
        }
        info!("Updated category {} ({})", category.id, category.name);
        Ok(category)
    }

    /// 删除分类，引用该分类名的题目保持不变
    pub async fn delete_category(&self, id: &str) -> AppResult<()> {
        let category = self.get_category(id).await?;
        if !self.store.delete_category(id).await? {
            return Err(NotFoundError::category(id).into());
        }

        self.warn_orphans(&category.name).await;
        info!("Deleted category {} ({})", id, category.name);
        Ok(())
    }

    async fn warn_orphans(&self, name: &str) {
        match self.store.list_problems().await {
            Ok(problems) => {
                let count = problems
                    .iter()
                    .filter(|p| p.category.as_deref() == Some(name))
                    .count();
                if count > 0 {
                    warn!("{} problem(s) still reference category '{}'", count, name);
                }
            }
            Err(e) => warn!("Could not check problems referencing '{}': {}", name, e),
        }
    }

    // ==================== 认证 ====================

    pub async fn current_session(&self) -> Result<Option<Session>, DatastoreError> {
        self.store.current_session().await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, DatastoreError> {
        self.store.sign_in_with_password(email.trim(), password).await
    }

    pub async fn sign_out(&self) -> Result<(), DatastoreError> {
        self.store.sign_out().await
    }

    pub async fn is_admin(&self, user_id: &str) -> Result<bool, DatastoreError> {
        self.store.is_admin(user_id).await
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.store.subscribe()
    }
}
