//! 目录读模型
//! 保存最近一次拉取的题目与分类列表，为列表页、分类页和详情页提供派生数据。
//! 每个题目的详情 slug 在这里统一分配，链接与查找使用同一份结果。

use crate::error::AppResult;
use crate::models::{Category, CategoryIcon, Difficulty, Problem};
use crate::routes::Route;
use crate::services::datastore::Datastore;
use crate::services::facade::CatalogFacade;
use crate::services::filter::ProblemFilter;
use crate::services::markdown::render_markdown;
use crate::utils::{category_slug, unique_slugs};
use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// 列表摘要的最大字符数
pub const PREVIEW_CHARS: usize = 120;

/// 截断描述作为卡片摘要，超长时追加 "..."
pub fn preview(description: &str) -> String {
    match description.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &description[..cut]),
        None => description.to_string(),
    }
}

/// 列表中的一张题目卡片
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProblemSummary {
    pub id: String,
    pub title: String,
    pub preview: String,
    pub difficulty: Difficulty,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub link: Route,
}

/// 分类概览卡片
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCard {
    pub name: String,
    pub slug: String,
    pub icon: CategoryIcon,
    pub image_url: Option<String>,
    pub problem_count: usize,
    pub easy: usize,
    pub medium: usize,
    pub hard: usize,
}

/// 详情页数据，描述与讲解已渲染为 HTML
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProblemDetailView {
    pub problem: Problem,
    pub description_html: String,
    pub explanation_html: String,
    pub link: Route,
}

#[derive(Debug, Clone, Default)]
pub struct CatalogView {
    problems: Vec<Problem>,
    categories: Vec<Category>,
    slugs: HashMap<String, String>,
}

impl CatalogView {
    /// 用给定列表构建读模型，题目按创建时间倒序保存
    pub fn new(mut problems: Vec<Problem>, categories: Vec<Category>) -> Self {
        problems.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        let slugs = assign_slugs(&problems);
        Self {
            problems,
            categories,
            slugs,
        }
    }

    /// 并发拉取题目与分类
    pub async fn load<D: Datastore>(facade: &CatalogFacade<D>) -> AppResult<Self> {
        let (problems, categories) =
            futures::try_join!(facade.list_problems(), facade.list_categories())?;
        debug!(
            "Loaded catalog: {} problems, {} categories",
            problems.len(),
            categories.len()
        );
        Ok(Self::new(problems, categories))
    }

    /// 全量重新拉取；失败时保留原有数据
    pub async fn refresh<D: Datastore>(&mut self, facade: &CatalogFacade<D>) -> AppResult<()> {
        *self = Self::load(facade).await?;
        Ok(())
    }

    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn detail_slug(&self, id: &str) -> Option<&str> {
        self.slugs.get(id).map(String::as_str)
    }

    /// 题目详情页路由
    pub fn link_for(&self, problem: &Problem) -> Route {
        let slug = match self.detail_slug(&problem.id) {
            Some(slug) => slug.to_string(),
            None => unique_slugs([problem.title.as_str()]).remove(0),
        };
        Route::ProblemDetail {
            category: category_slug(problem.category.as_deref()),
            slug,
        }
    }

    fn summarize(&self, problem: &Problem) -> ProblemSummary {
        ProblemSummary {
            id: problem.id.clone(),
            title: problem.title.clone(),
            preview: preview(&problem.description),
            difficulty: problem.difficulty,
            category: problem.category.clone(),
            created_at: problem.created_at,
            link: self.link_for(problem),
        }
    }

    /// 首页列表
    pub fn filtered(&self, filter: &ProblemFilter) -> Vec<ProblemSummary> {
        filter
            .apply(&self.problems)
            .into_iter()
            .map(|p| self.summarize(p))
            .collect()
    }

    /// 分类页列表：先按分类 slug 取子集，再应用其余过滤条件
    pub fn in_category(&self, slug: &str, filter: &ProblemFilter) -> Vec<ProblemSummary> {
        let scoped: Vec<Problem> = self
            .problems
            .iter()
            .filter(|p| category_slug(p.category.as_deref()) == slug)
            .cloned()
            .collect();

        filter
            .apply(&scoped)
            .into_iter()
            .map(|p| self.summarize(p))
            .collect()
    }

    /// 分类 slug 对应的显示名称，分类表优先，其次是题目上的标签
    pub fn category_name(&self, slug: &str) -> Option<String> {
        self.categories
            .iter()
            .map(|c| c.name.as_str())
            .chain(self.problems.iter().filter_map(|p| p.category.as_deref()))
            .find(|name| category_slug(Some(name)) == slug)
            .map(str::to_string)
    }

    /// 分类概览，顺序与分类列表一致
    pub fn category_cards(&self) -> Vec<CategoryCard> {
        self.categories
            .iter()
            .map(|category| {
                let mut card = CategoryCard {
                    name: category.name.clone(),
                    slug: category_slug(Some(&category.name)),
                    icon: CategoryIcon::for_category(&category.name),
                    image_url: category.image_url.clone(),
                    problem_count: 0,
                    easy: 0,
                    medium: 0,
                    hard: 0,
                };
                for problem in &self.problems {
                    if problem.category.as_deref() != Some(category.name.as_str()) {
                        continue;
                    }
                    card.problem_count += 1;
                    match problem.difficulty {
                        Difficulty::Easy => card.easy += 1,
                        Difficulty::Medium => card.medium += 1,
                        Difficulty::Hard => card.hard += 1,
                    }
                }
                card
            })
            .collect()
    }

    /// 按路径中的分类 slug 与详情 slug 查找题目
    pub fn find_by_slugs(&self, category: &str, slug: &str) -> Option<&Problem> {
        self.problems.iter().find(|p| {
            self.detail_slug(&p.id) == Some(slug) && category_slug(p.category.as_deref()) == category
        })
    }

    pub fn detail(&self, category: &str, slug: &str) -> Option<ProblemDetailView> {
        self.find_by_slugs(category, slug)
            .map(|problem| ProblemDetailView {
                problem: problem.clone(),
                description_html: render_markdown(&problem.description),
                explanation_html: render_markdown(&problem.explanation),
                link: self.link_for(problem),
            })
    }

    /// 题目上引用、但分类表中已不存在的分类名
    pub fn orphaned_categories(&self) -> Vec<String> {
        let known: BTreeSet<&str> = self.categories.iter().map(|c| c.name.as_str()).collect();
        self.problems
            .iter()
            .filter_map(|p| p.category.as_deref())
            .filter(|name| !known.contains(name))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}

/// 按创建时间升序（同时间按 id）分配详情 slug
fn assign_slugs(problems: &[Problem]) -> HashMap<String, String> {
    let mut ordered: Vec<&Problem> = problems.iter().collect();
    ordered.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

    let slugs = unique_slugs(ordered.iter().map(|p| p.title.as_str()));
    ordered
        .into_iter()
        .zip(slugs)
        .map(|(p, slug)| (p.id.clone(), slug))
        .collect()
}
