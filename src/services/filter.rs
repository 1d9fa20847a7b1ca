//! 题目列表过滤
//! 文本查询匹配标题或描述（不区分大小写），难度与分类为等值过滤，"all" 表示不限制

use crate::models::{Difficulty, Problem};
use serde::{Deserialize, Serialize};

/// 难度过滤条件
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DifficultyFilter {
    #[default]
    All,
    Only(Difficulty),
}

impl DifficultyFilter {
    /// 解析下拉框取值，"all" 或空串表示不限制
    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim() {
            "" | "all" => Ok(DifficultyFilter::All),
            other => other.parse().map(DifficultyFilter::Only),
        }
    }

    fn matches(&self, difficulty: Difficulty) -> bool {
        match self {
            DifficultyFilter::All => true,
            DifficultyFilter::Only(d) => *d == difficulty,
        }
    }
}

/// 分类过滤条件
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(String),
}

impl CategoryFilter {
    pub fn parse(value: &str) -> Self {
        match value {
            "" | "all" => CategoryFilter::All,
            other => CategoryFilter::Only(other.to_string()),
        }
    }

    fn matches(&self, category: Option<&str>) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(name) => category == Some(name.as_str()),
        }
    }
}

/// 一组过滤条件
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemFilter {
    pub query: String,
    pub difficulty: DifficultyFilter,
    pub category: CategoryFilter,
}

impl ProblemFilter {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_difficulty(mut self, difficulty: DifficultyFilter) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_category(mut self, category: CategoryFilter) -> Self {
        self.category = category;
        self
    }

    /// 是否存在任何有效条件
    pub fn is_active(&self) -> bool {
        !self.query.trim().is_empty()
            || self.difficulty != DifficultyFilter::All
            || self.category != CategoryFilter::All
    }

    /// 对列表应用过滤，保持原有顺序，不修改输入
    pub fn apply<'a>(&self, problems: &'a [Problem]) -> Vec<&'a Problem> {
        let needle = self.query.trim().to_lowercase();

        problems
            .iter()
            .filter(|p| {
                needle.is_empty()
                    || p.title.to_lowercase().contains(&needle)
                    || p.description.to_lowercase().contains(&needle)
            })
            .filter(|p| self.difficulty.matches(p.difficulty))
            .filter(|p| self.category.matches(p.category.as_deref()))
            .collect()
    }
}

/// 便捷函数：返回过滤后的副本
pub fn filter_problems(problems: &[Problem], filter: &ProblemFilter) -> Vec<Problem> {
    filter.apply(problems).into_iter().cloned().collect()
}
