//! 题目目录数据模型
//! 与数据存储中的 problems / categories / user_roles 表一一对应

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 题目难度
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Easy" => Ok(Difficulty::Easy),
            "Medium" => Ok(Difficulty::Medium),
            "Hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty: {}", other)),
        }
    }
}

/// 题目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub solution: String,
    pub explanation: String,
    pub difficulty: Difficulty,
    pub category: Option<String>,
    pub reference_link: Option<String>,
    pub youtube_explanation_link: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 校验通过、可直接写入的题目字段（不含服务端分配的 id / created_at）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemRecord {
    pub title: String,
    pub description: String,
    pub solution: String,
    pub explanation: String,
    pub difficulty: Difficulty,
    pub category: Option<String>,
    pub reference_link: Option<String>,
    pub youtube_explanation_link: Option<String>,
}

impl Problem {
    /// 去掉服务端字段，便于与写入内容比较
    pub fn record(&self) -> ProblemRecord {
        ProblemRecord {
            title: self.title.clone(),
            description: self.description.clone(),
            solution: self.solution.clone(),
            explanation: self.explanation.clone(),
            difficulty: self.difficulty,
            category: self.category.clone(),
            reference_link: self.reference_link.clone(),
            youtube_explanation_link: self.youtube_explanation_link.clone(),
        }
    }
}

/// 管理后台提交的原始表单，所有字段均为未清洗的文本
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemForm {
    pub title: String,
    pub description: String,
    pub solution: String,
    pub explanation: String,
    pub difficulty: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub reference_link: String,
    #[serde(default)]
    pub youtube_explanation_link: String,
}

impl From<&Problem> for ProblemForm {
    /// 编辑已有题目时回填表单
    fn from(p: &Problem) -> Self {
        Self {
            title: p.title.clone(),
            description: p.description.clone(),
            solution: p.solution.clone(),
            explanation: p.explanation.clone(),
            difficulty: p.difficulty.to_string(),
            category: p.category.clone().unwrap_or_default(),
            reference_link: p.reference_link.clone().unwrap_or_default(),
            youtube_explanation_link: p.youtube_explanation_link.clone().unwrap_or_default(),
        }
    }
}

/// 分类
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub name: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryForm {
    pub name: String,
    #[serde(default)]
    pub image_url: String,
}

impl From<&Category> for CategoryForm {
    fn from(c: &Category) -> Self {
        Self {
            name: c.name.clone(),
            image_url: c.image_url.clone().unwrap_or_default(),
        }
    }
}

/// 分类图标，已知分类之外一律回落到 Other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryIcon {
    Arrays,
    Strings,
    Trees,
    Graphs,
    DynamicProgramming,
    Other,
}

impl CategoryIcon {
    pub fn for_category(name: &str) -> Self {
        match name {
            "Arrays" => CategoryIcon::Arrays,
            "Strings" => CategoryIcon::Strings,
            "Trees" => CategoryIcon::Trees,
            "Graphs" => CategoryIcon::Graphs,
            "Dynamic Programming" => CategoryIcon::DynamicProgramming,
            _ => CategoryIcon::Other,
        }
    }

    /// 图标名称，供渲染层选择图形
    pub fn glyph(&self) -> &'static str {
        match self {
            CategoryIcon::Arrays => "binary",
            CategoryIcon::Strings => "file-code",
            CategoryIcon::Trees => "git-branch",
            CategoryIcon::Graphs => "database",
            CategoryIcon::DynamicProgramming => "braces",
            CategoryIcon::Other => "code",
        }
    }
}

/// 登录用户
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
}

/// 登录会话
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user: User,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}
