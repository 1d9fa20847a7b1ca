//! 管理后台表单校验
//! 按字段顺序校验，遇到第一个错误即返回；通过后输出清洗后的记录

use crate::error::ValidationError;
use crate::models::{CategoryForm, CategoryRecord, Difficulty, ProblemForm, ProblemRecord};

/// 标题最大字符数
pub const MAX_TITLE_CHARS: usize = 200;

fn required(field: &'static str, value: &str, message: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(field, message));
    }
    Ok(trimmed.to_string())
}

/// 可选 URL：空串视为缺省，否则必须能解析为绝对 URL
fn optional_url(
    field: &'static str,
    value: &str,
    message: &str,
) -> Result<Option<String>, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    reqwest::Url::parse(trimmed).map_err(|_| ValidationError::new(field, message))?;
    Ok(Some(trimmed.to_string()))
}

fn optional_text(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// 校验题目表单
pub fn validate_problem(form: &ProblemForm) -> Result<ProblemRecord, ValidationError> {
    let title = required("title", &form.title, "Title is required")?;
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(ValidationError::new("title", "Title too long"));
    }

    let description = required("description", &form.description, "Description is required")?;
    let solution = required("solution", &form.solution, "Solution is required")?;
    let explanation = required("explanation", &form.explanation, "Explanation is required")?;
    let reference_link = optional_url("reference_link", &form.reference_link, "Invalid URL")?;
    let youtube_explanation_link = optional_url(
        "youtube_explanation_link",
        &form.youtube_explanation_link,
        "Invalid YouTube URL",
    )?;
    let difficulty: Difficulty = form
        .difficulty
        .trim()
        .parse()
        .map_err(|_| ValidationError::new("difficulty", "Invalid difficulty"))?;

    Ok(ProblemRecord {
        title,
        description,
        solution,
        explanation,
        difficulty,
        category: optional_text(&form.category),
        reference_link,
        youtube_explanation_link,
    })
}

/// 校验分类表单
pub fn validate_category(form: &CategoryForm) -> Result<CategoryRecord, ValidationError> {
    let name = required("name", &form.name, "Category name is required")?;
    let image_url = optional_url("image_url", &form.image_url, "Invalid URL")?;

    Ok(CategoryRecord { name, image_url })
}
