use crate::routes::RESERVED_SEGMENTS;
use regex::Regex;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::OnceLock;

/// 无分类题目使用的固定 slug
pub const UNCATEGORIZED_SLUG: &str = "uncategorized";

const DEFAULT_DB_FILE: &str = "codegrid.db";

fn separator_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("static slug pattern"))
}

/// 将任意文本转换为 URL 安全的 slug
///
/// 小写化后把每段非字母数字字符替换为单个连字符，再去掉首尾连字符。
/// 空串得到空 slug。
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    let replaced = separator_pattern().replace_all(&lowered, "-");
    replaced.trim_matches('-').to_string()
}

/// 分类名没有任何字母数字时使用的路径段
pub const EMPTY_CATEGORY_SLUG: &str = "category";

/// 分类名对应的路径段
///
/// 结果总能作为路由首段：空 slug 改为 `category`，与固定视图重名的段追加 `-category`。
pub fn category_slug(category: Option<&str>) -> String {
    let Some(name) = category else {
        return UNCATEGORIZED_SLUG.to_string();
    };

    let slug = slugify(name);
    if slug.is_empty() {
        EMPTY_CATEGORY_SLUG.to_string()
    } else if RESERVED_SEGMENTS.contains(&slug.as_str()) {
        format!("{}-category", slug)
    } else {
        slug
    }
}

/// 为按创建时间升序排列的标题分配互不相同的 slug
///
/// 先到者保留原 slug，后来者依次追加 `-2`、`-3`……，并跳过已被占用的后缀。
pub fn unique_slugs<'a, I>(titles: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut taken = HashSet::new();
    let mut slugs = Vec::new();

    for title in titles {
        let mut base = slugify(title);
        if base.is_empty() {
            base = "problem".to_string();
        }

        let mut candidate = base.clone();
        let mut suffix = 2;
        while taken.contains(&candidate) {
            candidate = format!("{}-{}", base, suffix);
            suffix += 1;
        }

        taken.insert(candidate.clone());
        slugs.push(candidate);
    }

    slugs
}

/// 本地数据库默认路径：工作目录下的 data/codegrid.db
pub fn get_database_path() -> PathBuf {
    let mut path = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    path.push("data");
    path.push(DEFAULT_DB_FILE);
    path
}

pub fn get_platform() -> &'static str {
    std::env::consts::OS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_well_formed(slug: &str) -> bool {
        slug.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
            && !slug.starts_with('-')
            && !slug.ends_with('-')
            && !slug.contains("--")
    }

    #[test]
    fn test_slugify_examples() {
        assert_eq!(slugify("Two Sum!!"), "two-sum");
        assert_eq!(slugify("  A/B  "), "a-b");
        assert_eq!(slugify("Merge K Sorted Lists"), "merge-k-sorted-lists");
        assert_eq!(slugify("3Sum -- Closest"), "3sum-closest");
    }

    #[test]
    fn test_slugify_edge_cases() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("!!!"), "");
        assert_eq!(slugify("Ünïcode Tîtle"), "n-code-t-tle");
    }

    #[test]
    fn test_slugify_output_is_well_formed() {
        let inputs = [
            "Two Sum!!",
            "--leading and trailing--",
            "Dynamic   Programming",
            "a__b..c",
            "日本語 title",
            "MiXeD CaSe 42",
            " - ",
        ];
        for input in inputs {
            let slug = slugify(input);
            assert!(is_well_formed(&slug), "{:?} -> {:?}", input, slug);
        }
    }

    #[test]
    fn test_category_slug() {
        assert_eq!(category_slug(Some("Dynamic Programming")), "dynamic-programming");
        assert_eq!(category_slug(None), UNCATEGORIZED_SLUG);
    }

    #[test]
    fn test_category_slug_avoids_reserved_and_empty_segments() {
        assert_eq!(category_slug(Some("Admin")), "admin-category");
        assert_eq!(category_slug(Some("AUTH")), "auth-category");
        assert_eq!(category_slug(Some("Admin Setup")), "admin-setup-category");
        assert_eq!(category_slug(Some("++")), EMPTY_CATEGORY_SLUG);
        assert_eq!(category_slug(Some("")), EMPTY_CATEGORY_SLUG);
        assert_eq!(category_slug(Some("Administration")), "administration");
    }

    #[test]
    fn test_unique_slugs_breaks_collisions() {
        let slugs = unique_slugs(["Two Sum", "Two  Sum!", "two-sum-2", "Two Sum?"]);
        assert_eq!(slugs, vec!["two-sum", "two-sum-2", "two-sum-2-2", "two-sum-3"]);
    }

    #[test]
    fn test_unique_slugs_empty_title() {
        let slugs = unique_slugs(["", "???"]);
        assert_eq!(slugs, vec!["problem", "problem-2"]);
    }
}
