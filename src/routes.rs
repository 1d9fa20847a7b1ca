//! 可导航的路由表

use serde::{Deserialize, Serialize};
use std::fmt;

/// 被固定视图占用、不能作为分类路径段的首段
pub const RESERVED_SEGMENTS: [&str; 3] = ["auth", "admin", "admin-setup"];

/// 视图路由
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Route {
    Home,
    Category { category: String },
    ProblemDetail { category: String, slug: String },
    SignIn,
    Admin,
    AdminNew,
    AdminEdit { id: String },
    AdminSetup,
    NotFound,
}

impl Route {
    /// 解析路径，末尾斜杠与空路径均可接受
    pub fn parse(path: &str) -> Route {
        let path = path.split(&['?', '#'][..]).next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            [] => Route::Home,
            ["auth"] => Route::SignIn,
            ["admin"] => Route::Admin,
            ["admin", "new"] => Route::AdminNew,
            ["admin", "edit", id] => Route::AdminEdit { id: id.to_string() },
            ["admin-setup"] => Route::AdminSetup,
            ["auth" | "admin" | "admin-setup", ..] => Route::NotFound,
            [category] => Route::Category {
                category: category.to_string(),
            },
            [category, slug] => Route::ProblemDetail {
                category: category.to_string(),
                slug: slug.to_string(),
            },
            _ => Route::NotFound,
        }
    }

    /// 规范路径
    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::Category { category } => format!("/{}", category),
            Route::ProblemDetail { category, slug } => format!("/{}/{}", category, slug),
            Route::SignIn => "/auth".to_string(),
            Route::Admin => "/admin".to_string(),
            Route::AdminNew => "/admin/new".to_string(),
            Route::AdminEdit { id } => format!("/admin/edit/{}", id),
            Route::AdminSetup => "/admin-setup".to_string(),
            Route::NotFound => "/404".to_string(),
        }
    }

    /// 只有管理员可见的视图
    pub fn requires_admin(&self) -> bool {
        matches!(self, Route::Admin | Route::AdminNew | Route::AdminEdit { .. })
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_routes() {
        assert_eq!(Route::parse("/"), Route::Home);
        assert_eq!(Route::parse(""), Route::Home);
        assert_eq!(Route::parse("/auth"), Route::SignIn);
        assert_eq!(Route::parse("/admin/"), Route::Admin);
        assert_eq!(Route::parse("/admin/new"), Route::AdminNew);
        assert_eq!(
            Route::parse("/admin/edit/42"),
            Route::AdminEdit { id: "42".to_string() }
        );
        assert_eq!(Route::parse("/admin-setup"), Route::AdminSetup);
        assert_eq!(
            Route::parse("/arrays?sort=new"),
            Route::Category {
                category: "arrays".to_string()
            }
        );
        assert_eq!(
            Route::parse("/arrays/two-sum"),
            Route::ProblemDetail {
                category: "arrays".to_string(),
                slug: "two-sum".to_string()
            }
        );
    }

    #[test]
    fn test_reserved_prefixes_do_not_become_categories() {
        assert_eq!(Route::parse("/admin/unknown"), Route::NotFound);
        assert_eq!(Route::parse("/auth/callback"), Route::NotFound);
        assert_eq!(Route::parse("/admin/edit"), Route::NotFound);
        assert_eq!(Route::parse("/a/b/c"), Route::NotFound);
    }

    #[test]
    fn test_path_parses_back() {
        let routes = [
            Route::Home,
            Route::Category {
                category: "dynamic-programming".to_string(),
            },
            Route::ProblemDetail {
                category: "uncategorized".to_string(),
                slug: "word-ladder".to_string(),
            },
            Route::SignIn,
            Route::Admin,
            Route::AdminNew,
            Route::AdminEdit { id: "abc".to_string() },
            Route::AdminSetup,
        ];
        for route in routes {
            assert_eq!(Route::parse(&route.path()), route);
        }
    }

    #[test]
    fn test_reserved_segments_never_parse_as_category() {
        for segment in RESERVED_SEGMENTS {
            let route = Route::parse(&format!("/{}", segment));
            assert!(!matches!(route, Route::Category { .. }), "{}", segment);
            let route = Route::parse(&format!("/{}/two-sum", segment));
            assert!(!matches!(route, Route::ProblemDetail { .. }), "{}", segment);
        }
    }

    #[test]
    fn test_requires_admin() {
        assert!(Route::Admin.requires_admin());
        assert!(Route::AdminEdit { id: "1".to_string() }.requires_admin());
        assert!(!Route::AdminSetup.requires_admin());
        assert!(!Route::Home.requires_admin());
    }
}
