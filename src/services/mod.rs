// 服务模块
// 提供目录的核心业务逻辑：过滤、校验、数据存储、门禁与读模型

pub mod auth_gate;
pub mod catalog;
pub mod database;
pub mod datastore;
pub mod facade;
pub mod filter;
pub mod markdown;
pub mod supabase;
pub mod validation;

pub use auth_gate::{Admission, GateState, RoleGate};

pub use catalog::{
    preview,
    CatalogView,
    CategoryCard,
    ProblemDetailView,
    ProblemSummary,
    PREVIEW_CHARS,
};

pub use database::LocalStore;

pub use datastore::{Backend, Datastore, SessionCell};

pub use facade::CatalogFacade;

pub use filter::{filter_problems, CategoryFilter, DifficultyFilter, ProblemFilter};

pub use markdown::render_markdown;

pub use supabase::{SupabaseClient, SupabaseConfig};

pub use validation::{validate_category, validate_problem, MAX_TITLE_CHARS};
