// CodeGrid 命令行入口
// 把路由渲染为文本，或执行管理员写操作；提示消息输出到 stderr

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use codegrid::commands::{self, AppState, CommandFailure, Credentials, ListingQuery, Notification};
use codegrid::config::{BackendKind, Config};
use codegrid::logging::init_logging;
use codegrid::models::{CategoryForm, ProblemForm};
use codegrid::routes::Route;
use codegrid::services::{Backend, Datastore, LocalStore, SupabaseClient};
use codegrid::utils::get_platform;
use log::{info, warn};
use std::path::PathBuf;

/// 跟随跳转的最大次数
const MAX_REDIRECTS: usize = 3;

#[derive(Parser, Debug)]
#[command(name = "codegrid", author, version, about)]
#[command(
    after_help = "Admin paths: /admin, /admin/new, /admin/edit/ID, /admin-setup.\nSet CODEGRID_EMAIL and CODEGRID_PASSWORD to sign in first."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 渲染一个页面路径（默认 /）
    Show {
        #[arg(default_value = "/")]
        path: String,
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, value_enum, ignore_case = true, default_value_t = DifficultyArg::All)]
        difficulty: DifficultyArg,
        #[arg(long, default_value = "")]
        category: String,
        #[arg(long, default_value_t = false)]
        html: bool,
    },
    /// 创建本地管理员账号（仅本地后端）
    CreateAdmin { email: String, password: String },
    /// 从 JSON 文件创建或更新题目
    SubmitProblem { file: PathBuf, id: Option<String> },
    DeleteProblem { id: String },
    /// 创建或更新分类
    SubmitCategory {
        name: String,
        #[arg(default_value = "")]
        image_url: String,
        #[arg(long)]
        id: Option<String>,
    },
    DeleteCategory { id: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum DifficultyArg {
    All,
    Easy,
    Medium,
    Hard,
}

impl DifficultyArg {
    /// 列表页下拉框的取值
    fn as_query(self) -> &'static str {
        match self {
            DifficultyArg::All => "all",
            DifficultyArg::Easy => "Easy",
            DifficultyArg::Medium => "Medium",
            DifficultyArg::Hard => "Hard",
        }
    }
}

impl Command {
    fn home() -> Self {
        Command::Show {
            path: "/".to_string(),
            search: String::new(),
            difficulty: DifficultyArg::All,
            category: String::new(),
            html: false,
        }
    }
}

fn connect(config: &Config) -> Result<Backend> {
    match config.backend {
        BackendKind::Local => {
            let store = LocalStore::open(&config.db_path).with_context(|| {
                format!("Failed to open local store at {}", config.db_path.display())
            })?;
            Ok(Backend::Local(store))
        }
        BackendKind::Supabase => {
            let supabase = config
                .supabase
                .clone()
                .context("Supabase backend selected without connection settings")?;
            let client = SupabaseClient::new(supabase).context("Failed to create Supabase client")?;
            Ok(Backend::Supabase(client))
        }
    }
}

fn report(notification: &Notification) {
    let marker = if notification.is_error() { "!" } else { "*" };
    eprintln!("[{}] {}: {}", marker, notification.title, notification.description);
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CommandFailure> {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            Ok(())
        }
        Err(e) => Err(CommandFailure::new(Notification::error("Error", e.to_string()))),
    }
}

/// 渲染单个路由
async fn render<D: Datastore>(
    route: &Route,
    query: &ListingQuery,
    html: bool,
    state: &AppState<D>,
) -> Result<(), CommandFailure> {
    match route {
        Route::Home => {
            let page = commands::load_listing(query, state).await?;
            println!("Categories");
            for card in &page.categories {
                println!(
                    "  [{}] {} ({} problems: {} easy, {} medium, {} hard) -> /{}",
                    card.icon.glyph(),
                    card.name,
                    card.problem_count,
                    card.easy,
                    card.medium,
                    card.hard,
                    card.slug
                );
            }
            println!();
            println!("Problems ({} of {})", page.problems.len(), page.total);
            if page.problems.is_empty() {
                println!("  No problems found");
            }
            for summary in &page.problems {
                println!("  {:<6} {}  {}", summary.difficulty, summary.title, summary.link);
                println!("         {}", summary.preview);
            }
        }
        Route::Category { category } => {
            let page = commands::load_category_listing(category, query, state).await?;
            println!("{} ({} problems)", page.name, page.problems.len());
            for summary in &page.problems {
                println!("  {:<6} {}  {}", summary.difficulty, summary.title, summary.link);
            }
        }
        Route::ProblemDetail { category, slug } => {
            let detail = commands::load_problem_detail(category, slug, state).await?;
            let problem = &detail.problem;
            println!("{} [{}]", problem.title, problem.difficulty);
            println!("Category: {}", problem.category.as_deref().unwrap_or("Uncategorized"));
            println!("Created: {}", problem.created_at.format("%b %-d, %Y"));
            println!();
            if html {
                println!("{}", detail.description_html);
                println!("{}", detail.explanation_html);
            } else {
                println!("{}", problem.description);
                println!();
                println!("Solution:\n{}", problem.solution);
                println!();
                println!("Explanation:\n{}", problem.explanation);
            }
            if let Some(link) = &problem.reference_link {
                println!("Reference: {}", link);
            }
            if let Some(link) = &problem.youtube_explanation_link {
                println!("Video: {}", link);
            }
        }
        Route::SignIn => {
            println!("Set CODEGRID_EMAIL and CODEGRID_PASSWORD to sign in.");
        }
        Route::Admin => {
            let dashboard = commands::admin_dashboard(state).await?;
            println!(
                "Admin: {}",
                dashboard.user.email.as_deref().unwrap_or(&dashboard.user.id)
            );
            for row in &dashboard.problems {
                println!("  {:<6} {}  edit: {}  view: {}", row.difficulty, row.title, row.edit, row.view);
            }
            println!("Categories:");
            for category in &dashboard.categories {
                println!("  {} ({})", category.name, category.id);
            }
            for orphan in &dashboard.orphaned_categories {
                warn!("Problems reference missing category '{}'", orphan);
            }
        }
        Route::AdminNew => {
            let form = commands::load_problem_form(None, state).await?;
            print_json(&form)?;
        }
        Route::AdminEdit { id } => {
            let form = commands::load_problem_form(Some(id.as_str()), state).await?;
            print_json(&form)?;
        }
        Route::AdminSetup => {
            let info = commands::admin_setup_info(state).await?;
            if info.already_admin {
                println!("User {} already has the admin role.", info.user_id);
            } else {
                println!("Admin access required. Run this SQL against the backend:");
                println!("  {}", info.grant_sql);
                println!("Your user id: {}", info.user_id);
            }
        }
        Route::NotFound => {
            println!("404: page not found");
        }
    }
    Ok(())
}

/// 渲染路由并跟随失败时给出的跳转
async fn show<D: Datastore>(
    route: Route,
    query: &ListingQuery,
    html: bool,
    state: &AppState<D>,
) -> bool {
    let mut current = route;
    for _ in 0..=MAX_REDIRECTS {
        match render(&current, query, html, state).await {
            Ok(()) => return true,
            Err(failure) => {
                report(&failure.notification);
                match failure.redirect {
                    Some(next) if next != current => {
                        info!("Redirecting {} -> {}", current, next);
                        current = next;
                    }
                    _ => return false,
                }
            }
        }
    }
    false
}

fn finish<T>(result: Result<commands::Completed<T>, CommandFailure>) -> bool {
    match result {
        Ok(done) => {
            report(&done.notification);
            true
        }
        Err(failure) => {
            report(&failure.notification);
            false
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;
    init_logging(config.log_level, config.log_file.as_deref()).context("Failed to initialize logging")?;
    info!(
        "CodeGrid {} on {} ({:?} backend)",
        env!("CARGO_PKG_VERSION"),
        get_platform(),
        config.backend
    );

    let command = cli.command.unwrap_or_else(Command::home);

    let backend = connect(&config)?;

    if let Command::CreateAdmin { email, password } = &command {
        let Backend::Local(store) = &backend else {
            bail!("create-admin only works with the local backend; grant roles in the hosted dashboard");
        };
        let user = store.create_user(email, password)?;
        store.grant_admin(&user.id)?;
        println!("Created admin {} ({})", email, user.id);
        return Ok(());
    }

    let state = AppState::new(backend);

    if let Some((email, password)) = &config.credentials {
        let credentials = Credentials {
            email: email.clone(),
            password: password.clone(),
        };
        if let Err(failure) = commands::sign_in(&credentials, &state).await {
            report(&failure.notification);
        }
    }

    let ok = match command {
        Command::Show {
            path,
            search,
            difficulty,
            category,
            html,
        } => {
            let query = ListingQuery {
                search,
                difficulty: difficulty.as_query().to_string(),
                category,
            };
            show(Route::parse(&path), &query, html, &state).await
        }
        Command::SubmitProblem { file, id } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let form: ProblemForm = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a valid problem form", file.display()))?;
            finish(commands::submit_problem(id.as_deref(), &form, &state).await)
        }
        Command::DeleteProblem { id } => finish(commands::delete_problem(&id, &state).await),
        Command::SubmitCategory { name, image_url, id } => {
            let form = CategoryForm { name, image_url };
            finish(commands::submit_category(id.as_deref(), &form, &state).await)
        }
        Command::DeleteCategory { id } => finish(commands::delete_category(&id, &state).await),
        Command::CreateAdmin { .. } => true,
    };

    if !ok {
        bail!("command did not complete");
    }
    Ok(())
}
