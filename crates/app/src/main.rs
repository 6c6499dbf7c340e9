use chrono::Utc;
use chrono_tz::Tz;
use clap::{Args, Parser, Subcommand, ValueEnum};
use futures::TryStreamExt;
use ledger::{Calendar, Page, Repository, Window, categories, entries, users};
use migration::{Migrator, MigratorTrait};
use sea_orm::DatabaseConnection;
use settings::Database;

mod settings;

type AppResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser, Debug)]
#[command(name = "budget")]
#[command(about = "Reports on a personal budget ledger")]
struct Cli {
    /// Settings file, without extension (also read from `BUDGET_SETTINGS`).
    #[arg(long, env = "BUDGET_SETTINGS", default_value = "settings")]
    settings: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Income, expenses and balance of a user over a date window.
    Report(ReportArgs),
    /// A page of a user's categories, most recently used first.
    Categories(CategoriesArgs),
}

#[derive(Args, Debug)]
struct ReportArgs {
    /// Telegram id of the user.
    #[arg(long)]
    user: i64,
    #[arg(long, value_enum, default_value_t = Period::Today)]
    window: Period,
}

#[derive(Args, Debug)]
struct CategoriesArgs {
    /// Telegram id of the user.
    #[arg(long)]
    user: i64,
    #[arg(long, default_value_t = 0)]
    offset: u64,
    #[arg(long, default_value_t = Page::DEFAULT_LIMIT)]
    limit: u64,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Period {
    Today,
    Yesterday,
    Week,
    Month,
    Year,
}

impl From<Period> for Window {
    fn from(period: Period) -> Self {
        match period {
            Period::Today => Window::Today,
            Period::Yesterday => Window::Yesterday,
            Period::Week => Window::ThisWeek,
            Period::Month => Window::ThisMonth,
            Period::Year => Window::ThisYear,
        }
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();
    let settings = settings::Settings::new(&cli.settings)?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "budget={level},ledger={level}",
            level = settings.app.level
        ))
        .init();

    let timezone: Tz = settings
        .app
        .timezone
        .parse()
        .map_err(|err| format!("invalid timezone {}: {err}", settings.app.timezone))?;
    let db = parse_database(&settings.database).await?;

    match cli.command {
        Command::Report(args) => report(&db, timezone, args).await,
        Command::Categories(args) => list_categories(&db, args).await,
    }
}

async fn find_user(db: &DatabaseConnection, tg_id: i64) -> AppResult<users::Model> {
    let users = Repository::new(users::managers().build::<users::Entity, _>()?.bind(db)?)?;
    match users.user_by_tg_id(tg_id).await? {
        Some(user) => Ok(user),
        None => Err(format!("no user with telegram id {tg_id}").into()),
    }
}

async fn report(db: &DatabaseConnection, timezone: Tz, args: ReportArgs) -> AppResult<()> {
    let user = find_user(db, args.user).await?;
    let calendar = Calendar::at(&Utc::now().with_timezone(&timezone));
    let window = Window::from(args.window);

    let manager = entries::managers()
        .build_cash_flow::<entries::Entity, _>()?
        .bind(db)?;
    let owner = format!("user_id=={}", user.id);
    let query = manager.window(&calendar, window, Some(&[owner.as_str()][..]), false)?;
    let Some(flow) = query.cash_flow() else {
        return Err("entries manager has no amount field".into());
    };

    let income = flow.income().total_sum().await?;
    let expenses = flow.expenses().total_sum().await?;
    let span = calendar.span(window)?;
    tracing::debug!(user = user.id, ?window, "report computed");

    println!("{} .. {}", span.first, span.last);
    println!("income:   {income:>12} {}", user.budget_currency);
    println!("expenses: {expenses:>12} {}", user.budget_currency);
    println!("balance:  {:>12} {}", income + expenses, user.budget_currency);
    Ok(())
}

async fn list_categories(db: &DatabaseConnection, args: CategoriesArgs) -> AppResult<()> {
    let user = find_user(db, args.user).await?;
    let repository = Repository::new(
        categories::managers()
            .build::<categories::Entity, _>()?
            .bind(db)?,
    )?;

    let page = repository
        .user_categories(user.id, Page::new(args.offset, args.limit))
        .await?;
    if page.is_empty() {
        println!("no categories");
        return Ok(());
    }

    let mut rows = page.into_stream();
    while let Some(category) = rows.try_next().await? {
        let kind = match category.kind {
            categories::CategoryKind::Expenses => "expenses",
            categories::CategoryKind::Income => "income",
        };
        println!(
            "{:>6}  {:<24} {:<8} {:>6} entries, last used {}",
            category.id,
            category.name,
            kind,
            category.num_entries,
            category.last_used.format("%Y-%m-%d")
        );
    }
    Ok(())
}

async fn parse_database(config: &Database) -> AppResult<DatabaseConnection> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    tracing::info!("database ready");
    Ok(database)
}
