//! media-catalog
//!
//! Serves the browser extension API, applies migrations, and prints reports.

use clap::Parser;
use media_catalog::config::{AppConfig, Cli, Command};
use media_catalog::core::Database;
use media_catalog::server::{self, CheckResponse};
use media_catalog::AppContext;
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[tokio::main]
async fn main() -> CliResult<()> {
    let cli = Cli::parse();
    let config = AppConfig::from_env()?.with_cli(&cli);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command.clone().unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Migrate => migrate(config).await,
        Command::Report { name, page } => report(config, &name, page).await,
        Command::Check { titles } => check(config, &titles).await,
    }
}

async fn serve(config: AppConfig) -> CliResult<()> {
    let bind = config.bind;
    let ctx = AppContext::open(config).await?;
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|e| format!("Failed to bind {}: {}", bind, e))?;

    server::serve(listener, ctx, async {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
        }
    })
    .await?;
    Ok(())
}

async fn migrate(config: AppConfig) -> CliResult<()> {
    let database = config.database.display().to_string();
    // Opening the context applies pending migrations
    let ctx = AppContext::open(config).await?;
    ctx.database().ping().await?;
    let stats = ctx.database().stats();
    tracing::info!(%database, ?stats, "schema is up to date");
    Ok(())
}

async fn report(config: AppConfig, name: &str, page: usize) -> CliResult<()> {
    let ctx = AppContext::open(config).await?;
    let mut view = ctx.open_report(name).await?;
    view.set_page(page).await?;

    let translations = ctx.translations();
    let columns: Vec<Value> = view
        .definition()
        .columns()
        .iter()
        .map(|column| json!({ "key": column.key(), "label": translations.get(column.label_key()) }))
        .collect();
    let rows: Vec<Value> = view
        .rows()
        .iter()
        .map(|row| {
            let fields: Map<String, Value> = row
                .iter()
                .map(|(key, value)| (key.clone(), value.to_json()))
                .collect();
            Value::Object(fields)
        })
        .collect();

    let output = json!({
        "report": name,
        "page": view.state().page,
        "pageCount": view.page_count(),
        "total": view.total(),
        "columns": columns,
        "rows": rows,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn check(config: AppConfig, titles: &[String]) -> CliResult<()> {
    let ctx = AppContext::open(config).await?;
    let response = match ctx.repository().find_title(titles).await? {
        Some(found) => CheckResponse::from(found),
        None => CheckResponse::not_found(),
    };
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
