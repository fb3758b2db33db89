//! `mercato`: the retail analytics server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! fact store, and then either serves the JSON API, seeds the store with
//! synthetic data, or prints an offline analysis report.
//!
//! ```text
//! mercato generate --weeks 104
//! mercato serve
//! mercato analyze --start 2024-01-01 --end 2024-06-30
//! ```

mod settings;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use mercato_api::AppState;
use mercato_core::{
  filter::{DateRange, SalesFilter},
  report::Report,
  service::Analytics,
  synthetic::{self, GeneratorConfig},
};
use mercato_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

use crate::settings::ServerConfig;

#[derive(Parser)]
#[command(author, version, about = "Mercato retail analytics server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml", global = true)]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the JSON API (the default).
  Serve,

  /// Fill an empty store with seeded synthetic sales.
  Generate {
    /// Number of weekly observations per store and department.
    #[arg(long, default_value_t = 104)]
    weeks: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Date of the last week (YYYY-MM-DD); defaults to today.
    #[arg(long)]
    end: Option<NaiveDate>,
  },

  /// Print the composite analysis report as JSON.
  Analyze {
    #[arg(long)]
    start: Option<NaiveDate>,

    #[arg(long)]
    end: Option<NaiveDate>,

    #[arg(long)]
    store_id: Option<i64>,

    #[arg(long)]
    dept_id: Option<i64>,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let server_cfg = ServerConfig::load(&cli.config)?;

  // Open SQLite store.
  let db_path = &server_cfg.database_path;
  let store = SqliteStore::open(db_path)
    .await
    .with_context(|| format!("failed to open store at {db_path:?}"))?;
  let analytics = Analytics::new(Arc::new(store), server_cfg.analytics.clone());

  match cli.command.unwrap_or(Command::Serve) {
    Command::Serve => serve(analytics, &server_cfg).await,
    Command::Generate { weeks, seed, end } => {
      let end = end.unwrap_or_else(|| Utc::now().date_naive());
      generate(&analytics, GeneratorConfig::ending(end, weeks, seed)).await
    }
    Command::Analyze { start, end, store_id, dept_id } => {
      if let (Some(start), Some(end)) = (start, end) {
        DateRange::new(start, end)?;
      }
      let filter = SalesFilter { start, end, store_id, dept_id, year: None };
      analyze(&analytics, &filter).await
    }
  }
}

async fn serve(
  analytics: Analytics<SqliteStore>,
  server_cfg: &ServerConfig,
) -> anyhow::Result<()> {
  let state = AppState { analytics, limits: server_cfg.limits() };
  let app = mercato_api::router(state).layer(TraceLayer::new_for_http());
  let address = server_cfg.address();

  info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;
  Ok(())
}

async fn generate(
  analytics: &Analytics<SqliteStore>,
  gen_cfg: GeneratorConfig,
) -> anyhow::Result<()> {
  info!(
    start = %gen_cfg.start,
    weeks = gen_cfg.weeks,
    seed = gen_cfg.seed,
    "generating sales"
  );
  let dataset = synthetic::generate(&gen_cfg);
  let written = analytics
    .bulk_load(dataset)
    .await
    .context("failed to load generated data")?;
  info!(facts = written, "store seeded");
  Ok(())
}

async fn analyze(
  analytics: &Analytics<SqliteStore>,
  filter: &SalesFilter,
) -> anyhow::Result<()> {
  let inputs = analytics
    .report_inputs(filter)
    .await
    .context("failed to read facts")?;
  let config = analytics.config().clone();
  let report = tokio::task::spawn_blocking(move || Report::build(&inputs, &config))
    .await
    .context("analysis worker failed")?;
  println!(
    "{}",
    serde_json::to_string_pretty(&report).context("failed to encode report")?
  );
  Ok(())
}
