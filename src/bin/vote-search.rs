//! Vote search command line entry point.
//!
//! Runs one vote search against the configured database and prints the
//! matching votes as JSON lines.
//!
//! # Usage
//!
//! ```text
//! vote-search [--config <file>] <post|comment|...> key=value ...
//! vote-search post user_id=7 score=">5" order=ip_addr
//! vote-search comment user_name=alice duplicates_only=true
//! ```
//!
//! Logs go to stderr, or to a daily file under `log_dir` when configured.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use votesearch::db;
use votesearch::search::{SearchContext, SearchParams, VoteSearch};
use votesearch::SearchConfig;

#[derive(Parser, Debug)]
#[command(
    name = "vote-search",
    about = "Search post and comment votes by key=value parameters",
    version
)]
struct Args {
    /// Config file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Target kind: post, comment, or a target defined in the config
    target: String,

    /// Search parameters as key=value pairs
    params: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config_path = args.config.unwrap_or_else(SearchConfig::default_path);

    let config = SearchConfig::load(&config_path)
        .with_context(|| format!("Failed to load config {:?}", config_path))?;
    let _guard = init_logging(&config);

    let target = config
        .target(&args.target)
        .with_context(|| format!("Unknown target {:?}", args.target))?;

    let params = SearchParams::from_args(&args.params);
    tracing::info!("Searching {} votes with {} parameter(s)", target.name, params.len());

    let database = db::open_database(&config.database_path)?;
    let conn = database.conn();

    let search = VoteSearch::new(target, db::SqliteUserLookup::new(conn))
        .with_max_id_values(config.max_id_values);
    let query = search.search(&params, &SearchContext::current())?;
    let votes = db::fetch_votes(conn, &query)?;

    for vote in &votes {
        println!("{}", serde_json::to_string(vote)?);
    }

    Ok(())
}

/// Initialize tracing to stderr, or to a daily rotating file if configured.
///
/// The returned guard must stay alive for file logs to be flushed.
fn init_logging(config: &SearchConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("votesearch=info,vote_search=info"));

    let Some(log_dir) = &config.log_dir else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return None;
    };

    if let Err(e) = std::fs::create_dir_all(log_dir) {
        eprintln!("Failed to create log directory {:?}: {}", log_dir, e);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return None;
    }

    let file_appender = tracing_appender::rolling::daily(log_dir, "vote-search.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(filter)
        .with_ansi(false) // No ANSI colors in log files
        .init();

    tracing::info!("Logging initialized to {:?}", log_dir);
    Some(guard)
}
