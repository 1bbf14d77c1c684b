//! rewardflow CLI
//!
//! Runs the daily check-in and share campaign for every configured account.
//!
//! Usage:
//!   REWARDFLOW_ACCOUNTS='[{"username":"a@b.c","password":"..."}]' \
//!     rewardflow --base-url https://example.com
//!   rewardflow --config rewardflow.yaml --accounts-file accounts.json --workers 2

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use rewardflow::platforms::{create_session_factory, BrowserOptions};
use rewardflow::{
    load_accounts_from_env, load_accounts_from_file, RunSummary, Runner, Settings, ACCOUNTS_ENV,
};

#[derive(Parser, Debug)]
#[command(name = "rewardflow")]
#[command(about = "Daily check-in and share campaign runner")]
struct Args {
    /// Settings file (.yaml, .yml or .json); defaults apply when omitted
    #[arg(long, short = 'c', env = "REWARDFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// JSON file with the accounts; otherwise read from $REWARDFLOW_ACCOUNTS
    #[arg(long, short = 'a')]
    accounts_file: Option<PathBuf>,

    /// Site origin, overriding site.base_url
    #[arg(long, env = "REWARDFLOW_BASE_URL")]
    base_url: Option<String>,

    /// Accounts processed in parallel, overriding runner.workers
    #[arg(long, short = 'w')]
    workers: Option<usize>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Browser executable
    #[arg(long, env = "CHROME_PATH")]
    chrome: Option<PathBuf>,

    /// Directory for the rolling log file
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    /// Directory for failure screenshots and page sources, overriding diagnostics_dir
    #[arg(long)]
    diagnostics_dir: Option<PathBuf>,
}

fn init_logging(log_dir: &Path) -> Result<WorkerGuard> {
    use tracing_appender::rolling;

    let log_level = env::var("LOG_LEVEL")
        .map(|level| match level.to_lowercase().as_str() {
            "error" => Level::ERROR,
            "warn" => Level::WARN,
            "info" => Level::INFO,
            "debug" => Level::DEBUG,
            "trace" => Level::TRACE,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);

    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let (file_writer, guard) = tracing_appender::non_blocking(rolling::daily(log_dir, "rewardflow.log"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(EnvFilter::from_default_env().add_directive(log_level.into())),
        )
        .with(
            fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(EnvFilter::from_default_env().add_directive(log_level.into())),
        )
        .try_init()
        .context("Failed to install the log subscriber")?;

    Ok(guard)
}

fn load_settings(args: &Args) -> Result<Settings> {
    let mut settings = match &args.config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::default(),
    };
    if let Some(base_url) = &args.base_url {
        settings.site.base_url = base_url.clone();
    }
    if let Some(workers) = args.workers {
        settings.runner.workers = workers;
    }
    if let Some(dir) = &args.diagnostics_dir {
        settings.diagnostics_dir = Some(dir.clone());
    }
    settings.validate()?;
    Ok(settings)
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("{}", "=".repeat(40));
    println!(
        "Accounts processed: {}  {}  {}",
        summary.total(),
        format!("done: {}", summary.done).green().bold(),
        if summary.failed > 0 {
            format!("failed: {}", summary.failed).red().bold()
        } else {
            format!("failed: {}", summary.failed).normal()
        }
    );
    println!("{}", "=".repeat(40));
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let _log_guard = init_logging(&args.log_dir)?;

    let settings = load_settings(&args).context("Invalid configuration")?;
    let accounts = match &args.accounts_file {
        Some(path) => load_accounts_from_file(path),
        None => load_accounts_from_env(ACCOUNTS_ENV),
    }
    .context("Could not load accounts")?;
    info!(
        accounts = accounts.len(),
        base_url = %settings.site.base_url,
        "Configuration loaded"
    );

    let factory = create_session_factory(BrowserOptions {
        headed: args.headed,
        executable: args.chrome.clone(),
        ..BrowserOptions::default()
    })?;

    let results = Runner::new(factory, Arc::new(settings)).run(accounts).await;
    let summary = RunSummary::from_results(&results);
    for failed in results.iter().filter(|r| !r.is_success()) {
        if let Some(e) = &failed.failure {
            error!(account = %failed.account_id, error = %e, "Account failed");
        }
    }
    print_summary(&summary);
    Ok(())
}
