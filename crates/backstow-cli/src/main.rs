//! Backstow - backup storage command-line tool

use backstow_cli::{execute, BackstowConfig, Command};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "backstow")]
#[command(about = "Browse backup storage and manage backup data keys")]
#[command(version)]
struct Args {
    /// Configuration file (default: ./backstow.toml if present)
    #[arg(short, long, env = "BACKSTOW_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, env = "BACKSTOW_DEBUG")]
    debug: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Logs go to stderr so stdout stays clean for `get` and `--json`
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "backstow_cli={level},backstow_core={level},backstow_storage={level},backstow_crypto={level}",
                    level = log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = BackstowConfig::load(args.config.as_deref())?;
    let root = config.open_root()?;
    tracing::debug!(backend = root.kind(), root = root.get_path(), "storage ready");

    execute(args.command, &root, &config, args.json).await
}
