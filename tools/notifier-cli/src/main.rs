//! PriceNotifier interactive shell
//!
//! Reads commands from stdin (or a script file), drives the engine and prints
//! results. Engine rejections are reported and the session continues.

mod config;
mod interactive;
mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use config::Overrides;
use interactive::InteractiveCLI;
use price_notifier::PriceNotifier;
use std::fs::File;
use std::io::{self, BufReader, IsTerminal};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "notifier-cli")]
#[command(about = "Interactive shell for the PriceNotifier engine")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run commands from a file instead of stdin
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log format (compact, pretty, json)
    #[arg(long)]
    log_format: Option<String>,

    /// Delivery worker threads
    #[arg(short, long)]
    workers: Option<usize>,

    /// Per-delivery deadline in milliseconds
    #[arg(long, conflicts_with = "no_delivery_timeout")]
    delivery_timeout_ms: Option<u64>,

    /// Let deliveries run without a deadline
    #[arg(long)]
    no_delivery_timeout: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let overrides = Overrides {
        log_level: cli.log_level,
        log_format: cli.log_format,
        workers: cli.workers,
        delivery_timeout_ms: cli.delivery_timeout_ms,
        no_delivery_timeout: cli.no_delivery_timeout,
    };
    let config =
        config::load_config(cli.config.as_deref(), &overrides).context("Failed to load configuration")?;

    logging::initialize_logging(&config.logging.level, &config.logging.format)?;
    info!("Starting notifier-cli v{}", env!("CARGO_PKG_VERSION"));

    let notifier = PriceNotifier::new(config.notifier).context("Failed to start engine")?;
    let mut shell = InteractiveCLI::new(notifier);

    match cli.script {
        Some(path) => {
            let file = File::open(&path)
                .with_context(|| format!("Failed to open script: {}", path.display()))?;
            shell.run(BufReader::new(file), false)
        }
        None => {
            let stdin = io::stdin();
            let interactive = stdin.is_terminal();
            shell.run(stdin.lock(), interactive)
        }
    }
}
