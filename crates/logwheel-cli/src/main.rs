mod check;
mod service;

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "logwheel", about = "Scheduled log rotation service")]
struct Cli {
    /// Log filter used when RUST_LOG is not set (e.g. "debug")
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Write logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the rotation scheduler in the foreground until Ctrl-C
    Run {
        /// Policy config file (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Seconds between two schedule checks
        #[arg(long, default_value_t = 1)]
        tick_secs: u64,
    },
    /// Validate a config file and list its policies
    Check {
        /// Policy config file (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Print the policies as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run every policy once and exit
    Once {
        /// Policy config file (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Rotate even if the schedule is not due
        #[arg(long)]
        force: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_file.as_deref(), cli.log_json)?;

    match cli.command {
        Commands::Run { config, tick_secs } => {
            let tick = Duration::from_secs(tick_secs.max(1));
            service::run(&config, tick)?;
        }
        Commands::Check { config, json } => {
            check::run_check(&config, json)?;
        }
        Commands::Once { config, force } => {
            service::once(&config, force)?;
        }
    }

    Ok(())
}

fn init_tracing(level: &str, log_file: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("Invalid log level '{level}'"))?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let builder = builder.with_ansi(false).with_writer(Mutex::new(file));
            if json {
                builder.json().init();
            } else {
                builder.init();
            }
        }
        None => {
            let builder = builder.with_writer(std::io::stderr);
            if json {
                builder.json().init();
            } else {
                builder.init();
            }
        }
    }

    Ok(())
}
