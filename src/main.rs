//! entropy-guard - heuristic ransomware detection
//!
//! # Usage
//!
//! ```bash
//! # Monitor in the configured mode
//! entropy-guard run
//!
//! # Poll a directory ten times, five seconds apart
//! entropy-guard --directory /srv/share poll --iterations 10 --interval 5
//!
//! # Analyse one file
//! entropy-guard scan /srv/share/report.docx
//! ```

use clap::{Parser, Subcommand};
use entropy_guard::stop::{self, StopSignal};
use entropy_guard::{Config, Guard, SessionSummary};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "entropy-guard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "/etc/entropy-guard/config.yaml")]
    config: PathBuf,

    /// Directory to monitor (overrides the configuration file)
    #[arg(short, long)]
    directory: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Monitor the directory in the configured mode
    Run,

    /// Poll the directory and evaluate new files
    Poll {
        /// Number of detection passes
        #[arg(short, long)]
        iterations: Option<u32>,

        /// Seconds between passes
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Watch the directory for events, then sweep it for active encryption
    Watch {
        /// Observation window in seconds
        #[arg(long)]
        duration: Option<u64>,
    },

    /// Analyse a single file
    Scan {
        /// File to analyse
        path: PathBuf,
    },

    /// Check whether a file is being encrypted right now
    Confirm {
        /// File to sample
        path: PathBuf,
    },

    /// Show configuration
    Config,
}

fn setup_logging(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Stop the session on Ctrl-C
fn stop_on_ctrl_c() -> StopSignal {
    let (handle, signal) = stop::stop_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping...");
            handle.stop();
        }
    });
    signal
}

fn print_summary(summary: &SessionSummary) {
    println!("Files evaluated: {}", summary.evaluated);
    println!("Files flagged:   {}", summary.flagged.len());
    for path in &summary.flagged {
        println!("                 - {:?}", path);
    }
    if !summary.confirmed.is_empty() {
        println!("Encryption confirmed on:");
        for path in &summary.confirmed {
            println!("                 - {:?}", path);
        }
    }
    if summary.cancelled {
        println!("Monitoring was stopped early.");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    // Load configuration
    let mut config = Config::load(&cli.config).unwrap_or_else(|e| {
        if cli.config.exists() {
            error!("Failed to load config: {:#}", e);
            std::process::exit(1);
        }
        info!("Using default configuration");
        Config::default()
    });

    if let Some(directory) = cli.directory {
        config.directory = directory;
    }

    if let Commands::Config = cli.command {
        println!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }

    let guard = Guard::new(config)?;
    let signal = stop_on_ctrl_c();

    match cli.command {
        Commands::Run => {
            let summary = guard.run(&signal).await?;
            print_summary(&summary);
        }

        Commands::Poll {
            iterations,
            interval,
        } => {
            let monitor = &guard.config().monitor;
            let iterations = iterations.unwrap_or(monitor.poll_iterations);
            let interval = Duration::from_secs(interval.unwrap_or(monitor.poll_interval_secs));

            let summary = guard.session().poll(iterations, interval, &signal).await;
            print_summary(&summary);
        }

        Commands::Watch { duration } => {
            let window = duration.unwrap_or(guard.config().monitor.window_secs);
            let summary = guard
                .session()
                .watch(Duration::from_secs(window), &signal)
                .await?;
            print_summary(&summary);
        }

        Commands::Scan { path } => {
            let report = guard.scan(&path).await?;
            for diagnostic in &report.diagnostics {
                println!("note: {}", diagnostic);
            }
            if !report.has_anomaly() {
                println!("{} is probably safe", report.file_name());
            }
        }

        Commands::Confirm { path } => {
            let verdict = guard.confirm(&path, &signal).await;
            println!("{:?}: {:?}", path, verdict);
        }

        // Printed before the engine was built
        Commands::Config => {}
    }

    Ok(())
}
