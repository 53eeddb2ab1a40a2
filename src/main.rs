//! FOREMAN - Elastic Worker Pool Supervisor
//!
//! Keeps a bounded, demand-responsive fleet of worker processes alive to
//! serve an application workload.
//!
//! ## Usage
//!
//! ```bash
//! # Run a pool of workers over a command
//! foreman -- my-server --port 3000
//!
//! # Bound the pool and tune idle eviction
//! foreman --min 2 --max 8 --idle-time 30s -- my-server
//!
//! # With a config file and lifecycle logging
//! foreman --config pool.yaml --log -- my-server
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use foreman_core::{logging, ForemanError, LogGuard};
use foreman_pool::{pool_channel, CommandHost, PoolConfig, Supervisor, WorkloadSpec};
use tracing::{error, info};

/// FOREMAN Elastic Worker Pool Supervisor
///
/// Starts an initial fleet of worker processes, grows it on demand up to a
/// ceiling, evicts idle workers down to a floor, and replaces crashed
/// workers to keep the floor intact.
#[derive(Parser, Debug)]
#[command(name = "foreman")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Minimum live worker count (overrides the config file)
    #[arg(long)]
    min: Option<usize>,

    /// Maximum live worker count (overrides the config file)
    #[arg(long)]
    max: Option<usize>,

    /// Idle eviction window, e.g. "30s" or "2m" (overrides the config file)
    #[arg(long, value_parser = humantime::parse_duration)]
    idle_time: Option<Duration>,

    /// Ratio of idle time to reap cadence (overrides the config file)
    #[arg(long)]
    reap_ratio: Option<u32>,

    /// Show worker lifecycle events on the console
    #[arg(long)]
    log: bool,

    /// Enable verbose logging (increases log level)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Directory for log files (defaults to ~/.foreman/logs/)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Worker command and arguments, after `--`
    #[arg(last = true)]
    command: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => return report_fatal(e),
    };

    let _guard = match setup_logging(&cli, &config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            return ExitCode::from(1);
        }
    };

    match run_pool(&cli, config) {
        Ok(()) => {
            info!("foreman exited normally");
            ExitCode::SUCCESS
        }
        Err(e) => report_fatal(e),
    }
}

/// Load the config file (if any) and apply CLI overrides on top.
fn load_config(cli: &Cli) -> foreman_core::Result<PoolConfig> {
    let mut config = match &cli.config {
        Some(path) => PoolConfig::load(path)?,
        None => PoolConfig::default(),
    };

    if let Some(min) = cli.min {
        config = config.with_min(min);
    }
    if let Some(max) = cli.max {
        config = config.with_max(max);
    }
    if let Some(idle_time) = cli.idle_time {
        config = config.with_idle_time(idle_time);
    }
    if let Some(ratio) = cli.reap_ratio {
        config = config.with_reap_ratio(ratio);
    }
    if cli.log {
        config = config.with_log(true);
    }

    Ok(config)
}

/// Set up logging based on CLI arguments and the resolved configuration.
fn setup_logging(cli: &Cli, config: &PoolConfig) -> foreman_core::Result<LogGuard> {
    logging::init_logging(cli.log_dir.clone(), cli.verbose, config.log)
}

/// Build the supervisor and drive it until shutdown.
#[tokio::main]
async fn run_pool(cli: &Cli, config: PoolConfig) -> foreman_core::Result<()> {
    let workload = WorkloadSpec::from_command(&cli.command)?;

    let (events_tx, handle, events_rx) = pool_channel();
    let host = CommandHost::new(workload, events_tx);

    let mut supervisor = Supervisor::new(&config, host);
    supervisor.start()?;

    // Ctrl-C posts a shutdown event; the reactor drains it in order with
    // everything else, terminates the workers, and returns.
    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            shutdown_handle.shutdown();
        }
    });

    supervisor.run(events_rx).await;
    Ok(())
}

/// Print a fatal error with guidance and produce a failing exit code.
fn report_fatal(e: ForemanError) -> ExitCode {
    error!(error = %e, "fatal error");
    eprintln!("Error: {e}");
    if let Some(guidance) = e.guidance() {
        eprintln!("  {guidance}");
    }
    ExitCode::from(1)
}
