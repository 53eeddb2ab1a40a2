//! Logging infrastructure for FOREMAN.
//!
//! This module provides structured logging using the `tracing` ecosystem.
//! The supervisor keeps its own logs separate from worker output: workers own
//! stdout (and inherit stderr), while supervisor diagnostics go to stderr and
//! to a JSON-lines log file.
//!
//! ## Features
//!
//! - JSON lines format for machine parsing
//! - File output to `~/.foreman/logs/foreman.log`
//! - Console output to stderr with configurable verbosity
//! - The `log` configuration flag raises lifecycle events to the console
//!
//! ## Example
//!
//! ```no_run
//! use foreman_core::logging;
//!
//! // Initialize logging (call once at startup)
//! let _guard = logging::init_logging(None, 0, false).expect("logging init");
//!
//! // Use tracing macros
//! tracing::info!("pool started");
//! tracing::debug!(worker_id = 3, "spawning worker");
//! ```

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::error::{ForemanError, Result};

/// Guard that must be held to ensure log flushing on shutdown.
///
/// When this guard is dropped, it flushes any pending log entries.
/// Keep this guard alive for the lifetime of the application.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the FOREMAN logging system.
///
/// This sets up:
/// - File logging to `~/.foreman/logs/foreman.log` (JSON lines format)
/// - Console logging to stderr (human-readable format)
///
/// # Arguments
///
/// * `log_dir` - Optional custom log directory. Defaults to `~/.foreman/logs/`
/// * `verbose` - Repeat count of the `-v` flag: 1 = DEBUG, 2+ = TRACE
/// * `lifecycle_log` - The configuration `log` flag; when set (and `verbose`
///   is 0) the console shows INFO lifecycle events instead of WARN and up
///
/// `RUST_LOG` overrides the computed default when set.
///
/// # Returns
///
/// A [`LogGuard`] that must be held for the application lifetime to ensure
/// logs are properly flushed on shutdown.
pub fn init_logging(log_dir: Option<PathBuf>, verbose: u8, lifecycle_log: bool) -> Result<LogGuard> {
    // Determine log directory
    let log_dir = match log_dir {
        Some(dir) => dir,
        None => default_log_dir()?,
    };

    // Ensure log directory exists
    std::fs::create_dir_all(&log_dir).map_err(|e| ForemanError::DirectoryCreation {
        path: log_dir.clone(),
        source: e,
    })?;

    // Set up file appender for JSON logs
    let file_appender = tracing_appender::rolling::daily(&log_dir, "foreman.log");
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    // Determine log level from the verbose flag and the lifecycle `log` flag
    let default_level = match verbose {
        0 if lifecycle_log => "info",
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "foreman={default_level},foreman_core={default_level},foreman_pool={default_level}"
        ))
    });

    // JSON layer for file output
    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .json()
        .with_span_events(FmtSpan::CLOSE)
        .with_current_span(true)
        .with_span_list(true);

    // Human-readable layer for console output
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(verbose > 0)
        .with_line_number(verbose > 0)
        .compact();

    // Combine layers with filter
    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    tracing::debug!(log_dir = %log_dir.display(), verbose, lifecycle_log, "logging initialized");

    Ok(LogGuard {
        _file_guard: Some(file_guard),
    })
}

/// Initialize minimal console-only logging for testing.
///
/// This is a simpler alternative to [`init_logging`] that only logs to stderr.
/// Useful for tests and development.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

/// Get the default log directory path.
///
/// Returns `~/.foreman/logs/`
pub fn default_log_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").map_err(|_| ForemanError::Internal {
        message: "HOME environment variable not set".into(),
    })?;

    Ok(PathBuf::from(home).join(".foreman").join("logs"))
}

/// Get the default FOREMAN log file path.
///
/// Returns `~/.foreman/logs/foreman.log`
pub fn default_log_file() -> Result<PathBuf> {
    Ok(default_log_dir()?.join("foreman.log"))
}

/// Convenience macro for logging worker lifecycle events.
///
/// # Example
///
/// ```ignore
/// log_pool_event!(worker_id, "spawned", pid = 4242);
/// log_pool_event!(worker_id, "reaped", idle_ms = 31_000);
/// ```
#[macro_export]
macro_rules! log_pool_event {
    ($worker_id:expr, $event:expr) => {
        tracing::info!(
            target: "foreman::pool",
            worker_id = $worker_id,
            event = $event,
            "pool event"
        )
    };
    ($worker_id:expr, $event:expr, $($field:tt)*) => {
        tracing::info!(
            target: "foreman::pool",
            worker_id = $worker_id,
            event = $event,
            $($field)*,
            "pool event"
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_default_log_dir() {
        // SAFETY: env mutation is test-only and serialized with #[serial]
        unsafe { std::env::set_var("HOME", "/tmp/test-home") };
        let dir = default_log_dir().unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/test-home/.foreman/logs"));
    }

    #[test]
    #[serial]
    fn test_default_log_file() {
        // SAFETY: env mutation is test-only and serialized with #[serial]
        unsafe { std::env::set_var("HOME", "/tmp/test-home") };
        let file = default_log_file().unwrap();
        assert_eq!(file, PathBuf::from("/tmp/test-home/.foreman/logs/foreman.log"));
    }

    #[test]
    fn test_init_test_logging() {
        // Should not panic
        init_test_logging();
    }
}
