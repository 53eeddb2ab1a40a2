//! Error types for FOREMAN operations.
//!
//! This module defines [`ForemanError`], the error enum shared across the
//! FOREMAN crates. Errors are designed for visibility: recoverable conditions
//! are logged and handled in place, fatal ones carry actionable guidance.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`ForemanError`].
pub type Result<T> = std::result::Result<T, ForemanError>;

/// Error type for all FOREMAN operations.
#[derive(Debug, Error)]
pub enum ForemanError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration file not found
    #[error("Configuration not found at {path}")]
    ConfigNotFound {
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Configuration file is invalid YAML
    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    // =========================================================================
    // Workload Errors
    // =========================================================================
    /// No worker command was given
    #[error("No worker command given")]
    WorkloadMissing,

    /// The host refused to create a worker process
    #[error("Failed to spawn worker process `{program}`")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The very first spawn failed with no workers live: the workload is
    /// not launchable at all
    #[error("Workload `{program}` failed to launch")]
    WorkloadUnlaunchable {
        program: String,
        #[source]
        source: std::io::Error,
    },

    // =========================================================================
    // I/O Errors
    // =========================================================================
    /// Generic I/O error with context
    #[error("I/O error {operation}: {path}")]
    Io {
        operation: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory creation failed
    #[error("Failed to create directory: {path}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal error (bug in FOREMAN)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ForemanError {
    // =========================================================================
    // Constructor helpers for common error patterns
    // =========================================================================

    /// Create a ConfigNotFound error
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ConfigNotFound {
            path: path.into(),
            source: None,
        }
    }

    /// Create a ConfigNotFound error with source
    pub fn config_not_found_with_source(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ConfigNotFound {
            path: path.into(),
            source: Some(source),
        }
    }

    /// Create a ConfigInvalid error
    pub fn config_invalid(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a SpawnFailed error
    pub fn spawn_failed(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::SpawnFailed {
            program: program.into(),
            source,
        }
    }

    /// Create a WorkloadUnlaunchable error
    pub fn workload_unlaunchable(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::WorkloadUnlaunchable {
            program: program.into(),
            source,
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: path.into(),
            source,
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    // =========================================================================
    // Error classification helpers
    // =========================================================================

    /// Returns true if the supervisor can keep running after this error.
    ///
    /// Spawn failures are recoverable: they are handled like an immediate
    /// worker exit and retried by the floor re-check. A first spawn that
    /// fails with nothing live is reported as [`Self::WorkloadUnlaunchable`]
    /// instead, which is fatal.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::SpawnFailed { .. })
    }

    /// Returns true if this error must stop the supervisor at startup.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::WorkloadMissing | Self::WorkloadUnlaunchable { .. } | Self::Internal { .. }
        )
    }

    /// Returns true if this is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound { .. } | Self::ConfigInvalid { .. }
        )
    }

    /// Returns actionable guidance for the user
    pub fn guidance(&self) -> Option<&'static str> {
        match self {
            Self::ConfigNotFound { .. } => {
                Some("Pass --config with a readable file, or omit it to use defaults")
            }
            Self::ConfigInvalid { .. } => {
                Some("Check YAML syntax and key names (max, min, idleTime, log, reapRatio)")
            }
            Self::WorkloadMissing => {
                Some("Give the worker command after '--', e.g. 'foreman -- my-server'")
            }
            Self::SpawnFailed { .. } | Self::WorkloadUnlaunchable { .. } => {
                Some("Check that the worker command exists and is executable")
            }
            _ => None,
        }
    }
}
