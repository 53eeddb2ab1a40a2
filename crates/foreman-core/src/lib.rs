//! # foreman-core
//!
//! Core types, errors, and utilities for the FOREMAN worker-pool supervisor.
//!
//! This crate provides:
//! - [`ForemanError`] - Error types for all FOREMAN operations
//! - [`logging`] - Tracing setup and log management utilities
//! - [`types`] - Shared type definitions used across FOREMAN crates
//!
//! ## Example
//!
//! ```no_run
//! use foreman_core::{ForemanError, logging};
//!
//! fn main() -> foreman_core::Result<()> {
//!     // Initialize logging
//!     let _guard = logging::init_logging(None, 0, false)?;
//!
//!     // Use FOREMAN errors
//!     let command: Vec<String> = std::env::args().skip(1).collect();
//!     if command.is_empty() {
//!         return Err(ForemanError::WorkloadMissing);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export main types for convenience
pub use error::{ForemanError, Result};
pub use logging::{LogGuard, init_logging};
pub use types::{Pid, Timestamp, WorkerId};
