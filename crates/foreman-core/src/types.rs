//! Shared type definitions used across FOREMAN crates.

use chrono::{DateTime, Utc};

/// Unique identifier for a worker, handed out monotonically by the process
/// host. Unique among live workers; never reused within one supervisor run.
pub type WorkerId = u64;

/// Native OS process id, kept for display and debugging only.
pub type Pid = u32;

/// Timestamp type used throughout FOREMAN.
pub type Timestamp = DateTime<Utc>;

/// Get the current UTC timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}
