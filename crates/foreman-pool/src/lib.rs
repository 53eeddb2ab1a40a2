//! # foreman-pool
//!
//! The elastic worker-pool control loop for FOREMAN.
//!
//! A [`Supervisor`] keeps a bounded, demand-responsive set of worker
//! processes alive: it fills the pool to a floor at startup, grows it on
//! request up to a ceiling, evicts workers idle beyond a timeout, and
//! replenishes the floor when workers crash. Request distribution among the
//! workers is not its job; it only decides how many workers exist and which
//! are terminated.
//!
//! ## Example
//!
//! ```no_run
//! use foreman_pool::{pool_channel, CommandHost, PoolConfig, Supervisor, WorkloadSpec};
//!
//! #[tokio::main]
//! async fn main() -> foreman_core::Result<()> {
//!     let config = PoolConfig::new().with_min(2).with_max(4);
//!     let workload = WorkloadSpec::from_command(&["my-server".to_string()])?;
//!
//!     let (events_tx, handle, events_rx) = pool_channel();
//!     let host = CommandHost::new(workload, events_tx);
//!
//!     let mut supervisor = Supervisor::new(&config, host);
//!     supervisor.start()?;
//!
//!     // An external load signal can drive growth at any time.
//!     handle.grow();
//!
//!     supervisor.run(events_rx).await;
//!     Ok(())
//! }
//! ```

pub mod bounds;
pub mod config;
pub mod host;
pub mod reaper;
pub mod registry;
pub mod respawn;
pub mod signal;
pub mod supervisor;

#[cfg(test)]
mod lifecycle_tests;

// Re-export the main types for convenience
pub use bounds::{host_parallelism, BoundsAdvisory, PoolBounds};
pub use config::PoolConfig;
pub use host::{CommandHost, ProcessHost, WorkerExit, WorkerHandle, WorkloadSpec};
pub use registry::{WorkerRecord, WorkerRegistry};
pub use signal::WorkerSignal;
pub use supervisor::{pool_channel, PoolEvent, PoolHandle, PoolStatus, Supervisor};
