//! Bound resolution: raw configuration to effective pool bounds.
//!
//! Resolution never rejects configuration. Every out-of-range value is
//! clamped into range and the adjustment is reported as a
//! [`BoundsAdvisory`], which the caller logs exactly once at startup.

use std::time::Duration;

use serde::Serialize;

use crate::config::PoolConfig;

/// Idle timeouts below this are raised to it.
pub const IDLE_TIMEOUT_FLOOR: Duration = Duration::from_millis(10_000);

/// Reap intervals below this are raised to it, so a tiny idle timeout
/// cannot turn the reaper tick into a busy spin.
pub const REAP_INTERVAL_FLOOR: Duration = Duration::from_millis(500);

/// Effective pool bounds, immutable after startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolBounds {
    /// Minimum live worker count.
    pub floor: usize,
    /// Maximum live worker count.
    pub ceiling: usize,
    /// Window of no liveness signals after which a worker is eviction-eligible.
    pub idle_timeout: Duration,
    /// Cadence of the idle-reaper tick; materially shorter than the timeout.
    pub reap_interval: Duration,
}

/// A non-fatal adjustment made while resolving bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum BoundsAdvisory {
    /// The configured ceiling exceeded host parallelism capacity.
    CeilingOverCapacity { configured: usize, capacity: usize },
    /// The configured floor exceeded the effective ceiling.
    FloorOverCeiling { configured: usize, ceiling: usize },
    /// The configured idle timeout was below the safety floor.
    IdleTimeoutBelowFloor { configured_ms: u64, floor_ms: u64 },
}

impl std::fmt::Display for BoundsAdvisory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CeilingOverCapacity { configured, capacity } => write!(
                f,
                "configured max {configured} exceeds host capacity {capacity}; using {capacity}"
            ),
            Self::FloorOverCeiling { configured, ceiling } => write!(
                f,
                "configured min {configured} exceeds effective max {ceiling}; using {ceiling}"
            ),
            Self::IdleTimeoutBelowFloor { configured_ms, floor_ms } => write!(
                f,
                "configured idleTime {configured_ms}ms is below the {floor_ms}ms safety floor; using {floor_ms}ms"
            ),
        }
    }
}

impl PoolBounds {
    /// Resolve effective bounds from raw configuration and host capacity.
    ///
    /// Always succeeds; adjustments are returned as advisories alongside
    /// the bounds.
    pub fn resolve(config: &PoolConfig, capacity: usize) -> (Self, Vec<BoundsAdvisory>) {
        let capacity = capacity.max(1);
        let mut advisories = Vec::new();

        let configured_ceiling = config.max.unwrap_or(capacity).max(1);
        let ceiling = if configured_ceiling > capacity {
            advisories.push(BoundsAdvisory::CeilingOverCapacity {
                configured: configured_ceiling,
                capacity,
            });
            capacity
        } else {
            configured_ceiling
        };

        let configured_floor = config.min.max(1);
        let floor = if configured_floor > ceiling {
            advisories.push(BoundsAdvisory::FloorOverCeiling {
                configured: configured_floor,
                ceiling,
            });
            ceiling
        } else {
            configured_floor
        };

        let idle_timeout = if config.idle_time < IDLE_TIMEOUT_FLOOR {
            advisories.push(BoundsAdvisory::IdleTimeoutBelowFloor {
                configured_ms: config.idle_time.as_millis() as u64,
                floor_ms: IDLE_TIMEOUT_FLOOR.as_millis() as u64,
            });
            IDLE_TIMEOUT_FLOOR
        } else {
            config.idle_time
        };

        let reap_interval = (idle_timeout / config.reap_ratio.max(1))
            .max(REAP_INTERVAL_FLOOR)
            .min(idle_timeout);

        (
            Self {
                floor,
                ceiling,
                idle_timeout,
                reap_interval,
            },
            advisories,
        )
    }
}

/// Host-reported parallelism capacity, falling back to 1.
pub fn host_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
