//! Pool configuration.
//!
//! The configuration surface is deliberately small: two worker-count bounds,
//! the idle-eviction window, a lifecycle-logging flag, and the reap-cadence
//! ratio. Every field is optional; defaults are safe for a typical host.
//!
//! Config files are YAML with camelCase keys; durations are integer
//! milliseconds on the wire:
//!
//! ```yaml
//! max: 8
//! min: 2
//! idleTime: 30000
//! log: false
//! reapRatio: 10
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use foreman_core::{ForemanError, Result};

/// Default minimum worker count.
pub const DEFAULT_MIN_WORKERS: usize = 2;

/// Default idle-eviction window.
pub const DEFAULT_IDLE_TIME: Duration = Duration::from_millis(30_000);

/// Default ratio of idle timeout to reap cadence.
pub const DEFAULT_REAP_RATIO: u32 = 10;

/// Raw pool configuration, before bound resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PoolConfig {
    /// Worker ceiling. `None` means the host's parallelism capacity.
    pub max: Option<usize>,

    /// Worker floor.
    pub min: usize,

    /// Idle-eviction window.
    #[serde(with = "duration_millis")]
    pub idle_time: Duration,

    /// Raise lifecycle events to the console.
    pub log: bool,

    /// Idle timeout divided by this gives the reap cadence.
    pub reap_ratio: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max: None,
            min: DEFAULT_MIN_WORKERS,
            idle_time: DEFAULT_IDLE_TIME,
            log: false,
            reap_ratio: DEFAULT_REAP_RATIO,
        }
    }
}

impl PoolConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker ceiling.
    pub fn with_max(mut self, max: usize) -> Self {
        self.max = Some(max);
        self
    }

    /// Set the worker floor.
    pub fn with_min(mut self, min: usize) -> Self {
        self.min = min;
        self
    }

    /// Set the idle-eviction window.
    pub fn with_idle_time(mut self, idle_time: Duration) -> Self {
        self.idle_time = idle_time;
        self
    }

    /// Enable or disable lifecycle logging.
    pub fn with_log(mut self, log: bool) -> Self {
        self.log = log;
        self
    }

    /// Set the reap-cadence ratio.
    pub fn with_reap_ratio(mut self, ratio: u32) -> Self {
        self.reap_ratio = ratio;
        self
    }

    /// Load configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ForemanError::config_not_found_with_source(path, e)
            } else {
                ForemanError::io("reading config", path, e)
            }
        })?;

        serde_yaml::from_str(&content)
            .map_err(|e| ForemanError::config_invalid(path, e.to_string()))
    }
}

/// Serde support for `Duration` as integer milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
