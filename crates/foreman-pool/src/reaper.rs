//! Idle-victim selection for the reaper tick.
//!
//! Selection is a pure function over the registry, the bounds, and a
//! timestamp, so the floor arithmetic is testable without processes or
//! clocks. The supervisor performs the actual terminations.

use chrono::Duration as ChronoDuration;

use foreman_core::types::{Timestamp, WorkerId};

use crate::bounds::PoolBounds;
use crate::registry::WorkerRegistry;

/// Select the workers an idle sweep at `now` should evict.
///
/// Workers are evaluated in registry order. A worker is a victim when its
/// idle age strictly exceeds the timeout *and* evicting it keeps the pool at
/// or above the floor. The floor is re-checked after each selection, so the
/// sweep may pick several victims but never enough to drop below the floor,
/// even when every worker is simultaneously idle.
pub fn select_idle_victims(
    registry: &WorkerRegistry,
    bounds: &PoolBounds,
    now: Timestamp,
) -> Vec<WorkerId> {
    let idle_timeout = ChronoDuration::from_std(bounds.idle_timeout)
        .unwrap_or_else(|_| ChronoDuration::MAX);

    let mut remaining = registry.len();
    let mut victims = Vec::new();

    for record in registry.iter() {
        if remaining <= bounds.floor {
            break;
        }
        let idle_for = now.signed_duration_since(record.last_active_at);
        if idle_for > idle_timeout {
            victims.push(record.id);
            remaining -= 1;
        }
    }

    victims
}
