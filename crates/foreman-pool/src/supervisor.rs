//! The worker supervisor: owner of the registry and the scaling policy.
//!
//! One supervisor owns the registry, the bounds, and the respawn governor
//! exclusively. Everything that mutates the pool flows through its
//! operations, serialized by the [`Supervisor::run`] reactor, so no locking
//! is needed anywhere.
//!
//! ## Reactive behaviors
//!
//! - **Initial fill**: `start` spawns workers until the pool reaches the
//!   floor.
//! - **Replenishment**: a worker exit below the floor triggers exactly one
//!   governed replacement; the reaper tick re-checks the floor and retries
//!   after failures.
//! - **Growth**: `spawn_if_under_ceiling` adds one worker while under the
//!   ceiling. The reactor never invokes it on its own; an external load
//!   signal drives it through [`PoolHandle::grow`].
//! - **Idle reaping**: each tick evicts workers idle beyond the timeout,
//!   never shrinking below the floor.

use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use foreman_core::log_pool_event;
use foreman_core::types::{now, WorkerId};
use foreman_core::{ForemanError, Result};

use crate::bounds::{host_parallelism, BoundsAdvisory, PoolBounds};
use crate::config::PoolConfig;
use crate::host::{ProcessHost, WorkerExit};
use crate::reaper::select_idle_victims;
use crate::registry::WorkerRegistry;
use crate::respawn::RespawnGovernor;

/// An event serialized onto the supervisor's reactor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolEvent {
    /// A worker process terminated for any reason.
    WorkerExited(WorkerExit),
    /// A worker reported handling a unit of work.
    Heartbeat { id: WorkerId },
    /// An external load signal requested one more worker.
    Grow,
    /// Terminate all workers and stop the reactor.
    Shutdown,
}

/// Cheap snapshot of the pool for logging and embedders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Current live worker count.
    pub live: usize,
    /// Minimum live worker count.
    pub floor: usize,
    /// Maximum live worker count.
    pub ceiling: usize,
}

/// Sending side of the pool's event channel.
///
/// Cloneable; any task may post growth or shutdown requests. The host posts
/// exits and heartbeats through the same channel.
#[derive(Debug, Clone)]
pub struct PoolHandle {
    events: mpsc::UnboundedSender<PoolEvent>,
}

impl PoolHandle {
    /// Request one more worker, honored only while under the ceiling.
    pub fn grow(&self) {
        let _ = self.events.send(PoolEvent::Grow);
    }

    /// Request graceful shutdown.
    pub fn shutdown(&self) {
        let _ = self.events.send(PoolEvent::Shutdown);
    }
}

/// Create the pool event channel.
///
/// The receiver goes to [`Supervisor::run`]; the raw sender goes to the
/// process host, and the [`PoolHandle`] to anything that needs to drive
/// growth or shutdown.
pub fn pool_channel() -> (
    mpsc::UnboundedSender<PoolEvent>,
    PoolHandle,
    mpsc::UnboundedReceiver<PoolEvent>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = PoolHandle { events: tx.clone() };
    (tx, handle, rx)
}

/// The elastic worker-pool supervisor.
pub struct Supervisor<H: ProcessHost> {
    host: H,
    registry: WorkerRegistry,
    bounds: PoolBounds,
    governor: RespawnGovernor,
    /// Advisories from bound resolution, logged once by `start`.
    advisories: Vec<BoundsAdvisory>,
}

impl<H: ProcessHost> Supervisor<H> {
    /// Create a supervisor, resolving bounds against the host's capacity.
    pub fn new(config: &PoolConfig, host: H) -> Self {
        Self::with_capacity(config, host, host_parallelism())
    }

    /// Create a supervisor with an explicit capacity, for embedders and tests.
    pub fn with_capacity(config: &PoolConfig, host: H, capacity: usize) -> Self {
        let (bounds, advisories) = PoolBounds::resolve(config, capacity);
        Self {
            host,
            registry: WorkerRegistry::new(),
            bounds,
            governor: RespawnGovernor::new(),
            advisories,
        }
    }

    /// The effective bounds this supervisor enforces.
    pub fn bounds(&self) -> &PoolBounds {
        &self.bounds
    }

    /// Snapshot the pool state.
    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            live: self.registry.len(),
            floor: self.bounds.floor,
            ceiling: self.bounds.ceiling,
        }
    }

    /// Fill the pool to the floor.
    ///
    /// Logs each bound-resolution advisory exactly once, then spawns workers
    /// one at a time until the live count reaches the floor. A failure on
    /// the very first spawn, with nothing live yet, means the workload is
    /// not launchable and is returned as fatal. Failures after at least one
    /// success are the recoverable kind: the fill stops and the reaper
    /// tick's floor re-check keeps retrying.
    #[instrument(skip(self), fields(floor = self.bounds.floor, ceiling = self.bounds.ceiling))]
    pub fn start(&mut self) -> Result<()> {
        for advisory in std::mem::take(&mut self.advisories) {
            warn!(advisory = ?advisory, "{advisory}");
        }

        info!(
            floor = self.bounds.floor,
            ceiling = self.bounds.ceiling,
            idle_timeout_ms = self.bounds.idle_timeout.as_millis() as u64,
            reap_interval_ms = self.bounds.reap_interval.as_millis() as u64,
            "starting worker pool"
        );

        while self.registry.len() < self.bounds.floor {
            match self.host.spawn() {
                Ok(handle) => {
                    self.registry.insert(handle.id, handle.pid, now());
                    log_pool_event!(handle.id, "spawned", pid = handle.pid);
                }
                Err(e) if self.registry.is_empty() => {
                    error!(error = %e, "first spawn failed with no workers live");
                    return Err(match e {
                        ForemanError::SpawnFailed { program, source } => {
                            ForemanError::workload_unlaunchable(program, source)
                        }
                        other => other,
                    });
                }
                Err(e) => {
                    error!(error = %e, live = self.registry.len(), "spawn failed during initial fill");
                    self.governor.record_failure(now());
                    break;
                }
            }
        }

        info!(live = self.registry.len(), "worker pool started");
        Ok(())
    }

    /// Handle a worker exit notification.
    ///
    /// Idempotent: an exit for an id that is not live (already terminated,
    /// already handled) changes nothing. When the removal drops the pool
    /// below the floor, exactly one governed replacement is attempted; each
    /// exit triggers at most one, so racing exits converge without
    /// overshoot.
    pub fn on_worker_exited(&mut self, exit: WorkerExit) {
        let Some(record) = self.registry.remove(exit.id) else {
            debug!(worker_id = exit.id, "exit for untracked worker ignored");
            return;
        };

        log_pool_event!(
            record.id,
            "exited",
            pid = record.pid,
            exit_code = exit.exit_code,
            signal = exit.signal
        );

        if self.registry.len() < self.bounds.floor {
            info!(
                live = self.registry.len(),
                floor = self.bounds.floor,
                "below floor, replenishing"
            );
            self.replenish_one();
        }
    }

    /// Handle a liveness signal: reset the worker's idle clock.
    ///
    /// Unknown ids are dropped silently so a worker racing its own
    /// termination can never resurrect a stale record.
    pub fn on_signal(&mut self, id: WorkerId) {
        if self.registry.touch(id, now()) {
            debug!(worker_id = id, "heartbeat");
        } else {
            debug!(worker_id = id, "heartbeat for untracked worker ignored");
        }
    }

    /// Grow the pool by one worker if under the ceiling.
    ///
    /// The sole growth path. Not governed: an operator or load signal asked
    /// for it explicitly.
    pub fn spawn_if_under_ceiling(&mut self) {
        if self.registry.len() >= self.bounds.ceiling {
            debug!(
                live = self.registry.len(),
                ceiling = self.bounds.ceiling,
                "growth request at ceiling ignored"
            );
            return;
        }

        match self.host.spawn() {
            Ok(handle) => {
                self.registry.insert(handle.id, handle.pid, now());
                log_pool_event!(handle.id, "spawned", pid = handle.pid, reason = "growth");
            }
            Err(e) => {
                error!(error = %e, "growth spawn failed");
            }
        }
    }

    /// Terminate a worker and drop its record immediately.
    ///
    /// Bookkeeping does not wait for exit confirmation; the later exit
    /// notification for this id is a no-op in [`Self::on_worker_exited`].
    pub fn terminate(&mut self, id: WorkerId) {
        if let Some(record) = self.registry.remove(id) {
            self.host.terminate(id);
            log_pool_event!(record.id, "terminated", pid = record.pid);
        } else {
            debug!(worker_id = id, "terminate for untracked worker ignored");
        }
    }

    /// One reaper tick: evict idle workers above the floor, then re-check
    /// the floor in case earlier replenishment failed or was suppressed.
    pub fn on_tick(&mut self) {
        let tick_now = now();

        let victims = select_idle_victims(&self.registry, &self.bounds, tick_now);
        for id in victims {
            // One lifecycle line per eviction; terminate() logs its own
            // "terminated" event, so the removal is inlined here.
            if let Some(record) = self.registry.remove(id) {
                self.host.terminate(id);
                log_pool_event!(
                    record.id,
                    "reaped",
                    pid = record.pid,
                    idle_ms = tick_now
                        .signed_duration_since(record.last_active_at)
                        .num_milliseconds()
                );
            }
        }

        while self.registry.len() < self.bounds.floor {
            if !self.replenish_one() {
                break;
            }
        }
    }

    /// Terminate every live worker and clear the registry.
    pub fn shutdown(&mut self) {
        info!(live = self.registry.len(), "shutting down worker pool");
        for id in self.registry.ids() {
            self.terminate(id);
        }
        self.registry.clear();
    }

    /// The reactor loop: consume pool events and drive reaper ticks until
    /// shutdown is requested or every event sender is gone.
    ///
    /// Events are processed strictly one at a time in arrival order; no two
    /// registry mutations ever interleave.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<PoolEvent>) {
        let mut ticker = tokio::time::interval(self.bounds.reap_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first interval tick fires immediately; swallow it.
        ticker.tick().await;

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(PoolEvent::WorkerExited(exit)) => self.on_worker_exited(exit),
                    Some(PoolEvent::Heartbeat { id }) => self.on_signal(id),
                    Some(PoolEvent::Grow) => self.spawn_if_under_ceiling(),
                    Some(PoolEvent::Shutdown) => {
                        self.shutdown();
                        break;
                    }
                    None => {
                        debug!("event channel closed, stopping reactor");
                        self.shutdown();
                        break;
                    }
                },
                _ = ticker.tick() => self.on_tick(),
            }
        }

        info!("worker pool reactor stopped");
    }

    /// Attempt one governed replacement spawn. Returns true on success.
    ///
    /// Denials and failures are loud: an under-floor pool is never silent.
    fn replenish_one(&mut self) -> bool {
        let attempt_now = now();
        if let Err(reason) = self.governor.check(attempt_now) {
            warn!(
                live = self.registry.len(),
                floor = self.bounds.floor,
                recent_failures = self.governor.recent_failures(),
                %reason,
                "replenishment suppressed"
            );
            return false;
        }

        match self.host.spawn() {
            Ok(handle) => {
                self.registry.insert(handle.id, handle.pid, now());
                self.governor.record_success();
                log_pool_event!(handle.id, "spawned", pid = handle.pid, reason = "replenish");
                true
            }
            Err(e) => {
                self.governor.record_failure(attempt_now);
                error!(
                    error = %e,
                    live = self.registry.len(),
                    floor = self.bounds.floor,
                    "replenishment spawn failed"
                );
                false
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn registry_mut(&mut self) -> &mut WorkerRegistry {
        &mut self.registry
    }

    #[cfg(test)]
    pub(crate) fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    #[cfg(test)]
    pub(crate) fn governor_mut(&mut self) -> &mut RespawnGovernor {
        &mut self.governor
    }
}
