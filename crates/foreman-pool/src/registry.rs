//! The worker registry: bookkeeping for live workers.
//!
//! The registry maps worker ids to [`WorkerRecord`]s. Its size at any instant
//! is the live worker count. It is a pure data structure; all mutation goes
//! through the supervisor, which owns the only instance.
//!
//! Iteration order is ascending worker id. Ids are handed out monotonically
//! by the process host, so registry order equals spawn order.

use std::collections::BTreeMap;

use foreman_core::types::{Pid, Timestamp, WorkerId};

/// Bookkeeping record for one live worker.
///
/// A record exists if and only if the worker is tracked as live. The OS
/// process may outlive the record briefly (termination is fire-and-forget);
/// the record never outlives the worker's tracked liveness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerRecord {
    /// Identity assigned by the process host; unique among live workers.
    pub id: WorkerId,
    /// Native OS process id, display and debugging only.
    pub pid: Pid,
    /// Last observed liveness signal, or spawn time if none has arrived yet.
    pub last_active_at: Timestamp,
}

/// Mapping from worker id to [`WorkerRecord`].
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    workers: BTreeMap<WorkerId, WorkerRecord>,
}

impl WorkerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a worker. The spawn time doubles as the first activity.
    pub fn insert(&mut self, id: WorkerId, pid: Pid, spawned_at: Timestamp) {
        self.workers.insert(
            id,
            WorkerRecord {
                id,
                pid,
                last_active_at: spawned_at,
            },
        );
    }

    /// Reset a worker's idle clock. Returns false if the id is not live.
    pub fn touch(&mut self, id: WorkerId, at: Timestamp) -> bool {
        match self.workers.get_mut(&id) {
            Some(record) => {
                record.last_active_at = at;
                true
            }
            None => false,
        }
    }

    /// Remove a worker's record. Returns the record if it was live.
    pub fn remove(&mut self, id: WorkerId) -> Option<WorkerRecord> {
        self.workers.remove(&id)
    }

    /// Look up a worker's record.
    pub fn get(&self, id: WorkerId) -> Option<&WorkerRecord> {
        self.workers.get(&id)
    }

    /// Mutable access to a worker's record.
    pub fn get_mut(&mut self, id: WorkerId) -> Option<&mut WorkerRecord> {
        self.workers.get_mut(&id)
    }

    /// Whether the id is currently tracked as live.
    pub fn contains(&self, id: WorkerId) -> bool {
        self.workers.contains_key(&id)
    }

    /// Live worker count.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// True when no workers are live.
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Iterate over records in ascending id order (spawn order).
    pub fn iter(&self) -> impl Iterator<Item = &WorkerRecord> {
        self.workers.values()
    }

    /// Snapshot the live ids in ascending order.
    pub fn ids(&self) -> Vec<WorkerId> {
        self.workers.keys().copied().collect()
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.workers.clear();
    }
}
