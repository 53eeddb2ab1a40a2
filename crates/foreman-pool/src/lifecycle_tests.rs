//! Scenario tests for the supervisor's lifecycle behaviors.
//!
//! These tests drive a [`Supervisor`] over a scripted mock host, covering:
//! - Initial fill to the floor
//! - Growth gating at the ceiling
//! - Crash replenishment only below the floor
//! - Idle reaping that never shrinks below the floor
//! - Idempotent exit handling and terminate-then-exit reconciliation
//! - Spawn-failure recovery through the tick-time floor re-check

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use foreman_core::types::{now, WorkerId};
    use foreman_core::ForemanError;

    use crate::config::PoolConfig;
    use crate::host::{ProcessHost, WorkerExit, WorkerHandle};
    use crate::supervisor::{pool_channel, PoolEvent, Supervisor};

    /// Scripted process host: spawns succeed with monotonic ids unless a
    /// failure has been queued; terminations are only recorded.
    #[derive(Debug, Default)]
    struct MockHost {
        next_id: WorkerId,
        spawned: Vec<WorkerId>,
        terminated: Vec<WorkerId>,
        fail_next: VecDeque<bool>,
    }

    impl MockHost {
        fn new() -> Self {
            Self {
                next_id: 1,
                ..Default::default()
            }
        }

        /// Queue outcomes for upcoming spawns; `true` means fail.
        fn script_failures(&mut self, outcomes: &[bool]) {
            self.fail_next.extend(outcomes.iter().copied());
        }
    }

    impl ProcessHost for MockHost {
        fn spawn(&mut self) -> foreman_core::Result<WorkerHandle> {
            if self.fail_next.pop_front().unwrap_or(false) {
                return Err(ForemanError::spawn_failed(
                    "mock-worker",
                    std::io::Error::new(std::io::ErrorKind::NotFound, "scripted failure"),
                ));
            }
            let id = self.next_id;
            self.next_id += 1;
            self.spawned.push(id);
            Ok(WorkerHandle {
                id,
                pid: 1000 + id as u32,
            })
        }

        fn terminate(&mut self, id: WorkerId) {
            self.terminated.push(id);
        }
    }

    fn crash(id: WorkerId) -> WorkerExit {
        WorkerExit {
            id,
            exit_code: Some(1),
            signal: None,
        }
    }

    fn supervisor(min: usize, max: usize) -> Supervisor<MockHost> {
        let config = PoolConfig::new().with_min(min).with_max(max);
        Supervisor::with_capacity(&config, MockHost::new(), 8)
    }

    /// Backdate a worker's idle clock by `secs` seconds.
    fn backdate(supervisor: &mut Supervisor<MockHost>, id: WorkerId, secs: i64) {
        let record = supervisor
            .registry_mut()
            .get_mut(id)
            .expect("worker not live");
        record.last_active_at = now() - chrono::Duration::seconds(secs);
    }

    // =========================================================================
    // Initial fill
    // =========================================================================

    #[test]
    fn test_start_fills_to_floor() {
        let mut supervisor = supervisor(2, 4);
        supervisor.start().unwrap();

        let status = supervisor.status();
        assert_eq!(status.live, 2);
        assert_eq!(status.floor, 2);
        assert_eq!(status.ceiling, 4);
    }

    #[test]
    fn test_start_with_floor_of_one() {
        let mut supervisor = supervisor(0, 4);
        supervisor.start().unwrap();
        assert_eq!(supervisor.status().live, 1);
    }

    #[test]
    fn test_first_spawn_failure_fails_start() {
        let mut supervisor = supervisor(2, 4);
        supervisor.host_mut().script_failures(&[true]);

        let err = supervisor.start().unwrap_err();
        assert!(matches!(err, ForemanError::WorkloadUnlaunchable { .. }));
        assert!(err.is_fatal());
        assert_eq!(supervisor.status().live, 0);
    }

    #[test]
    fn test_later_fill_failure_is_recovered_by_tick() {
        let mut supervisor = supervisor(3, 4);
        supervisor.host_mut().script_failures(&[false, true]);

        // One worker spawns, the second fails: the fill stops under floor
        // instead of hot-looping.
        supervisor.start().unwrap();
        assert_eq!(supervisor.status().live, 1);

        // Once the governor's backoff elapses a tick restores the floor.
        supervisor.governor_mut().record_success();
        supervisor.on_tick();
        assert_eq!(supervisor.status().live, 3);
    }

    // =========================================================================
    // Growth gating
    // =========================================================================

    #[test]
    fn test_growth_stops_at_ceiling() {
        let mut supervisor = supervisor(2, 4);
        supervisor.start().unwrap();
        assert_eq!(supervisor.status().live, 2);

        supervisor.spawn_if_under_ceiling();
        supervisor.spawn_if_under_ceiling();
        assert_eq!(supervisor.status().live, 4);

        // Third growth request is a no-op at the ceiling.
        supervisor.spawn_if_under_ceiling();
        assert_eq!(supervisor.status().live, 4);
        assert_eq!(supervisor.host_mut().spawned.len(), 4);
    }

    #[test]
    fn test_live_count_never_exceeds_ceiling() {
        let mut supervisor = supervisor(1, 3);
        supervisor.start().unwrap();

        for _ in 0..10 {
            supervisor.spawn_if_under_ceiling();
        }
        assert_eq!(supervisor.status().live, 3);
    }

    // =========================================================================
    // Crash handling
    // =========================================================================

    #[test]
    fn test_crash_above_floor_is_not_replaced() {
        let mut supervisor = supervisor(2, 4);
        supervisor.start().unwrap();
        supervisor.spawn_if_under_ceiling();
        supervisor.spawn_if_under_ceiling();
        assert_eq!(supervisor.status().live, 4);

        // One of four crashes; three live is not below the floor of two,
        // so no replacement fires and the pool settles at three.
        supervisor.on_worker_exited(crash(1));
        assert_eq!(supervisor.status().live, 3);
        assert_eq!(supervisor.host_mut().spawned.len(), 4);
    }

    #[test]
    fn test_crash_below_floor_triggers_one_replacement() {
        let mut supervisor = supervisor(2, 4);
        supervisor.start().unwrap();

        supervisor.on_worker_exited(crash(1));
        assert_eq!(supervisor.status().live, 2);

        let spawned = &supervisor.host_mut().spawned;
        assert_eq!(spawned.len(), 3);
        assert_eq!(*spawned.last().unwrap(), 3);
    }

    #[test]
    fn test_exit_for_unknown_id_is_noop() {
        let mut supervisor = supervisor(2, 4);
        supervisor.start().unwrap();

        supervisor.on_worker_exited(crash(99));
        assert_eq!(supervisor.status().live, 2);
        assert_eq!(supervisor.host_mut().spawned.len(), 2);
    }

    #[test]
    fn test_terminate_then_exit_is_reconciled() {
        let mut supervisor = supervisor(1, 4);
        supervisor.start().unwrap();
        supervisor.spawn_if_under_ceiling();
        assert_eq!(supervisor.status().live, 2);

        // Terminate drops the record immediately, fire-and-forget.
        supervisor.terminate(2);
        assert_eq!(supervisor.status().live, 1);
        assert_eq!(supervisor.host_mut().terminated, vec![2]);

        // The later exit notification for that id changes nothing.
        supervisor.on_worker_exited(crash(2));
        assert_eq!(supervisor.status().live, 1);
        assert_eq!(supervisor.host_mut().spawned.len(), 2);
    }

    #[test]
    fn test_replacement_spawn_failure_retried_on_tick() {
        let mut supervisor = supervisor(2, 4);
        supervisor.start().unwrap();

        // The replacement for this crash fails; the pool sits under floor.
        supervisor.host_mut().script_failures(&[true]);
        supervisor.on_worker_exited(crash(1));
        assert_eq!(supervisor.status().live, 1);

        // Once the governor's backoff elapses, a tick restores the floor.
        // Force the retry by resetting backoff the way a drained window would.
        supervisor.governor_mut().record_success();
        supervisor.on_tick();
        assert_eq!(supervisor.status().live, 2);
    }

    // =========================================================================
    // Idle reaping
    // =========================================================================

    #[test]
    fn test_all_idle_reaps_to_floor_exactly() {
        let mut supervisor = supervisor(2, 4);
        supervisor.start().unwrap();
        supervisor.spawn_if_under_ceiling();
        supervisor.spawn_if_under_ceiling();
        assert_eq!(supervisor.status().live, 4);

        for id in 1..=4 {
            backdate(&mut supervisor, id, 120);
        }

        supervisor.on_tick();
        assert_eq!(supervisor.status().live, 2);
        assert_eq!(supervisor.host_mut().terminated, vec![1, 2]);
    }

    #[test]
    fn test_fresh_workers_are_not_reaped() {
        let mut supervisor = supervisor(2, 4);
        supervisor.start().unwrap();
        supervisor.spawn_if_under_ceiling();

        supervisor.on_tick();
        assert_eq!(supervisor.status().live, 3);
        assert!(supervisor.host_mut().terminated.is_empty());
    }

    #[test]
    fn test_heartbeat_resets_idle_clock() {
        let mut supervisor = supervisor(1, 4);
        supervisor.start().unwrap();
        supervisor.spawn_if_under_ceiling();

        backdate(&mut supervisor, 1, 120);
        backdate(&mut supervisor, 2, 120);
        supervisor.on_signal(2);

        supervisor.on_tick();
        // Worker 1 was reaped; worker 2's heartbeat saved it.
        assert_eq!(supervisor.status().live, 1);
        assert_eq!(supervisor.host_mut().terminated, vec![1]);
    }

    #[test]
    fn test_heartbeat_for_unknown_id_is_ignored() {
        let mut supervisor = supervisor(2, 4);
        supervisor.start().unwrap();

        supervisor.on_signal(42);
        assert_eq!(supervisor.status().live, 2);
        assert!(!supervisor.registry_mut().contains(42));
    }

    #[test]
    fn test_reap_never_drops_below_floor_at_floor() {
        let mut supervisor = supervisor(2, 4);
        supervisor.start().unwrap();

        backdate(&mut supervisor, 1, 120);
        backdate(&mut supervisor, 2, 120);

        supervisor.on_tick();
        assert_eq!(supervisor.status().live, 2);
        assert!(supervisor.host_mut().terminated.is_empty());
    }

    // =========================================================================
    // Shutdown and the reactor
    // =========================================================================

    #[test]
    fn test_shutdown_terminates_everything() {
        let mut supervisor = supervisor(2, 4);
        supervisor.start().unwrap();
        supervisor.spawn_if_under_ceiling();

        supervisor.shutdown();
        assert_eq!(supervisor.status().live, 0);
        assert_eq!(supervisor.host_mut().terminated, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_reactor_processes_events_in_order() {
        let mut supervisor = supervisor(2, 4);
        supervisor.start().unwrap();

        let (tx, handle, rx) = pool_channel();
        tx.send(PoolEvent::Grow).unwrap();
        tx.send(PoolEvent::WorkerExited(crash(1))).unwrap();
        tx.send(PoolEvent::Heartbeat { id: 2 }).unwrap();
        handle.shutdown();

        supervisor.run(rx).await;
        // Grow took the pool to 3, the exit dropped it to 2 (no replenish at
        // floor boundary: 2 is not below floor 2), shutdown cleared the rest.
    }

    #[tokio::test]
    async fn test_reactor_stops_when_senders_drop() {
        let mut supervisor = supervisor(1, 2);
        supervisor.start().unwrap();

        let (tx, handle, rx) = pool_channel();
        drop(tx);
        drop(handle);

        // All senders gone: the reactor shuts down rather than hanging.
        supervisor.run(rx).await;
    }
}
