//! The process host: the seam between the supervisor and the OS.
//!
//! The supervisor is generic over [`ProcessHost`] so tests can script spawns
//! and failures without real processes. The production implementation,
//! [`CommandHost`], runs the configured workload command as each worker via
//! `tokio::process` and turns worker stdout and worker exits into pool
//! events.
//!
//! Both host operations are fire-and-forget: `spawn` returns as soon as the
//! OS accepts the process, and `terminate` only requests a kill. Actual
//! start and death arrive later as asynchronous pool events.

use std::collections::HashMap;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use foreman_core::types::{Pid, WorkerId};
use foreman_core::{ForemanError, Result};

use crate::signal::{parse_signal_line, WorkerSignal};
use crate::supervisor::PoolEvent;

/// Environment variable naming the worker's id inside its process.
pub const WORKER_ID_ENV: &str = "FOREMAN_WORKER_ID";

/// Identity of a freshly spawned worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerHandle {
    /// Identity assigned by the host, unique for this supervisor run.
    pub id: WorkerId,
    /// Native OS process id.
    pub pid: Pid,
}

/// Asynchronous notification that a worker terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerExit {
    /// The worker that exited.
    pub id: WorkerId,
    /// Process exit code, if it exited normally.
    pub exit_code: Option<i32>,
    /// Terminating signal number, if it was killed.
    pub signal: Option<i32>,
}

/// The process-spawning primitive the supervisor drives.
pub trait ProcessHost {
    /// Request a new worker process. Fire-and-forget: success means the
    /// request was accepted, not that the process is serving yet.
    fn spawn(&mut self) -> Result<WorkerHandle>;

    /// Request termination of a worker, best-effort. The exit notification
    /// arrives later as a pool event.
    fn terminate(&mut self, id: WorkerId);
}

/// The workload command run inside each worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadSpec {
    /// Program to execute.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
}

impl WorkloadSpec {
    /// Build a workload spec from a command line, e.g. the words after `--`.
    pub fn from_command(command: &[String]) -> Result<Self> {
        let (program, args) = command.split_first().ok_or(ForemanError::WorkloadMissing)?;
        if program.is_empty() {
            return Err(ForemanError::WorkloadMissing);
        }
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

/// [`ProcessHost`] over real OS processes.
///
/// Each spawned child gets [`WORKER_ID_ENV`] in its environment and a piped
/// stdout. A per-worker task reads stdout lines, forwarding liveness signals
/// as heartbeat events and everything else as debug output, then awaits the
/// process exit and emits the exit notification. Stderr is inherited so
/// application diagnostics stay visible.
pub struct CommandHost {
    workload: WorkloadSpec,
    events: mpsc::UnboundedSender<PoolEvent>,
    next_id: WorkerId,
    kill_switches: HashMap<WorkerId, oneshot::Sender<()>>,
}

impl CommandHost {
    /// Create a host running `workload` as each worker, reporting to `events`.
    pub fn new(workload: WorkloadSpec, events: mpsc::UnboundedSender<PoolEvent>) -> Self {
        Self {
            workload,
            events,
            next_id: 1,
            kill_switches: HashMap::new(),
        }
    }

    /// Drive one worker process: pump its stdout, then report its exit.
    async fn watch_worker(
        id: WorkerId,
        mut child: tokio::process::Child,
        mut kill_rx: oneshot::Receiver<()>,
        events: mpsc::UnboundedSender<PoolEvent>,
    ) {
        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                tokio::select! {
                    requested = &mut kill_rx => {
                        if requested.is_ok()
                            && let Err(e) = child.start_kill()
                        {
                            warn!(worker_id = id, error = %e, "kill request failed");
                        }
                        break;
                    }
                    line = lines.next_line() => match line {
                        Ok(Some(line)) => match parse_signal_line(&line) {
                            Some(WorkerSignal::RequestHandled) => {
                                let _ = events.send(PoolEvent::Heartbeat { id });
                            }
                            Some(WorkerSignal::Unknown) => {
                                debug!(worker_id = id, %line, "unknown worker signal dropped");
                            }
                            None => {
                                debug!(worker_id = id, output = %line, "worker output");
                            }
                        },
                        // EOF or read error: the process is going away.
                        Ok(None) => break,
                        Err(e) => {
                            debug!(worker_id = id, error = %e, "worker stdout closed");
                            break;
                        }
                    }
                }
            }
        }

        // No kill request can be honored past this point; dropping the
        // receiver lets the host prune this worker's switch.
        drop(kill_rx);

        let exit = match child.wait().await {
            Ok(status) => WorkerExit {
                id,
                exit_code: status.code(),
                signal: exit_signal(&status),
            },
            Err(e) => {
                warn!(worker_id = id, error = %e, "failed to await worker exit");
                WorkerExit {
                    id,
                    exit_code: None,
                    signal: None,
                }
            }
        };

        let _ = events.send(PoolEvent::WorkerExited(exit));
    }
}

impl ProcessHost for CommandHost {
    fn spawn(&mut self) -> Result<WorkerHandle> {
        // Switches whose worker already exited have a dropped receiver;
        // prune them so the map only ever tracks live workers.
        self.kill_switches.retain(|_, kill_tx| !kill_tx.is_closed());

        let id = self.next_id;

        let mut child = Command::new(&self.workload.program)
            .args(&self.workload.args)
            .env(WORKER_ID_ENV, id.to_string())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| ForemanError::spawn_failed(&self.workload.program, e))?;

        self.next_id += 1;
        let pid = child.id().unwrap_or(0);

        let (kill_tx, kill_rx) = oneshot::channel();
        self.kill_switches.insert(id, kill_tx);

        tokio::spawn(Self::watch_worker(id, child, kill_rx, self.events.clone()));

        debug!(worker_id = id, pid, program = %self.workload.program, "worker process spawned");
        Ok(WorkerHandle { id, pid })
    }

    fn terminate(&mut self, id: WorkerId) {
        match self.kill_switches.remove(&id) {
            Some(kill_tx) => {
                // The watcher may already be gone if the process beat us to
                // exiting; that race is benign.
                let _ = kill_tx.send(());
            }
            None => debug!(worker_id = id, "terminate for unknown worker ignored"),
        }
    }
}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sh(script: &str) -> WorkloadSpec {
        WorkloadSpec {
            program: "/bin/sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
        }
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<PoolEvent>) -> PoolEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for pool event")
            .expect("event channel closed")
    }

    #[test]
    fn test_workload_spec_from_command() {
        let spec =
            WorkloadSpec::from_command(&["my-server".to_string(), "--port".to_string()]).unwrap();
        assert_eq!(spec.program, "my-server");
        assert_eq!(spec.args, vec!["--port"]);
    }

    #[test]
    fn test_empty_command_is_fatal() {
        let err = WorkloadSpec::from_command(&[]).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, ForemanError::WorkloadMissing));
    }

    #[tokio::test]
    async fn test_exit_notification_carries_worker_id() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut host = CommandHost::new(sh("exit 3"), tx);

        let handle = host.spawn().unwrap();
        assert_eq!(handle.id, 1);

        match next_event(&mut rx).await {
            PoolEvent::WorkerExited(exit) => {
                assert_eq!(exit.id, 1);
                assert_eq!(exit.exit_code, Some(3));
            }
            other => panic!("expected exit event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stdout_signal_becomes_heartbeat() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut host = CommandHost::new(
            sh(r#"echo '{"type": "request_handled"}'; sleep 0.2"#),
            tx,
        );

        let handle = host.spawn().unwrap();

        match next_event(&mut rx).await {
            PoolEvent::Heartbeat { id } => assert_eq!(id, handle.id),
            other => panic!("expected heartbeat, got {other:?}"),
        }
        match next_event(&mut rx).await {
            PoolEvent::WorkerExited(exit) => assert_eq!(exit.id, handle.id),
            other => panic!("expected exit event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_terminate_kills_worker() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut host = CommandHost::new(sh("sleep 30"), tx);

        let handle = host.spawn().unwrap();
        host.terminate(handle.id);

        match next_event(&mut rx).await {
            PoolEvent::WorkerExited(exit) => {
                assert_eq!(exit.id, handle.id);
                assert!(exit.signal.is_some());
            }
            other => panic!("expected exit event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_spawn_failure_is_recoverable() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut host = CommandHost::new(
            WorkloadSpec {
                program: "/nonexistent/worker-binary".to_string(),
                args: vec![],
            },
            tx,
        );

        let err = host.spawn().unwrap_err();
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_dead_kill_switch_pruned_after_natural_exit() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut host = CommandHost::new(sh("exit 0"), tx);

        let first = host.spawn().unwrap();
        match next_event(&mut rx).await {
            PoolEvent::WorkerExited(exit) => assert_eq!(exit.id, first.id),
            other => panic!("expected exit event, got {other:?}"),
        }

        // The watcher drops its receiver before reporting the exit, so the
        // switch is already stale once the event is observed.
        assert!(host.kill_switches.get(&first.id).unwrap().is_closed());

        // The next spawn prunes it: the map never outgrows the live set.
        host.spawn().unwrap();
        assert_eq!(host.kill_switches.len(), 1);
        assert!(!host.kill_switches.contains_key(&first.id));
    }

    #[test]
    fn test_monotonic_ids() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let host = CommandHost::new(sh("true"), tx);
        assert_eq!(host.next_id, 1);
    }
}
