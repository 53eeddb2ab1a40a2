//! Liveness signals sent by workers.
//!
//! Workers report activity over their transport (stdout lines for the real
//! host) as one JSON object per line. The only signal kind acted upon is
//! `request_handled`; anything else deserializes to [`WorkerSignal::Unknown`]
//! and is dropped, so new signal kinds can be introduced without breaking
//! older supervisors.

use serde::{Deserialize, Serialize};

/// A message from a worker to the supervisor.
///
/// The transport identifies the sender, so the payload carries no worker id.
/// Extra fields are tolerated and ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerSignal {
    /// The worker finished a unit of work; resets its idle clock.
    RequestHandled,
    /// Any signal kind this supervisor does not understand.
    #[serde(other)]
    Unknown,
}

/// Parse one transport line as a worker signal.
///
/// Returns `None` for lines that are not JSON signal objects at all; those
/// are ordinary worker output, not malformed signals.
pub fn parse_signal_line(line: &str) -> Option<WorkerSignal> {
    let trimmed = line.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request_handled() {
        let signal = parse_signal_line(r#"{"type": "request_handled"}"#);
        assert_eq!(signal, Some(WorkerSignal::RequestHandled));
    }

    #[test]
    fn test_extra_fields_tolerated() {
        let signal =
            parse_signal_line(r#"{"type": "request_handled", "workerId": 3, "latencyMs": 12}"#);
        assert_eq!(signal, Some(WorkerSignal::RequestHandled));
    }

    #[test]
    fn test_unknown_kind_drops_to_unknown() {
        let signal = parse_signal_line(r#"{"type": "memory_report"}"#);
        assert_eq!(signal, Some(WorkerSignal::Unknown));
    }

    #[test]
    fn test_non_json_lines_are_not_signals() {
        assert_eq!(parse_signal_line("listening on :3000"), None);
        assert_eq!(parse_signal_line(""), None);
        assert_eq!(parse_signal_line("   "), None);
    }

    #[test]
    fn test_malformed_json_is_not_a_signal() {
        assert_eq!(parse_signal_line(r#"{"type": "#), None);
        assert_eq!(parse_signal_line(r#"{"kind": "request_handled"}"#), None);
    }
}
