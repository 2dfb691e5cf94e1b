use crate::domain::StatusSummary;

/// Receives status messages emitted by running task logic.
///
/// Called from the forwarding task of each invocation, so it must not block
/// for long.
pub trait StatusReceiver: Send + Sync {
    fn receive(&self, summary: &StatusSummary, update: &str);
}
