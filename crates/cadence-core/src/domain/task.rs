//! Task configuration entity.

use serde::{Deserialize, Serialize};

/// Concurrent executions allowed when `max_overlapping` is not set.
pub const DEFAULT_MAX_OVERLAPPING: u32 = 1;

/// Describes what to run, how often and with what retry policy.
///
/// Discovered through the component registry. The scheduler validates it once
/// at startup and never mutates it afterwards; resolved handles live in
/// [`crate::app::manager::ScheduledTask`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TaskConfig {
    /// Human label.
    pub name: String,

    /// Unique key. Defaults to the owning component's name when blank.
    pub id: String,

    /// Name of the component implementing `TaskLogic`.
    pub component: String,

    /// Recurrence expression, e.g. `"10 seconds"` or `"1 day at 14:30:00"`.
    pub every: String,

    /// Literal maximum number of concurrent executions (`None` = [`DEFAULT_MAX_OVERLAPPING`]).
    pub max_overlapping: Option<u32>,

    /// Suppress the warning emitted when a due invocation is deferred by the overlap limit.
    pub no_warn_on_overlap: bool,

    pub max_retries: u32,

    /// Required iff `max_retries > 0`; a bare "value unit" duration.
    pub retry_interval: Option<String>,

    pub disabled: bool,

    /// Optional name of a component implementing `StatusReceiver`.
    pub status_update_receiver: Option<String>,
}

impl TaskConfig {
    /// `"Name (ID)"`, or whichever of the two is non-empty.
    pub fn full_name(&self) -> String {
        match (self.name.is_empty(), self.id.is_empty()) {
            (false, false) => format!("{} ({})", self.name, self.id),
            (false, true) => self.name.clone(),
            (true, false) => self.id.clone(),
            (true, true) => String::new(),
        }
    }

    pub fn overlap_limit(&self) -> u32 {
        self.max_overlapping.unwrap_or(DEFAULT_MAX_OVERLAPPING)
    }

    /// One original attempt plus every permitted retry.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}
