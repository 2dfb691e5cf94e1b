use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Context handed to a `StatusReceiver` alongside each update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub task_name: String,
    pub task_id: String,
    pub started_at: DateTime<Utc>,
    pub invocation_count: u64,
    /// 1-indexed attempt of this invocation.
    pub attempt: u32,
}
