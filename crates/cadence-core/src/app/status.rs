//! Status - 診断用のスナップショット

use serde::{Deserialize, Serialize};

use crate::domain::{Invocation, ManagerState};

/// Point-in-time view of one task manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerStatus {
    pub task_id: String,
    pub full_name: String,
    pub state: ManagerState,
    pub disabled: bool,
    /// Head first.
    pub scheduled: Vec<Invocation>,
    pub running: Vec<Invocation>,
}

impl ManagerStatus {
    pub fn next_run(&self) -> Option<&Invocation> {
        self.scheduled.first()
    }
}
