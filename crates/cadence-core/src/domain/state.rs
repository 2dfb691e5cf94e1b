//! State - InvocationManager のライフサイクル
//!
//! # 状態遷移
//! - Stopped → Starting → Running → Stopping → Stopped

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagerState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl ManagerState {
    /// New work may still be dispatched.
    pub fn is_dispatching(self) -> bool {
        matches!(self, ManagerState::Starting | ManagerState::Running)
    }

    /// The scheduling loop should exit.
    pub fn is_winding_down(self) -> bool {
        matches!(self, ManagerState::Stopping | ManagerState::Stopped)
    }
}

impl fmt::Display for ManagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ManagerState::Stopped => "stopped",
            ManagerState::Starting => "starting",
            ManagerState::Running => "running",
            ManagerState::Stopping => "stopping",
        };
        write!(f, "{s}")
    }
}
