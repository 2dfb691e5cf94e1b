//! TaskLogic port - タスクの実行本体
//!
//! コンテナに登録されたコンポーネントのうち、このトレイトを実装するものが
//! `TaskConfig::component` の参照先になれます。

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::TaskError;

/// The executable capability of a task.
///
/// Return `TaskError::allow_retry(..)` (or an `AllowRetryError`) to ask for a
/// retry; any other error abandons the invocation.
#[async_trait]
pub trait TaskLogic: Send + Sync {
    /// `status` is `Some` only when the task has a status receiver configured.
    async fn execute_task(&self, status: Option<StatusUpdates>) -> Result<(), TaskError>;
}

/// Sending half of an invocation's status channel.
///
/// Updates are forwarded to the task's `StatusReceiver` in order. Sending
/// after the invocation has finished is silently dropped.
#[derive(Debug, Clone)]
pub struct StatusUpdates {
    tx: mpsc::UnboundedSender<String>,
}

impl StatusUpdates {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, update: impl Into<String>) {
        // receiver side may already be gone
        let _ = self.tx.send(update.into());
    }
}
