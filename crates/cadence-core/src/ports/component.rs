//! Component port - DI コンテナとの境界
//!
//! スケジューラはコンテナから次の 2 つだけを使います：
//! - 名前でのコンポーネント取得
//! - 全コンポーネントの列挙（TaskConfig の発見用）
//!
//! 各コンポーネントは持っている capability だけを `Some` で返します。

use std::sync::Arc;

use super::status::StatusReceiver;
use super::task_logic::TaskLogic;
use crate::domain::TaskConfig;

/// A named object living in the hosting container.
///
/// Every capability defaults to "not implemented". Implementors override the
/// ones they provide, usually as `Some(self)`.
pub trait Component: Send + Sync + 'static {
    fn task_config(&self) -> Option<&TaskConfig> {
        None
    }

    fn task_logic(self: Arc<Self>) -> Option<Arc<dyn TaskLogic>> {
        None
    }

    fn status_receiver(self: Arc<Self>) -> Option<Arc<dyn StatusReceiver>> {
        None
    }
}

impl Component for TaskConfig {
    fn task_config(&self) -> Option<&TaskConfig> {
        Some(self)
    }
}

/// Read access to the container.
pub trait ComponentLookup: Send + Sync {
    fn component_by_name(&self, name: &str) -> Option<Arc<dyn Component>>;

    /// Every registered component with its name.
    fn all_components(&self) -> Vec<(String, Arc<dyn Component>)>;
}
