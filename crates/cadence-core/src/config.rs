//! Config - TOML ファイル + 環境変数
//!
//! ```toml
//! [shutdown]
//! retry_interval_ms = 500
//!
//! [tasks.heartbeat]
//! component = "heartbeat_logic"
//! every = "10 seconds"
//! ```
//!
//! 環境変数は `CADENCE_` 接頭辞、階層は `__` 区切り
//! （例: `CADENCE_TASKS__HEARTBEAT__EVERY="1 minute"`）。

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};

use crate::app::ShutdownPolicy;
use crate::domain::TaskConfig;
use crate::error::{Result, SchedulerError};
use crate::impls::{ComponentRegistry, RegistryError};

pub const ENV_PREFIX: &str = "CADENCE_";
pub const DEFAULT_CONFIG_PATH: &str = "cadence.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CadenceConfig {
    #[serde(default)]
    pub shutdown: ShutdownConfig,

    /// Keyed by the name the task is registered under.
    #[serde(default)]
    pub tasks: BTreeMap<String, TaskConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownConfig {
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_warn_after")]
    pub warn_after: u32,
}

fn default_retry_interval_ms() -> u64 {
    500
}
fn default_max_attempts() -> u32 {
    20
}
fn default_warn_after() -> u32 {
    5
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            retry_interval_ms: default_retry_interval_ms(),
            max_attempts: default_max_attempts(),
            warn_after: default_warn_after(),
        }
    }
}

impl From<&ShutdownConfig> for ShutdownPolicy {
    fn from(config: &ShutdownConfig) -> Self {
        ShutdownPolicy {
            retry_interval: Duration::from_millis(config.retry_interval_ms),
            max_attempts: config.max_attempts,
            warn_after: config.warn_after,
        }
    }
}

impl CadenceConfig {
    /// Load `path` (a missing file is treated as empty) merged with `CADENCE_*` env vars.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_figment(
            Figment::new()
                .merge(Toml::file(path.as_ref()))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        figment
            .extract()
            .map_err(|e| SchedulerError::Config(e.to_string()))
    }

    pub fn shutdown_policy(&self) -> ShutdownPolicy {
        ShutdownPolicy::from(&self.shutdown)
    }

    /// Register every configured task as a component under its key.
    pub fn register_tasks(
        &self,
        registry: &mut ComponentRegistry,
    ) -> std::result::Result<(), RegistryError> {
        for (name, task) in &self.tasks {
            registry.register(name.clone(), Arc::new(task.clone()))?;
        }
        Ok(())
    }
}
