//! TaskScheduler - 全タスクのライフサイクルを束ねる
//!
//! # ライフサイクル
//! 1. `start_component`: TaskConfig を発見・検証し、Manager を構築（Fail-fast）
//! 2. `allow_access`: 各 Manager のループを tokio task として起動
//! 3. `prepare_to_stop` → `ready_to_stop` → `stop`: 全 Manager に fan-out
//!
//! 1 件でも検証に失敗したら全体が起動しません（部分起動はしない）。

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::manager::{InvocationManager, ScheduledTask};
use super::shutdown::{ShutdownPolicy, wait_until_ready};
use super::status::ManagerStatus;
use crate::domain::{Invocation, RetryDecider, TaskConfig};
use crate::error::{ConfigurationError, Result, SchedulerError};
use crate::ports::{Clock, ComponentLookup, SystemClock};
use crate::recurrence::{parse_duration, parse_interval_at};

pub struct TaskScheduler {
    clock: Arc<dyn Clock>,
    managers: Vec<InvocationManager>,
    loops: Vec<JoinHandle<()>>,
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskScheduler {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            managers: Vec::new(),
            loops: Vec::new(),
        }
    }

    /// Discover and validate every task, building one manager each.
    ///
    /// Nothing is kept if any task is invalid.
    pub fn start_component(&mut self, lookup: &dyn ComponentLookup) -> Result<()> {
        if !self.managers.is_empty() {
            return Err(SchedulerError::InvalidState(
                "start_component called twice".to_string(),
            ));
        }

        let now = self.clock.now();
        let mut seen = HashSet::new();
        let mut managers = Vec::new();

        for (name, component) in lookup.all_components() {
            let Some(config) = component.task_config() else {
                continue;
            };
            let task = resolve_task(&name, config.clone(), lookup, now)?;
            if !seen.insert(task.id().to_string()) {
                return Err(ConfigurationError::DuplicateTaskId {
                    id: task.id().to_string(),
                }
                .into());
            }
            debug!(
                task_id = %task.id(),
                interval = %task.interval,
                max_overlapping = task.config.overlap_limit(),
                max_retries = task.config.max_retries,
                "task validated"
            );
            managers.push(InvocationManager::new(task, Arc::clone(&self.clock)));
        }

        info!(tasks = managers.len(), "task scheduler configured");
        self.managers = managers;
        Ok(())
    }

    /// Start every manager and spawn its loop. Must be called inside a tokio runtime.
    ///
    /// Every manager is `Running` when this returns.
    pub fn allow_access(&mut self) {
        for manager in &self.managers {
            if !manager.begin() {
                continue;
            }
            let manager = manager.clone();
            self.loops.push(tokio::spawn(async move { manager.run().await }));
        }
        info!(tasks = self.loops.len(), "task scheduler running");
    }

    pub fn prepare_to_stop(&self) {
        info!("task scheduler preparing to stop");
        for manager in &self.managers {
            manager.prepare_to_stop();
        }
    }

    /// `Ok` only when every manager is ready; otherwise all reasons joined.
    pub fn ready_to_stop(&self) -> Result<()> {
        let reasons: Vec<String> = self
            .managers
            .iter()
            .filter_map(|m| m.ready_to_stop().err())
            .collect();
        if reasons.is_empty() {
            Ok(())
        } else {
            Err(SchedulerError::NotReady(reasons.join("; ")))
        }
    }

    /// Stop every manager and wait for their loops to exit.
    pub async fn stop(&mut self) {
        if let Err(err) = self.ready_to_stop() {
            warn!(error = %err, "stopping before all invocations finished");
        }
        for manager in &self.managers {
            manager.stop();
        }
        for handle in self.loops.drain(..) {
            if let Err(err) = handle.await {
                warn!(error = %err, "scheduling loop ended abnormally");
            }
        }
        info!("task scheduler stopped");
    }

    /// `prepare_to_stop`, wait per `policy`, then `stop` regardless.
    ///
    /// Returns the last not-ready reason when waiting gave up.
    pub async fn shutdown(&mut self, policy: &ShutdownPolicy) -> Result<()> {
        self.prepare_to_stop();
        let waited = wait_until_ready(policy, || self.ready_to_stop()).await;
        self.stop().await;
        waited
    }

    pub fn trigger(&self, task_id: &str) -> Result<Invocation> {
        self.manager(task_id)
            .ok_or_else(|| SchedulerError::UnknownTask(task_id.to_string()))?
            .trigger()
    }

    pub fn manager(&self, task_id: &str) -> Option<&InvocationManager> {
        self.managers.iter().find(|m| m.task_id() == task_id)
    }

    pub fn task_ids(&self) -> Vec<String> {
        self.managers.iter().map(|m| m.task_id().to_string()).collect()
    }

    pub fn status(&self) -> Vec<ManagerStatus> {
        self.managers.iter().map(InvocationManager::status).collect()
    }
}

/// Validate one discovered config and resolve the components it names.
fn resolve_task(
    component_name: &str,
    mut config: TaskConfig,
    lookup: &dyn ComponentLookup,
    now: DateTime<Utc>,
) -> std::result::Result<ScheduledTask, ConfigurationError> {
    if config.id.trim().is_empty() {
        config.id = component_name.to_string();
    }
    let task = config.id.clone();

    if config.component.trim().is_empty() {
        return Err(ConfigurationError::MissingComponent { task });
    }
    let logic = lookup
        .component_by_name(&config.component)
        .ok_or_else(|| ConfigurationError::ComponentNotFound {
            task: task.clone(),
            component: config.component.clone(),
        })?
        .task_logic()
        .ok_or_else(|| ConfigurationError::NotTaskLogic {
            task: task.clone(),
            component: config.component.clone(),
        })?;

    if config.every.trim().is_empty() {
        return Err(ConfigurationError::MissingEvery { task });
    }
    if config.max_overlapping == Some(0) {
        return Err(ConfigurationError::InvalidMaxOverlapping { task });
    }

    let retry_interval = if config.max_retries > 0 {
        let expression = config
            .retry_interval
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ConfigurationError::MissingRetryInterval {
                task: task.clone(),
                max_retries: config.max_retries,
            })?;
        parse_duration(expression).map_err(|source| ConfigurationError::InvalidRetryInterval {
            task: task.clone(),
            source,
        })?
    } else {
        std::time::Duration::ZERO
    };

    let interval = parse_interval_at(&config.every, now).map_err(|source| {
        ConfigurationError::InvalidEvery {
            task: task.clone(),
            source,
        }
    })?;

    let receiver = match config.status_update_receiver.as_deref() {
        Some(name) if !name.trim().is_empty() => Some(
            lookup
                .component_by_name(name)
                .ok_or_else(|| ConfigurationError::ReceiverNotFound {
                    task: task.clone(),
                    component: name.to_string(),
                })?
                .status_receiver()
                .ok_or_else(|| ConfigurationError::NotStatusReceiver {
                    task: task.clone(),
                    component: name.to_string(),
                })?,
        ),
        _ => None,
    };

    Ok(ScheduledTask {
        config,
        interval,
        logic,
        receiver,
        retry: RetryDecider::new(retry_interval),
    })
}
