//! cadence: run the recurring tasks described in a TOML file.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use cadence_core::config::DEFAULT_CONFIG_PATH;
use cadence_core::domain::StatusSummary;
use cadence_core::{
    AllowRetryError, CadenceConfig, Component, ComponentRegistry, StatusReceiver, StatusUpdates,
    TaskError, TaskLogic, TaskScheduler,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Recurring task scheduler.
#[derive(Parser)]
#[command(name = "cadence", version, about)]
struct Cli {
    /// Path to the TOML task file.
    #[arg(short, long, env = "CADENCE_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run every configured task until SIGINT/SIGTERM.
    Run {
        /// Task ids to trigger once right after startup.
        #[arg(long = "trigger")]
        triggers: Vec<String>,
    },

    /// Validate the task file and print the resolved tasks as JSON.
    Check,
}

// ---- demo components ----

/// Logs a tick and reports it to the status receiver.
struct Heartbeat {
    beats: AtomicU32,
}

#[async_trait]
impl TaskLogic for Heartbeat {
    async fn execute_task(&self, status: Option<StatusUpdates>) -> Result<(), TaskError> {
        let n = self.beats.fetch_add(1, Ordering::Relaxed) + 1;
        info!(beat = n, "heartbeat");
        if let Some(status) = status {
            status.send(format!("beat {n}"));
        }
        Ok(())
    }
}

impl Component for Heartbeat {
    fn task_logic(self: Arc<Self>) -> Option<Arc<dyn TaskLogic>> {
        Some(self)
    }
}

/// Asks for a retry on every call that is not a multiple of `succeed_every`.
struct Flaky {
    calls: AtomicU32,
    succeed_every: u32,
}

#[async_trait]
impl TaskLogic for Flaky {
    async fn execute_task(&self, status: Option<StatusUpdates>) -> Result<(), TaskError> {
        let n = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(status) = &status {
            status.send(format!("call {n} starting"));
        }
        if n % self.succeed_every.max(1) != 0 {
            return Err(AllowRetryError::new(format!("intentional failure on call {n}")).into());
        }
        if let Some(status) = status {
            status.send(format!("call {n} succeeded"));
        }
        Ok(())
    }
}

impl Component for Flaky {
    fn task_logic(self: Arc<Self>) -> Option<Arc<dyn TaskLogic>> {
        Some(self)
    }
}

/// Writes every status update to the log.
struct StatusLog;

impl StatusReceiver for StatusLog {
    fn receive(&self, summary: &StatusSummary, update: &str) {
        info!(
            task_id = %summary.task_id,
            invocation = summary.invocation_count,
            attempt = summary.attempt,
            started_at = %summary.started_at,
            "{update}"
        );
    }
}

impl Component for StatusLog {
    fn status_receiver(self: Arc<Self>) -> Option<Arc<dyn StatusReceiver>> {
        Some(self)
    }
}

fn registry(config: &CadenceConfig) -> anyhow::Result<ComponentRegistry> {
    let mut registry = ComponentRegistry::new()
        .with(
            "heartbeat_logic",
            Arc::new(Heartbeat {
                beats: AtomicU32::new(0),
            }),
        )?
        .with(
            "flaky_logic",
            Arc::new(Flaky {
                calls: AtomicU32::new(0),
                succeed_every: 3,
            }),
        )?
        .with("status_log", Arc::new(StatusLog))?;
    config.register_tasks(&mut registry)?;
    Ok(registry)
}

#[derive(Serialize)]
struct TaskView {
    id: String,
    name: String,
    interval: String,
    max_overlapping: u32,
    max_retries: u32,
    disabled: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("cadence=info,cadence_core=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = CadenceConfig::load(&cli.config)?;
    info!(path = %cli.config.display(), tasks = config.tasks.len(), "config loaded");

    let registry = registry(&config)?;
    let mut scheduler = TaskScheduler::new();
    scheduler.start_component(&registry)?;

    match cli.command.unwrap_or(Command::Run { triggers: Vec::new() }) {
        Command::Check => {
            let views: Vec<TaskView> = scheduler
                .task_ids()
                .iter()
                .filter_map(|id| scheduler.manager(id))
                .map(|m| {
                    let task = m.task();
                    TaskView {
                        id: task.id().to_string(),
                        name: task.full_name(),
                        interval: task.interval.to_string(),
                        max_overlapping: task.config.overlap_limit(),
                        max_retries: task.config.max_retries,
                        disabled: task.config.disabled,
                    }
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&views)?);
            Ok(())
        }
        Command::Run { triggers } => run(scheduler, &config, &triggers).await,
    }
}

async fn run(
    mut scheduler: TaskScheduler,
    config: &CadenceConfig,
    triggers: &[String],
) -> anyhow::Result<()> {
    scheduler.allow_access();
    for id in triggers {
        match scheduler.trigger(id) {
            Ok(invocation) => info!(task_id = %id, counter = invocation.counter, "triggered"),
            Err(err) => warn!(task_id = %id, error = %err, "manual trigger rejected"),
        }
    }

    wait_for_shutdown_signal().await?;
    info!("termination signal received; shutting down");

    if let Err(err) = scheduler.shutdown(&config.shutdown_policy()).await {
        warn!(error = %err, "shut down with work still in flight");
    }
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        res = tokio::signal::ctrl_c() => res?,
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
