use thiserror::Error;

use crate::recurrence::ParseError;

/// Startup validation failure. Fatal to the whole scheduler.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("task '{task}' does not name a component")]
    MissingComponent { task: String },

    #[error("task '{task}' references component '{component}', which does not exist")]
    ComponentNotFound { task: String, component: String },

    #[error("component '{component}' referenced by task '{task}' does not implement TaskLogic")]
    NotTaskLogic { task: String, component: String },

    #[error("task '{task}' has no 'every' expression")]
    MissingEvery { task: String },

    #[error("task '{task}' has an invalid 'every' expression: {source}")]
    InvalidEvery {
        task: String,
        #[source]
        source: ParseError,
    },

    #[error("task '{task}' sets max_overlapping to 0; it must be at least 1")]
    InvalidMaxOverlapping { task: String },

    #[error("task '{task}' allows {max_retries} retries but sets no retry_interval")]
    MissingRetryInterval { task: String, max_retries: u32 },

    #[error("task '{task}' has an invalid retry_interval: {source}")]
    InvalidRetryInterval {
        task: String,
        #[source]
        source: ParseError,
    },

    #[error("task '{task}' references status receiver '{component}', which does not exist")]
    ReceiverNotFound { task: String, component: String },

    #[error("component '{component}' referenced by task '{task}' does not implement StatusReceiver")]
    NotStatusReceiver { task: String, component: String },

    #[error("task id '{id}' is used by more than one task")]
    DuplicateTaskId { id: String },
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Concatenated reasons from every manager that still has work in flight.
    #[error("not ready to stop: {0}")]
    NotReady(String),

    #[error("no task with id '{0}'")]
    UnknownTask(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
