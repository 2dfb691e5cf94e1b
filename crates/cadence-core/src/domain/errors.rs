//! Errors - タスクロジックが返すエラーと分類
//!
//! リトライするかどうかはエラーの種類で決まります。
//! `AllowRetryError` だけが Retryable、それ以外はすべて Terminal。

use std::fmt;

/// Classification of a task execution failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Logic explicitly asked to be retried.
    Retryable,
    /// Give up on this invocation regardless of remaining attempts.
    Terminal,
}

/// Raised by task logic to request a retry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct AllowRetryError(String);

impl AllowRetryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

/// Error returned from `TaskLogic::execute_task`.
#[derive(Debug)]
pub struct TaskError {
    kind: ErrorKind,
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TaskError {
    pub fn terminal(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Terminal,
            message: message.into(),
            source: None,
        }
    }

    pub fn allow_retry(message: impl Into<String>) -> Self {
        AllowRetryError::new(message).into()
    }

    /// Wrap an arbitrary error. Always terminal; retries go through [`AllowRetryError`].
    pub fn with_source<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            kind: ErrorKind::Terminal,
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn is_retryable(&self) -> bool {
        self.kind == ErrorKind::Retryable
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<AllowRetryError> for TaskError {
    fn from(err: AllowRetryError) -> Self {
        Self {
            kind: ErrorKind::Retryable,
            message: err.0,
            source: None,
        }
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ErrorKind::Retryable => write!(f, "retryable: {}", self.message),
            ErrorKind::Terminal => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for TaskError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}
