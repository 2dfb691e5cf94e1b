//! Domain model (task config, intervals, invocations, errors, decisions).
//!
//! 実行基盤（tokio, キュー, レジストリ）には依存しない純粋な型だけを置きます。

pub mod decision;
pub mod errors;
pub mod interval;
pub mod invocation;
pub mod state;
pub mod status;
pub mod task;

pub use decision::{Decision, RetryDecider};
pub use errors::{AllowRetryError, ErrorKind, TaskError};
pub use interval::{Interval, IntervalMode, TimeUnit};
pub use invocation::{Invocation, InvocationReason};
pub use state::ManagerState;
pub use status::StatusSummary;
pub use task::{DEFAULT_MAX_OVERLAPPING, TaskConfig};
