//! cadence-core
//!
//! Recurring task scheduler: natural-language intervals, per-task invocation
//! loops with bounded overlap and retries, and a cooperative shutdown protocol.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（TaskConfig, Interval, Invocation, TaskError, Decision）
//! - **recurrence**: `"10 seconds"` / `"1 day at 14:30"` の解析
//! - **queue**: InvocationQueue（先頭挿入・counter 指定削除つき FIFO）
//! - **ports**: 抽象化レイヤー（Clock, Component, TaskLogic, StatusReceiver）
//! - **app**: TaskScheduler と InvocationManager
//! - **impls**: ComponentRegistry（インメモリの ComponentLookup）
//! - **config**: figment による設定読み込み

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod ports;
pub mod queue;
pub mod recurrence;

pub use app::{InvocationManager, ManagerStatus, ShutdownPolicy, TaskScheduler};
pub use config::CadenceConfig;
pub use domain::{AllowRetryError, TaskConfig, TaskError};
pub use error::{ConfigurationError, Result, SchedulerError};
pub use impls::ComponentRegistry;
pub use ports::{Component, ComponentLookup, StatusReceiver, StatusUpdates, TaskLogic};
pub use recurrence::{ParseError, parse_duration, parse_interval};
