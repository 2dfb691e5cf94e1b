//! App - アプリケーション層
//!
//! domain と ports を組み合わせてスケジューリングを実装します。
//!
//! # 主要コンポーネント
//! - **TaskScheduler**: 起動時検証と全 Manager の fan-out
//! - **InvocationManager**: 1 タスク分のスケジューリングループ
//! - **wait_until_ready**: 停止待ちのポーリング
//! - **ManagerStatus**: 診断用スナップショット

pub mod manager;
pub mod scheduler;
pub mod shutdown;
pub mod status;

// 主要な型を再エクスポート
pub use self::manager::{InvocationManager, ScheduledTask};
pub use self::scheduler::TaskScheduler;
pub use self::shutdown::{ShutdownPolicy, wait_until_ready};
pub use self::status::ManagerStatus;
