//! Ports - 抽象化レイヤー
//!
//! スケジューラが外部（ホストアプリケーション、DI コンテナ、時計）に求める
//! インターフェースを定義します。実装は `impls` またはホスト側に置きます。

pub mod clock;
pub mod component;
pub mod status;
pub mod task_logic;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock, TokioClock};
pub use self::component::{Component, ComponentLookup};
pub use self::status::StatusReceiver;
pub use self::task_logic::{StatusUpdates, TaskLogic};
