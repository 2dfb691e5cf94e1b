//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **ComponentRegistry**: インメモリの `ComponentLookup`
//!
//! 本番ではホストアプリケーションの DI コンテナが `ComponentLookup` を実装します。

pub mod registry;

// 主要な型を再エクスポート
pub use self::registry::{ComponentRegistry, RegistryError};
