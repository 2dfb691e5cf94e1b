//! ComponentRegistry - インメモリのコンポーネントコンテナ
//!
//! # 学習ポイント
//! - 型消去された `Arc<dyn Component>` を名前で管理
//! - 初期化時に可変、実行時は不変（ロック不要）

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::ports::{Component, ComponentLookup};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("component '{0}' is already registered")]
    AlreadyRegistered(String),
}

/// Name → component map implementing [`ComponentLookup`].
///
/// Iteration order is by name, so scheduler startup is deterministic.
#[derive(Default)]
pub struct ComponentRegistry {
    components: BTreeMap<String, Arc<dyn Component>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<C: Component>(
        &mut self,
        name: impl Into<String>,
        component: Arc<C>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.components.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }
        self.components.insert(name, component);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<C: Component>(
        mut self,
        name: impl Into<String>,
        component: Arc<C>,
    ) -> Result<Self, RegistryError> {
        self.register(name, component)?;
        Ok(self)
    }

    pub fn names(&self) -> Vec<String> {
        self.components.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl ComponentLookup for ComponentRegistry {
    fn component_by_name(&self, name: &str) -> Option<Arc<dyn Component>> {
        self.components.get(name).cloned()
    }

    fn all_components(&self) -> Vec<(String, Arc<dyn Component>)> {
        self.components
            .iter()
            .map(|(name, c)| (name.clone(), Arc::clone(c)))
            .collect()
    }
}
