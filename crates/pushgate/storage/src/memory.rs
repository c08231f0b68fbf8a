//! In-memory canonical ID store.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::CanonicalIdStore;

/// Process-local store for tests and ephemeral deployments.
///
/// Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    mappings: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored mappings.
    pub async fn len(&self) -> usize {
        self.mappings.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.mappings.read().await.is_empty()
    }
}

impl CanonicalIdStore for InMemoryStore {
    async fn resolve(&self, reg_id: &str) -> color_eyre::eyre::Result<String> {
        let guard = self.mappings.read().await;
        Ok(guard
            .get(reg_id)
            .cloned()
            .unwrap_or_else(|| reg_id.to_string()))
    }

    async fn resolve_batch(
        &self,
        reg_ids: &[String],
    ) -> color_eyre::eyre::Result<HashMap<String, String>> {
        let guard = self.mappings.read().await;
        Ok(reg_ids
            .iter()
            .map(|id| {
                let canonical = guard.get(id).cloned().unwrap_or_else(|| id.clone());
                (id.clone(), canonical)
            })
            .collect())
    }

    async fn record_canonical(
        &self,
        reg_id: &str,
        canonical_reg_id: &str,
    ) -> color_eyre::eyre::Result<()> {
        self.mappings
            .write()
            .await
            .insert(reg_id.to_string(), canonical_reg_id.to_string());
        Ok(())
    }
}
