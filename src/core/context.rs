//! `CoreContext` bundles the store and both indexes behind async locks and is
//! constructed once at startup: an explicit context threaded through every
//! operation instead of a process-global singleton.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::core::config::CoreConfig;
use crate::core::error::CoreResult;
use crate::index::inverted::InvertedIndex;
use crate::index::legacy_items::LegacyItemIndex;
use crate::index::vector::VectorIndex;
use crate::store::Store;

/// Shared, lock-protected handles to the store and both indexes, plus the
/// resolved config. One instance lives for the life of the process; MCP and
/// HTTP handlers each hold an `Arc<CoreContext>`.
pub struct CoreContext {
    pub config: CoreConfig,
    pub store: Store,
    pub inverted_index: RwLock<InvertedIndex>,
    pub vector_index: RwLock<VectorIndex>,
    pub legacy_item_index: RwLock<LegacyItemIndex>,
}

impl CoreContext {
    pub fn new(config: CoreConfig) -> CoreResult<Self> {
        std::fs::create_dir_all(&config.index_dir).map_err(|e| {
            crate::core::error::CoreError::Other(anyhow::anyhow!(
                "failed to create index_dir {}: {e}",
                config.index_dir.display()
            ))
        })?;
        if let Some(parent) = config.storage_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).ok();
            }
        }

        let store = Store::open(&config.storage_path)?;
        let inverted_index = InvertedIndex::open_or_create(&config.index_dir)
            .map_err(|e| crate::core::error::CoreError::Other(e))?;
        let legacy_item_index = LegacyItemIndex::open_or_create(&config.index_dir)
            .map_err(|e| crate::core::error::CoreError::Other(e))?;

        // The vector index is in-memory only and must be repopulated from
        // the store on every process start; the inverted/legacy indices
        // are disk-backed and already durable across restarts.
        let mut vector_index = VectorIndex::new();
        let eager = store.get_all_items_eager()?;
        let mut all_chunks = Vec::new();
        for (item, _cats, _tags) in &eager {
            all_chunks.extend(store.get_chunks_for_item(&item.id)?);
        }
        vector_index.fit_chunks(&all_chunks);

        Ok(Self {
            config,
            store,
            inverted_index: RwLock::new(inverted_index),
            vector_index: RwLock::new(vector_index),
            legacy_item_index: RwLock::new(legacy_item_index),
        })
    }

    /// Convenience constructor for tests: a fresh store/index rooted at `dir`.
    pub fn new_at(dir: &Path) -> CoreResult<Self> {
        let mut config = CoreConfig::default();
        config.storage_path = dir.join("knowledge.db");
        config.index_dir = dir.join("index");
        Self::new(config)
    }

    pub fn as_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}
