//! Local cache index: which frames are materialised on this device.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::DataFrameStorage;
use crate::error::FrameResult;

/// Pure, synchronous lookup. Implementations must not perform I/O.
pub trait CacheLookup: Send + Sync {
    fn is_cached(&self, frame_id: &Uuid) -> bool;
}

#[derive(Clone, Default)]
pub struct CacheIndex {
    ids: Arc<RwLock<HashSet<Uuid>>>,
}

impl CacheIndex {
    pub fn new() -> Self { Self::default() }

    pub fn mark_cached(&self, frame_id: Uuid) {
        self.ids.write().insert(frame_id);
    }

    pub fn forget(&self, frame_id: &Uuid) {
        self.ids.write().remove(frame_id);
    }

    pub fn len(&self) -> usize { self.ids.read().len() }

    pub fn is_empty(&self) -> bool { self.ids.read().is_empty() }

    /// Seed from a storage listing. Keys that are not frame ids are skipped.
    pub async fn refresh_from(&self, storage: &dyn DataFrameStorage) -> FrameResult<usize> {
        let keys = storage.list().await?;
        let parsed: Vec<Uuid> = keys.iter().filter_map(|k| Uuid::parse_str(k).ok()).collect();
        let mut ids = self.ids.write();
        ids.extend(parsed.iter().copied());
        debug!(target: "framequery::storage", "cache.refresh_from: backend={} keys={} frames={} indexed={}",
            storage.backend_name(), keys.len(), parsed.len(), ids.len());
        Ok(parsed.len())
    }
}

impl CacheLookup for CacheIndex {
    fn is_cached(&self, frame_id: &Uuid) -> bool {
        self.ids.read().contains(frame_id)
    }
}
