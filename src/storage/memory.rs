use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use super::{DataFrameStorage, StorageUsage};
use crate::error::FrameResult;

/// In-memory frame store. Cloning shares the underlying map.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    map: Arc<RwLock<HashMap<String, Arc<Vec<u8>>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.map.read().len() }

    pub fn is_empty(&self) -> bool { self.map.read().is_empty() }
}

#[async_trait]
impl DataFrameStorage for MemoryStorage {
    async fn save(&self, id: &str, bytes: &[u8]) -> FrameResult<()> {
        debug!(target: "framequery::storage", "memory.save: key='{}' bytes={}", id, bytes.len());
        self.map.write().insert(id.to_string(), Arc::new(bytes.to_vec()));
        Ok(())
    }

    async fn load(&self, id: &str) -> FrameResult<Option<Vec<u8>>> {
        Ok(self.map.read().get(id).map(|b| b.as_ref().clone()))
    }

    async fn delete(&self, id: &str) -> FrameResult<()> {
        let removed = self.map.write().remove(id).is_some();
        debug!(target: "framequery::storage", "memory.delete: key='{}' removed={}", id, removed);
        Ok(())
    }

    async fn exists(&self, id: &str) -> FrameResult<bool> {
        Ok(self.map.read().contains_key(id))
    }

    async fn list(&self) -> FrameResult<Vec<String>> {
        let mut keys: Vec<String> = self.map.read().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    async fn usage(&self) -> FrameResult<StorageUsage> {
        let map = self.map.read();
        let total: u64 = map.values().map(|b| b.len() as u64).sum();
        Ok(StorageUsage { count: map.len(), total_bytes: Some(total) })
    }

    fn backend_name(&self) -> &'static str { "memory" }
}
