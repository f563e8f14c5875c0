//!
//! framequery storage module
//! -------------------------
//! Persists and retrieves opaque columnar byte buffers by key. Backends differ only in
//! where the bytes land; every backend guarantees a byte-for-byte round trip of whatever
//! the caller wrote and treats deleting a missing key as success.
//!
//! Backends:
//! - `MemoryStorage`: in-process map, the default for tests and ephemeral sessions.
//! - `FsStorage`: device-local directory store, one file per key.
//!
//! `CacheIndex` sits beside the backends and answers "is this frame materialised locally"
//! without touching any backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::FrameResult;

mod memory;
mod fs;
pub mod cache;

pub use memory::MemoryStorage;
pub use fs::FsStorage;
pub use cache::{CacheIndex, CacheLookup};

/// Object count and, when the backend can tell cheaply, the byte total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StorageUsage {
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<u64>,
}

/// Pluggable byte store keyed by frame storage key.
#[async_trait]
pub trait DataFrameStorage: Send + Sync {
    /// Store `bytes` under `id`, replacing any previous value.
    async fn save(&self, id: &str, bytes: &[u8]) -> FrameResult<()>;

    /// Bytes previously saved under `id`, or `None` when absent.
    async fn load(&self, id: &str) -> FrameResult<Option<Vec<u8>>>;

    /// Remove `id`. Removing a key that does not exist succeeds.
    async fn delete(&self, id: &str) -> FrameResult<()>;

    async fn exists(&self, id: &str) -> FrameResult<bool>;

    async fn list(&self) -> FrameResult<Vec<String>>;

    async fn usage(&self) -> FrameResult<StorageUsage>;

    /// Short backend label used in logs.
    fn backend_name(&self) -> &'static str;
}
