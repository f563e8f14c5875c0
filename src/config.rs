//! Runtime configuration: defaults, then an optional JSON file, then `FRAMEQUERY_*`
//! environment overrides.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FrameError, FrameResult};
use crate::query::DEFAULT_EXPORT_FILE;
use crate::storage::{DataFrameStorage, FsStorage, MemoryStorage};

pub const ENV_STORAGE: &str = "FRAMEQUERY_STORAGE";
pub const ENV_STORAGE_ROOT: &str = "FRAMEQUERY_STORAGE_ROOT";
pub const ENV_EXPORT_FILE: &str = "FRAMEQUERY_EXPORT_FILE";
pub const ENV_BATCH: &str = "FRAMEQUERY_BATCH";
pub const ENV_LOG: &str = "FRAMEQUERY_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Fs,
}

impl std::str::FromStr for StorageBackend {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(StorageBackend::Memory),
            "fs" | "file" | "disk" => Ok(StorageBackend::Fs),
            other => Err(FrameError::config("invalid_storage", format!("unknown storage backend '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FrameQueryConfig {
    pub storage: StorageBackend,
    /// Directory for the `fs` backend.
    pub storage_root: PathBuf,
    /// Engine-side file `QueryBuilder::run` exports through.
    pub export_file: String,
    /// Union independent queries into one round trip.
    pub batch_queries: bool,
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for FrameQueryConfig {
    fn default() -> Self {
        Self {
            storage: StorageBackend::Memory,
            storage_root: PathBuf::from("frames"),
            export_file: DEFAULT_EXPORT_FILE.to_string(),
            batch_queries: true,
            log_filter: "info".to_string(),
        }
    }
}

fn parse_bool(key: &str, v: &str) -> FrameResult<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(FrameError::config("invalid_bool", format!("{} must be a boolean, got '{}'", key, v))),
    }
}

impl FrameQueryConfig {
    /// Defaults overlaid with the process environment.
    pub fn load() -> FrameResult<Self> {
        let mut cfg = Self::default();
        cfg.apply_env()?;
        Ok(cfg)
    }

    /// File values overlaid with the process environment. Keys missing from the file keep
    /// their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> FrameResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| FrameError::config("config_read", format!("{}: {}", path.display(), e)))?;
        let mut cfg: Self = serde_json::from_str(&text)
            .map_err(|e| FrameError::config("config_parse", format!("{}: {}", path.display(), e)))?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply_env(&mut self) -> FrameResult<()> {
        self.apply_env_from(|k| std::env::var(k).ok())
    }

    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> FrameResult<()> {
        if let Some(v) = lookup(ENV_STORAGE) { self.storage = v.parse()?; }
        if let Some(v) = lookup(ENV_STORAGE_ROOT) { self.storage_root = PathBuf::from(v); }
        if let Some(v) = lookup(ENV_EXPORT_FILE) { self.export_file = v; }
        if let Some(v) = lookup(ENV_BATCH) { self.batch_queries = parse_bool(ENV_BATCH, &v)?; }
        if let Some(v) = lookup(ENV_LOG) { self.log_filter = v; }
        self.validate()
    }

    pub fn validate(&self) -> FrameResult<()> {
        if self.export_file.trim().is_empty() || self.export_file.contains('\'') {
            return Err(FrameError::config("invalid_export_file", format!("unusable export file name '{}'", self.export_file)));
        }
        if self.storage == StorageBackend::Fs && self.storage_root.as_os_str().is_empty() {
            return Err(FrameError::config("invalid_storage_root", "fs storage needs a storage root"));
        }
        Ok(())
    }

    pub fn open_storage(&self) -> FrameResult<Arc<dyn DataFrameStorage>> {
        debug!(target: "framequery::storage", backend = ?self.storage, root = %self.storage_root.display(), "opening storage");
        Ok(match self.storage {
            StorageBackend::Memory => Arc::new(MemoryStorage::new()),
            StorageBackend::Fs => Arc::new(FsStorage::open(&self.storage_root)?),
        })
    }
}
