//! The `DataFrame` handle: identity, storage location and exposed field ids.
//!
//! A `DataFrame` never carries row data. The bytes live in a `DataFrameStorage` backend
//! under `storage.key()`, and query engines load them on demand. Values are immutable;
//! every transformation produces a new handle with a new id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{FrameError, FrameResult};
use crate::storage::DataFrameStorage;

/// Where the frame's bytes physically live.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StorageLocation {
    /// Device-local store.
    #[serde(rename = "indexeddb")]
    Local { key: String },
    #[serde(rename = "s3")]
    S3 { bucket: String, key: String },
    #[serde(rename = "r2")]
    R2 {
        #[serde(rename = "accountId")]
        account_id: String,
        key: String,
    },
}

impl StorageLocation {
    pub fn local(key: impl Into<String>) -> Self {
        StorageLocation::Local { key: key.into() }
    }

    pub fn key(&self) -> &str {
        match self {
            StorageLocation::Local { key } | StorageLocation::S3 { key, .. } | StorageLocation::R2 { key, .. } => key,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, StorageLocation::Local { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryKey {
    Single(String),
    Composite(Vec<String>),
}

impl PrimaryKey {
    pub fn columns(&self) -> Vec<&str> {
        match self {
            PrimaryKey::Single(c) => vec![c.as_str()],
            PrimaryKey::Composite(cs) => cs.iter().map(|c| c.as_str()).collect(),
        }
    }
}

/// Durable representation of a `DataFrame`. The only form that is persisted or indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFrameSerialization {
    pub id: Uuid,
    pub storage: StorageLocation,
    pub field_ids: Vec<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<PrimaryKey>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFrame {
    id: Uuid,
    storage: StorageLocation,
    field_ids: Vec<Uuid>,
    primary_key: Option<PrimaryKey>,
    created_at: DateTime<Utc>,
}

impl DataFrame {
    pub fn new(storage: StorageLocation, field_ids: Vec<Uuid>, primary_key: Option<PrimaryKey>) -> Self {
        Self { id: Uuid::new_v4(), storage, field_ids, primary_key, created_at: Utc::now() }
    }

    /// Persist `bytes` as a new frame in the device-local store. The storage key is the
    /// new frame's id.
    pub async fn create(
        storage: &dyn DataFrameStorage,
        bytes: &[u8],
        field_ids: Vec<Uuid>,
        primary_key: Option<PrimaryKey>,
    ) -> FrameResult<Self> {
        let id = Uuid::new_v4();
        storage.save(&id.to_string(), bytes).await?;
        debug!(target: "framequery::storage", "dataframe.create: id={} backend={} bytes={} fields={}",
            id, storage.backend_name(), bytes.len(), field_ids.len());
        Ok(Self {
            id,
            storage: StorageLocation::local(id.to_string()),
            field_ids,
            primary_key,
            created_at: Utc::now(),
        })
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn storage(&self) -> &StorageLocation { &self.storage }
    pub fn field_ids(&self) -> &[Uuid] { &self.field_ids }
    pub fn primary_key(&self) -> Option<&PrimaryKey> { self.primary_key.as_ref() }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }

    /// A new frame with the same bytes but a different exposed field list.
    pub fn with_field_ids(&self, field_ids: Vec<Uuid>) -> Self {
        Self { id: Uuid::new_v4(), field_ids, created_at: Utc::now(), ..self.clone() }
    }

    /// Raw columnar bytes. A frame whose storage entry is gone is a storage error.
    pub async fn load_bytes(&self, storage: &dyn DataFrameStorage) -> FrameResult<Vec<u8>> {
        storage.load(self.storage.key()).await?.ok_or_else(|| {
            FrameError::storage("frame_missing", format!("no stored bytes for frame {} (key '{}')", self.id, self.storage.key()))
        })
    }

    /// Destroy the frame's storage entry. The handle itself stays valid as a value.
    pub async fn delete(&self, storage: &dyn DataFrameStorage) -> FrameResult<()> {
        storage.delete(self.storage.key()).await
    }

    pub fn to_json(&self) -> DataFrameSerialization {
        DataFrameSerialization {
            id: self.id,
            storage: self.storage.clone(),
            field_ids: self.field_ids.clone(),
            primary_key: self.primary_key.clone(),
            created_at: self.created_at,
        }
    }

    pub fn from_json(s: DataFrameSerialization) -> Self {
        Self { id: s.id, storage: s.storage, field_ids: s.field_ids, primary_key: s.primary_key, created_at: s.created_at }
    }

    pub fn to_json_string(&self) -> FrameResult<String> {
        Ok(serde_json::to_string(&self.to_json())?)
    }

    pub fn from_json_str(text: &str) -> FrameResult<Self> {
        let s: DataFrameSerialization = serde_json::from_str(text)?;
        Ok(Self::from_json(s))
    }
}

impl From<DataFrameSerialization> for DataFrame {
    fn from(s: DataFrameSerialization) -> Self { Self::from_json(s) }
}

impl From<&DataFrame> for DataFrameSerialization {
    fn from(d: &DataFrame) -> Self { d.to_json() }
}

#[cfg(test)]
#[path = "dataframe_tests.rs"]
mod dataframe_tests;
