//! Frame loading into the query engine.
//!
//! Two guarantees:
//! - one load per frame: concurrent callers for the same frame await the same in-flight
//!   registration and later callers get the memoised result
//! - stale suppression: every `begin_load` bumps a generation, and a load that finishes after
//!   a newer one began is reported as superseded instead of replacing the current frame

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::dataframe::DataFrame;
use crate::engine::QueryEngine;
use crate::error::FrameResult;
use crate::storage::CacheIndex;

/// Engine table name a frame is registered under.
pub fn frame_table_name(frame_id: Uuid) -> String {
    format!("df_{}", frame_id.simple())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedFrame {
    pub frame_id: Uuid,
    pub table_name: String,
    pub frame: DataFrame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LoadTicket(u64);

impl LoadTicket {
    pub fn generation(&self) -> u64 { self.0 }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Current(Arc<LoadedFrame>),
    Superseded,
}

type SharedLoad = Shared<BoxFuture<'static, FrameResult<Arc<LoadedFrame>>>>;

struct LoaderInner {
    engine: Arc<dyn QueryEngine>,
    cache: CacheIndex,
    loaded: Mutex<HashMap<Uuid, Arc<LoadedFrame>>>,
    in_flight: Mutex<HashMap<Uuid, SharedLoad>>,
    generation: AtomicU64,
    current: Mutex<Option<Arc<LoadedFrame>>>,
}

impl LoaderInner {
    async fn load(self: Arc<Self>, frame: DataFrame) -> FrameResult<Arc<LoadedFrame>> {
        let id = frame.id();
        let table_name = frame_table_name(id);
        debug!(target: "framequery::loader", frame = %id, table = %table_name, "registering frame");
        let result = self.engine.register_table(&table_name, &frame).await.map(|()| {
            Arc::new(LoadedFrame { frame_id: id, table_name, frame })
        });
        if let Ok(loaded) = &result {
            self.loaded.lock().insert(id, loaded.clone());
            self.cache.mark_cached(id);
        }
        self.in_flight.lock().remove(&id);
        result
    }
}

/// Owns the in-flight map and memo for one engine. Cheap to clone.
#[derive(Clone)]
pub struct FrameLoader {
    inner: Arc<LoaderInner>,
}

impl FrameLoader {
    pub fn new(engine: Arc<dyn QueryEngine>, cache: CacheIndex) -> Self {
        Self {
            inner: Arc::new(LoaderInner {
                engine,
                cache,
                loaded: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
                current: Mutex::new(None),
            }),
        }
    }

    pub fn is_loaded(&self, frame_id: &Uuid) -> bool {
        self.inner.loaded.lock().contains_key(frame_id)
    }

    /// Register `frame` unless it already is, sharing any load already in progress.
    /// Failures are returned to every waiter and not remembered.
    pub async fn ensure_loaded(&self, frame: &DataFrame) -> FrameResult<Arc<LoadedFrame>> {
        let id = frame.id();
        let pending = {
            let mut in_flight = self.inner.in_flight.lock();
            if let Some(done) = self.inner.loaded.lock().get(&id) {
                return Ok(done.clone());
            }
            in_flight
                .entry(id)
                .or_insert_with(|| self.inner.clone().load(frame.clone()).boxed().shared())
                .clone()
        };
        pending.await
    }

    /// Start a new load generation; earlier tickets become stale.
    pub fn begin_load(&self) -> LoadTicket {
        LoadTicket(self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: LoadTicket) -> bool {
        self.inner.generation.load(Ordering::SeqCst) == ticket.0
    }

    /// Load `frame` on behalf of `ticket`. If a newer ticket was issued meanwhile, the result
    /// is dropped, errors included.
    pub async fn load_current(&self, ticket: LoadTicket, frame: &DataFrame) -> FrameResult<LoadOutcome> {
        let result = self.ensure_loaded(frame).await;
        if !self.is_current(ticket) {
            debug!(target: "framequery::loader", frame = %frame.id(), generation = ticket.0, ok = result.is_ok(), "discarding superseded load");
            return Ok(LoadOutcome::Superseded);
        }
        let loaded = result?;
        *self.inner.current.lock() = Some(loaded.clone());
        Ok(LoadOutcome::Current(loaded))
    }

    pub fn current(&self) -> Option<Arc<LoadedFrame>> {
        self.inner.current.lock().clone()
    }

    /// Drop a frame from the engine, the memo and the cache index.
    pub async fn unload(&self, frame_id: Uuid) -> FrameResult<()> {
        let table_name = frame_table_name(frame_id);
        self.inner.loaded.lock().remove(&frame_id);
        self.inner.cache.forget(&frame_id);
        {
            let mut current = self.inner.current.lock();
            if current.as_ref().is_some_and(|c| c.frame_id == frame_id) {
                *current = None;
            }
        }
        self.inner.engine.unregister_table(&table_name).await?;
        info!(target: "framequery::loader", frame = %frame_id, table = %table_name, "frame unloaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::dataframe::StorageLocation;
    use crate::error::FrameError;
    use crate::storage::{CacheLookup, DataFrameStorage, MemoryStorage};
    use crate::test_support::RecordingEngine;

    async fn stored_frame(storage: &MemoryStorage) -> DataFrame {
        DataFrame::create(storage, b"arrow", vec![Uuid::new_v4()], None).await.unwrap()
    }

    fn setup(delay_ms: u64) -> (Arc<MemoryStorage>, Arc<RecordingEngine>, CacheIndex, FrameLoader) {
        let storage = Arc::new(MemoryStorage::new());
        let engine = Arc::new(
            RecordingEngine::empty()
                .with_storage(storage.clone())
                .with_register_delay(Duration::from_millis(delay_ms)),
        );
        let cache = CacheIndex::new();
        let loader = FrameLoader::new(engine.clone(), cache.clone());
        (storage, engine, cache, loader)
    }

    #[test]
    fn table_name_is_simple_uuid() {
        let id = Uuid::nil();
        assert_eq!(frame_table_name(id), "df_00000000000000000000000000000000");
    }

    #[tokio::test]
    async fn concurrent_loads_register_once() {
        let (storage, engine, cache, loader) = setup(30);
        let frame = stored_frame(&storage).await;
        let results = futures::future::join_all((0..8).map(|_| loader.ensure_loaded(&frame))).await;
        let loaded: Vec<Arc<LoadedFrame>> = results.into_iter().map(|r| r.unwrap()).collect();
        let a = loaded[0].clone();
        assert!(loaded.iter().all(|l| Arc::ptr_eq(l, &a)));
        assert_eq!(engine.registration_count(), 1);
        assert!(cache.is_cached(&frame.id()));

        let again = loader.ensure_loaded(&frame).await.unwrap();
        assert!(Arc::ptr_eq(&again, &a));
        assert_eq!(engine.registration_count(), 1);
    }

    #[tokio::test]
    async fn failures_are_not_memoised() {
        let (storage, engine, cache, loader) = setup(0);
        let frame = DataFrame::new(StorageLocation::local("later"), vec![Uuid::new_v4()], None);
        let err = loader.ensure_loaded(&frame).await.unwrap_err();
        assert!(matches!(err, FrameError::Storage { .. }));
        assert!(!loader.is_loaded(&frame.id()));
        assert!(!cache.is_cached(&frame.id()));

        storage.save("later", b"bytes").await.unwrap();
        loader.ensure_loaded(&frame).await.unwrap();
        assert_eq!(engine.registration_count(), 2);
    }

    #[tokio::test]
    async fn superseded_load_does_not_become_current() {
        let (storage, _engine, _cache, loader) = setup(20);
        let first = stored_frame(&storage).await;
        let second = stored_frame(&storage).await;

        let old = loader.begin_load();
        let slow = loader.load_current(old, &first);
        let newer = loader.begin_load();
        assert_eq!(slow.await.unwrap(), LoadOutcome::Superseded);
        assert!(loader.current().is_none());

        match loader.load_current(newer, &second).await.unwrap() {
            LoadOutcome::Current(l) => assert_eq!(l.frame_id, second.id()),
            other => panic!("expected current, got {:?}", other),
        }
        assert_eq!(loader.current().map(|c| c.frame_id), Some(second.id()));
    }

    #[tokio::test]
    async fn superseded_failure_is_discarded() {
        let (_storage, _engine, _cache, loader) = setup(0);
        let missing = DataFrame::new(StorageLocation::local("nope"), vec![Uuid::new_v4()], None);
        let old = loader.begin_load();
        let _newer = loader.begin_load();
        assert_eq!(loader.load_current(old, &missing).await.unwrap(), LoadOutcome::Superseded);
    }

    #[tokio::test]
    async fn unload_forgets_everything() {
        let (storage, engine, cache, loader) = setup(0);
        let frame = stored_frame(&storage).await;
        let ticket = loader.begin_load();
        loader.load_current(ticket, &frame).await.unwrap();
        let table = frame_table_name(frame.id());
        assert!(engine.has_table(&table).await.unwrap());

        loader.unload(frame.id()).await.unwrap();
        assert!(!engine.has_table(&table).await.unwrap());
        assert!(!cache.is_cached(&frame.id()));
        assert!(loader.current().is_none());
        assert!(!loader.is_loaded(&frame.id()));
    }
}
