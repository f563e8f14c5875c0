//! Recording engine used by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::dataframe::DataFrame;
use crate::engine::{QueryEngine, QueryResult, Row};
use crate::error::{FrameError, FrameResult};
use crate::storage::DataFrameStorage;

pub(crate) type Responder = Box<dyn Fn(&str) -> FrameResult<QueryResult> + Send + Sync>;

pub(crate) const EXPORT_PAYLOAD: &[u8] = b"exported-arrow-bytes";

pub(crate) struct RecordingEngine {
    pub calls: Mutex<Vec<String>>,
    pub registrations: AtomicUsize,
    tables: Mutex<HashMap<String, usize>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
    responder: Responder,
    storage: Option<Arc<dyn DataFrameStorage>>,
    register_delay: Duration,
}

pub(crate) fn row(pairs: &[(&str, serde_json::Value)]) -> Row {
    let mut r = Row::new();
    for (k, v) in pairs {
        r.insert((*k).to_string(), v.clone());
    }
    r
}

impl RecordingEngine {
    pub fn new(responder: impl Fn(&str) -> FrameResult<QueryResult> + Send + Sync + 'static) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            registrations: AtomicUsize::new(0),
            tables: Mutex::new(HashMap::new()),
            files: Mutex::new(HashMap::new()),
            responder: Box::new(responder),
            storage: None,
            register_delay: Duration::ZERO,
        }
    }

    /// Engine answering every query with an empty result.
    pub fn empty() -> Self {
        Self::new(|_| Ok(QueryResult::default()))
    }

    pub fn with_storage(mut self, storage: Arc<dyn DataFrameStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_register_delay(mut self, delay: Duration) -> Self {
        self.register_delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<String> { self.calls.lock().clone() }

    pub fn has_file(&self, path: &str) -> bool { self.files.lock().contains_key(path) }

    pub fn registration_count(&self) -> usize { self.registrations.load(Ordering::SeqCst) }
}

#[async_trait]
impl QueryEngine for RecordingEngine {
    async fn initialize(&self) -> FrameResult<()> { Ok(()) }

    fn is_ready(&self) -> bool { true }

    async fn register_table(&self, name: &str, frame: &DataFrame) -> FrameResult<()> {
        self.registrations.fetch_add(1, Ordering::SeqCst);
        if !self.register_delay.is_zero() {
            tokio::time::sleep(self.register_delay).await;
        }
        let len = match &self.storage {
            Some(s) => frame.load_bytes(s.as_ref()).await?.len(),
            None => 0,
        };
        self.tables.lock().insert(name.to_string(), len);
        Ok(())
    }

    async fn register_arrow_table(&self, name: &str, buffer: &[u8]) -> FrameResult<()> {
        self.tables.lock().insert(name.to_string(), buffer.len());
        Ok(())
    }

    async fn unregister_table(&self, name: &str) -> FrameResult<()> {
        self.tables.lock().remove(name);
        Ok(())
    }

    async fn has_table(&self, name: &str) -> FrameResult<bool> { Ok(self.tables.lock().contains_key(name)) }

    async fn table_names(&self) -> FrameResult<Vec<String>> {
        let mut names: Vec<String> = self.tables.lock().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn query(&self, sql: &str) -> FrameResult<QueryResult> {
        self.calls.lock().push(sql.to_string());
        if sql.starts_with("COPY") {
            let path = sql
                .rsplit_once(" TO '")
                .and_then(|(_, rest)| rest.split_once('\''))
                .map(|(p, _)| p.to_string())
                .ok_or_else(|| FrameError::engine("bad_copy", sql.to_string()))?;
            self.files.lock().insert(path, EXPORT_PAYLOAD.to_vec());
            return Ok(QueryResult::default());
        }
        (self.responder)(sql)
    }

    async fn read_file(&self, path: &str) -> FrameResult<Vec<u8>> {
        self.files.lock().get(path).cloned().ok_or_else(|| FrameError::engine("file_not_found", path.to_string()))
    }

    async fn remove_file(&self, path: &str) -> FrameResult<()> {
        self.files.lock().remove(path);
        Ok(())
    }

    async fn dispose(&self) -> FrameResult<()> { Ok(()) }
}
