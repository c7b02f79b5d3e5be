//! Failure-injecting store for unit tests

use super::{Collection, CollectionPath, DocumentStore, MemoryStore, Snapshot, StoreError, StoreResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::watch;

/// Wraps [`MemoryStore`]; writes to "broken" collections fail, and every
/// successful write is counted per collection. One-shot stalls hold an
/// operation open so tests can interleave concurrent callers.
#[derive(Default)]
pub struct FailingStore {
    inner: MemoryStore,
    broken: Mutex<HashSet<Collection>>,
    broken_reads: Mutex<HashSet<Collection>>,
    writes: Mutex<HashMap<Collection, usize>>,
    stalled_updates: Mutex<HashMap<Collection, Duration>>,
    stalled_lists: Mutex<HashMap<Collection, Duration>>,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn break_writes(&self, collection: Collection) {
        self.broken.lock().insert(collection);
    }

    pub fn break_reads(&self, collection: Collection) {
        self.broken_reads.lock().insert(collection);
    }

    /// Delay the next update of `collection` before it is applied
    pub fn stall_next_update(&self, collection: Collection, delay: Duration) {
        self.stalled_updates.lock().insert(collection, delay);
    }

    /// Delay the next listing of `collection` after it was read
    pub fn stall_next_list(&self, collection: Collection, delay: Duration) {
        self.stalled_lists.lock().insert(collection, delay);
    }

    pub fn heal(&self) {
        self.broken.lock().clear();
        self.broken_reads.lock().clear();
    }

    pub fn writes(&self, collection: Collection) -> usize {
        self.writes.lock().get(&collection).copied().unwrap_or(0)
    }

    pub fn reset_write_counts(&self) {
        self.writes.lock().clear();
    }

    fn check_write(&self, path: &CollectionPath) -> StoreResult<()> {
        if self.broken.lock().contains(&path.collection) {
            return Err(StoreError::Unavailable(format!("injected write failure on {path}")));
        }
        Ok(())
    }

    fn check_read(&self, path: &CollectionPath) -> StoreResult<()> {
        if self.broken_reads.lock().contains(&path.collection) {
            return Err(StoreError::Unavailable(format!("injected read failure on {path}")));
        }
        Ok(())
    }

    fn count(&self, path: &CollectionPath) {
        *self.writes.lock().entry(path.collection).or_default() += 1;
    }
}

async fn stall(slot: &Mutex<HashMap<Collection, Duration>>, path: &CollectionPath) {
    let delay = slot.lock().remove(&path.collection);
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

#[async_trait]
impl DocumentStore for FailingStore {
    async fn get(&self, path: &CollectionPath, id: &str) -> StoreResult<Option<Value>> {
        self.check_read(path)?;
        self.inner.get(path, id).await
    }

    async fn set(&self, path: &CollectionPath, id: &str, doc: Value) -> StoreResult<()> {
        self.check_write(path)?;
        self.inner.set(path, id, doc).await?;
        self.count(path);
        Ok(())
    }

    async fn update(
        &self,
        path: &CollectionPath,
        id: &str,
        fields: Map<String, Value>,
    ) -> StoreResult<()> {
        self.check_write(path)?;
        stall(&self.stalled_updates, path).await;
        self.inner.update(path, id, fields).await?;
        self.count(path);
        Ok(())
    }

    async fn delete(&self, path: &CollectionPath, id: &str) -> StoreResult<bool> {
        self.check_write(path)?;
        let removed = self.inner.delete(path, id).await?;
        self.count(path);
        Ok(removed)
    }

    async fn list(&self, path: &CollectionPath) -> StoreResult<Vec<(String, Value)>> {
        self.check_read(path)?;
        let docs = self.inner.list(path).await?;
        stall(&self.stalled_lists, path).await;
        Ok(docs)
    }

    fn subscribe(&self, path: &CollectionPath) -> StoreResult<watch::Receiver<Snapshot>> {
        self.inner.subscribe(path)
    }
}
