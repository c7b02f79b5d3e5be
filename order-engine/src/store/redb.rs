//! redb-backed document store
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `documents` | `(collection_path, id)` | JSON bytes | every document of every namespace |
//!
//! # Durability
//!
//! redb commits with `Durability::Immediate`: a write is persistent once
//! `commit()` returns and the file is always in a consistent state, which
//! matters on restaurant hardware that loses power without warning.
//!
//! redb operations are synchronous; they are short and run inline on the
//! calling task.

use super::hub::SnapshotHub;
use super::{CollectionPath, DocumentStore, Snapshot, StoreError, StoreResult, merge_fields};
use async_trait::async_trait;
use parking_lot::Mutex;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

/// key = (collection path, document id), value = JSON-serialized document
const DOCUMENTS_TABLE: TableDefinition<(&str, &str), &[u8]> = TableDefinition::new("documents");

#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
    hub: Arc<SnapshotHub>,
    /// Serializes write + publish so subscribers never go back in time
    write_lock: Arc<Mutex<()>>,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").field("db", &"<redb::Database>").finish()
    }
}

impl RedbStore {
    /// Open or create the database at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> StoreResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StoreResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(DOCUMENTS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db: Arc::new(db),
            hub: Arc::new(SnapshotHub::new()),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn scan(&self, path: &CollectionPath) -> StoreResult<Vec<(String, Value)>> {
        let key = path.key();
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DOCUMENTS_TABLE)?;

        let mut docs = Vec::new();
        for entry in table.range((key.as_str(), "")..)? {
            let (k, v) = entry?;
            let (collection, id) = k.value();
            if collection != key {
                break;
            }
            let doc: Value = serde_json::from_slice(v.value())?;
            docs.push((id.to_string(), doc));
        }
        Ok(docs)
    }

    fn read_one(&self, path: &CollectionPath, id: &str) -> StoreResult<Option<Value>> {
        let key = path.key();
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DOCUMENTS_TABLE)?;
        match table.get((key.as_str(), id))? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Must be called with `write_lock` held
    fn publish_locked(&self, path: &CollectionPath) {
        if !self.hub.is_watched(path) {
            return;
        }
        match self.scan(path) {
            Ok(docs) => self.hub.publish(path, Arc::new(docs)),
            Err(e) => {
                // 写入已提交；订阅者会在下一次写入时收到完整快照
                tracing::error!(collection = %path, error = %e, "Failed to publish collection snapshot");
            }
        }
    }
}

#[async_trait]
impl DocumentStore for RedbStore {
    async fn get(&self, path: &CollectionPath, id: &str) -> StoreResult<Option<Value>> {
        self.read_one(path, id)
    }

    async fn set(&self, path: &CollectionPath, id: &str, doc: Value) -> StoreResult<()> {
        let key = path.key();
        let bytes = serde_json::to_vec(&doc)?;

        let _guard = self.write_lock.lock();
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(DOCUMENTS_TABLE)?;
            table.insert((key.as_str(), id), bytes.as_slice())?;
        }
        txn.commit()?;
        self.publish_locked(path);
        Ok(())
    }

    async fn update(
        &self,
        path: &CollectionPath,
        id: &str,
        fields: Map<String, Value>,
    ) -> StoreResult<()> {
        let key = path.key();

        let _guard = self.write_lock.lock();
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(DOCUMENTS_TABLE)?;
            let mut doc: Value = match table.get((key.as_str(), id))? {
                Some(guard) => serde_json::from_slice(guard.value())?,
                None => {
                    return Err(StoreError::NotFound {
                        collection: path.key(),
                        id: id.to_string(),
                    });
                }
            };
            merge_fields(path, id, &mut doc, fields)?;
            let bytes = serde_json::to_vec(&doc)?;
            table.insert((key.as_str(), id), bytes.as_slice())?;
        }
        txn.commit()?;
        self.publish_locked(path);
        Ok(())
    }

    async fn delete(&self, path: &CollectionPath, id: &str) -> StoreResult<bool> {
        let key = path.key();

        let _guard = self.write_lock.lock();
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(DOCUMENTS_TABLE)?;
            table.remove((key.as_str(), id))?.is_some()
        };
        txn.commit()?;
        if removed {
            self.publish_locked(path);
        }
        Ok(removed)
    }

    async fn list(&self, path: &CollectionPath) -> StoreResult<Vec<(String, Value)>> {
        self.scan(path)
    }

    fn subscribe(&self, path: &CollectionPath) -> StoreResult<watch::Receiver<Snapshot>> {
        let _guard = self.write_lock.lock();
        self.hub.subscribe(path, || self.scan(path).map(Arc::new))
    }
}
