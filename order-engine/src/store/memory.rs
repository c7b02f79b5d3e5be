//! In-memory document store
//!
//! Used by tests and by embedders that bring their own persistence.

use super::hub::SnapshotHub;
use super::{CollectionPath, DocumentStore, Snapshot, StoreError, StoreResult, merge_fields};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::watch;

type Collections = HashMap<String, BTreeMap<String, Value>>;

#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<Collections>,
    hub: SnapshotHub,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot_of(data: &Collections, path: &CollectionPath) -> Snapshot {
        let docs = data
            .get(&path.key())
            .map(|docs| {
                docs.iter()
                    .map(|(id, doc)| (id.clone(), doc.clone()))
                    .collect()
            })
            .unwrap_or_default();
        Arc::new(docs)
    }

    /// Publish while the write guard is still held
    fn publish_locked(&self, data: &Collections, path: &CollectionPath) {
        if self.hub.is_watched(path) {
            self.hub.publish(path, Self::snapshot_of(data, path));
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &CollectionPath, id: &str) -> StoreResult<Option<Value>> {
        let data = self.data.read();
        Ok(data.get(&path.key()).and_then(|docs| docs.get(id)).cloned())
    }

    async fn set(&self, path: &CollectionPath, id: &str, doc: Value) -> StoreResult<()> {
        let mut data = self.data.write();
        data.entry(path.key())
            .or_default()
            .insert(id.to_string(), doc);
        self.publish_locked(&data, path);
        Ok(())
    }

    async fn update(
        &self,
        path: &CollectionPath,
        id: &str,
        fields: Map<String, Value>,
    ) -> StoreResult<()> {
        let mut data = self.data.write();
        let doc = data
            .get_mut(&path.key())
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                collection: path.key(),
                id: id.to_string(),
            })?;
        merge_fields(path, id, doc, fields)?;
        self.publish_locked(&data, path);
        Ok(())
    }

    async fn delete(&self, path: &CollectionPath, id: &str) -> StoreResult<bool> {
        let mut data = self.data.write();
        let removed = data
            .get_mut(&path.key())
            .and_then(|docs| docs.remove(id))
            .is_some();
        if removed {
            self.publish_locked(&data, path);
        }
        Ok(removed)
    }

    async fn list(&self, path: &CollectionPath) -> StoreResult<Vec<(String, Value)>> {
        let data = self.data.read();
        Ok(Self::snapshot_of(&data, path).as_ref().clone())
    }

    fn subscribe(&self, path: &CollectionPath) -> StoreResult<watch::Receiver<Snapshot>> {
        // 写锁保证订阅初始快照与后续发布之间没有遗漏
        let data = self.data.write();
        self.hub
            .subscribe(path, || Ok::<_, StoreError>(Self::snapshot_of(&data, path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Collection, Namespace};
    use serde_json::json;

    fn tables() -> CollectionPath {
        CollectionPath::new(Namespace::new("test"), Collection::Tables)
    }

    #[tokio::test]
    async fn test_set_get_and_list_ordered_by_id() {
        let store = MemoryStore::new();
        store.set(&tables(), "b", json!({"tableNumber": 2})).await.unwrap();
        store.set(&tables(), "a", json!({"tableNumber": 1})).await.unwrap();

        let doc = store.get(&tables(), "a").await.unwrap().unwrap();
        assert_eq!(doc["tableNumber"], 1);

        let ids: Vec<String> = store
            .list(&tables())
            .await
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_update_merges_fields_and_requires_existing_doc() {
        let store = MemoryStore::new();
        store
            .set(&tables(), "t1", json!({"tableNumber": 1, "occupied": false}))
            .await
            .unwrap();

        let mut fields = Map::new();
        fields.insert("occupied".into(), json!(true));
        store.update(&tables(), "t1", fields.clone()).await.unwrap();
        let doc = store.get(&tables(), "t1").await.unwrap().unwrap();
        assert_eq!(doc, json!({"tableNumber": 1, "occupied": true}));

        let err = store.update(&tables(), "missing", fields).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_query_eq_filters_on_top_level_field() {
        let store = MemoryStore::new();
        store.set(&tables(), "t1", json!({"tableNumber": 1})).await.unwrap();
        store.set(&tables(), "t2", json!({"tableNumber": 2})).await.unwrap();

        let hits = store
            .query_eq(&tables(), "tableNumber", &json!(2))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, "t2");
    }

    #[tokio::test]
    async fn test_subscription_sees_current_state_then_full_snapshots() {
        let store = MemoryStore::new();
        store.set(&tables(), "t1", json!({"tableNumber": 1})).await.unwrap();

        let mut rx = store.subscribe(&tables()).unwrap();
        assert_eq!(rx.borrow_and_update().len(), 1);

        store.set(&tables(), "t2", json!({"tableNumber": 2})).await.unwrap();
        rx.changed().await.unwrap();
        // 完整结果集，而非增量
        assert_eq!(rx.borrow_and_update().len(), 2);

        assert!(store.delete(&tables(), "t1").await.unwrap());
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().len(), 1);
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let store = MemoryStore::new();
        let other = CollectionPath::new(Namespace::new("other"), Collection::Tables);
        store.set(&tables(), "t1", json!({})).await.unwrap();
        assert!(store.get(&other, "t1").await.unwrap().is_none());
        assert!(store.list(&other).await.unwrap().is_empty());
    }
}
