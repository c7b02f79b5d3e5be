//! Typed repositories over the document store
//!
//! One [`Repository`] per (namespace, document type). Reads return `Option`
//! for absent documents; only writes that require an existing document fail
//! with not-found.

use super::{Collection, CollectionPath, DocumentStore, Namespace, StoreResult, Subscription};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use shared::models::{Customer, DiningTable, Notification, Order};
use std::marker::PhantomData;
use std::sync::Arc;

/// A model persisted as one document
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: Collection;

    fn doc_id(&self) -> &str;
}

impl Document for Order {
    const COLLECTION: Collection = Collection::Orders;

    fn doc_id(&self) -> &str {
        &self.id
    }
}

impl Document for DiningTable {
    const COLLECTION: Collection = Collection::Tables;

    fn doc_id(&self) -> &str {
        &self.id
    }
}

impl Document for Customer {
    const COLLECTION: Collection = Collection::Customers;

    fn doc_id(&self) -> &str {
        &self.phone
    }
}

impl Document for Notification {
    const COLLECTION: Collection = Collection::Notifications;

    fn doc_id(&self) -> &str {
        &self.id
    }
}

/// Decode a raw document, logging and skipping malformed ones
pub(crate) fn decode<T: Document>(path: &CollectionPath, id: &str, doc: Value) -> Option<T> {
    match serde_json::from_value(doc) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(collection = %path, id = %id, error = %e, "Skipping malformed document");
            None
        }
    }
}

pub struct Repository<T: Document> {
    store: Arc<dyn DocumentStore>,
    path: CollectionPath,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Document> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            path: self.path.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Document> std::fmt::Debug for Repository<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository").field("path", &self.path).finish()
    }
}

impl<T: Document> Repository<T> {
    pub fn new(store: Arc<dyn DocumentStore>, namespace: Namespace) -> Self {
        Self::in_collection(store, namespace, T::COLLECTION)
    }

    /// Repository over a non-default collection (e.g. dead letters)
    pub fn in_collection(
        store: Arc<dyn DocumentStore>,
        namespace: Namespace,
        collection: Collection,
    ) -> Self {
        Self {
            store,
            path: CollectionPath::new(namespace, collection),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &CollectionPath {
        &self.path
    }

    pub async fn find_by_id(&self, id: &str) -> StoreResult<Option<T>> {
        let doc = self.store.get(&self.path, id).await?;
        Ok(match doc {
            Some(doc) => Some(serde_json::from_value(doc)?),
            None => None,
        })
    }

    /// Create or replace
    pub async fn put(&self, value: &T) -> StoreResult<()> {
        let doc = serde_json::to_value(value)?;
        self.store.set(&self.path, value.doc_id(), doc).await
    }

    /// Merge fields into an existing document
    pub async fn update_fields(&self, id: &str, fields: Map<String, Value>) -> StoreResult<()> {
        self.store.update(&self.path, id, fields).await
    }

    pub async fn delete(&self, id: &str) -> StoreResult<bool> {
        self.store.delete(&self.path, id).await
    }

    pub async fn find_all(&self) -> StoreResult<Vec<T>> {
        let docs = self.store.list(&self.path).await?;
        Ok(docs
            .into_iter()
            .filter_map(|(id, doc)| decode(&self.path, &id, doc))
            .collect())
    }

    pub async fn find_where(&self, field: &str, value: &Value) -> StoreResult<Vec<T>> {
        let docs = self.store.query_eq(&self.path, field, value).await?;
        Ok(docs
            .into_iter()
            .filter_map(|(id, doc)| decode(&self.path, &id, doc))
            .collect())
    }

    pub fn subscribe(&self) -> StoreResult<Subscription<T>> {
        let rx = self.store.subscribe(&self.path)?;
        Ok(Subscription::new(self.path.clone(), rx))
    }
}

pub type OrderRepository = Repository<Order>;
pub type TableRepository = Repository<DiningTable>;
pub type CustomerRepository = Repository<Customer>;
pub type NotificationRepository = Repository<Notification>;

/// Build an update field map from `(name, value)` pairs
pub fn fields<const N: usize>(pairs: [(&str, Value); N]) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}
