//! Document store abstraction
//!
//! The engine persists JSON documents addressed by
//! `restaurants/{NAMESPACE}/{collection}/{id}`:
//!
//! | Collection | Document | Key |
//! |------------|----------|-----|
//! | `orders` | `Order` | opaque order id |
//! | `tables` | `DiningTable` | storage id (not the table number) |
//! | `customers` | `Customer` | normalized phone |
//! | `notifications` | `Notification` | opaque id |
//! | `outbox` | `OutboxEntry` | `{order_id}:{status}` |
//! | `dead_letters` | `OutboxEntry` | same as `outbox` |
//!
//! Writes are last-write-wins per document field; there are no multi-document
//! transactions. Subscriptions deliver the complete collection on every change.

pub mod error;
pub mod hub;
pub mod memory;
pub mod redb;
pub mod repository;
pub mod subscription;

#[cfg(test)]
pub mod testing;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use redb::RedbStore;
pub use repository::{
    CustomerRepository, Document, NotificationRepository, OrderRepository, Repository,
    TableRepository,
};
pub use subscription::{NewOrderWatcher, SnapshotDiffer, Subscription};

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// Full contents of one collection, ordered by document id
pub type Snapshot = Arc<Vec<(String, Value)>>;

/// Restaurant namespace (normalized uppercase identifier)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace(String);

impl Namespace {
    pub fn new(raw: &str) -> Self {
        Self(shared::util::normalize_namespace(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Orders,
    Tables,
    Customers,
    Notifications,
    Outbox,
    DeadLetters,
}

impl Collection {
    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Orders => "orders",
            Collection::Tables => "tables",
            Collection::Customers => "customers",
            Collection::Notifications => "notifications",
            Collection::Outbox => "outbox",
            Collection::DeadLetters => "dead_letters",
        }
    }
}

/// A collection inside one restaurant namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath {
    pub namespace: Namespace,
    pub collection: Collection,
}

impl CollectionPath {
    pub fn new(namespace: Namespace, collection: Collection) -> Self {
        Self {
            namespace,
            collection,
        }
    }

    /// Storage key prefix, e.g. `restaurants/SPICE/orders`
    pub fn key(&self) -> String {
        format!(
            "restaurants/{}/{}",
            self.namespace.as_str(),
            self.collection.as_str()
        )
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Keyed JSON document storage with full-snapshot subscriptions
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    async fn get(&self, path: &CollectionPath, id: &str) -> StoreResult<Option<Value>>;

    /// Create or replace a document
    async fn set(&self, path: &CollectionPath, id: &str, doc: Value) -> StoreResult<()>;

    /// Merge top-level fields into an existing document.
    ///
    /// Fails with [`StoreError::NotFound`] if the document does not exist.
    async fn update(
        &self,
        path: &CollectionPath,
        id: &str,
        fields: Map<String, Value>,
    ) -> StoreResult<()>;

    /// Returns whether a document was removed
    async fn delete(&self, path: &CollectionPath, id: &str) -> StoreResult<bool>;

    /// All documents of a collection, ordered by id
    async fn list(&self, path: &CollectionPath) -> StoreResult<Vec<(String, Value)>>;

    /// Documents whose top-level `field` equals `value`
    async fn query_eq(
        &self,
        path: &CollectionPath,
        field: &str,
        value: &Value,
    ) -> StoreResult<Vec<(String, Value)>> {
        let docs = self.list(path).await?;
        Ok(docs
            .into_iter()
            .filter(|(_, doc)| doc.get(field) == Some(value))
            .collect())
    }

    /// Live view of a collection. The receiver starts at the current state.
    fn subscribe(&self, path: &CollectionPath) -> StoreResult<watch::Receiver<Snapshot>>;
}

/// Merge `fields` into `doc`, rejecting non-object documents
pub(crate) fn merge_fields(
    path: &CollectionPath,
    id: &str,
    doc: &mut Value,
    fields: Map<String, Value>,
) -> StoreResult<()> {
    let Some(object) = doc.as_object_mut() else {
        return Err(StoreError::InvalidDocument {
            collection: path.key(),
            id: id.to_string(),
            reason: "document is not an object".to_string(),
        });
    };
    object.extend(fields);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_path_key_uses_normalized_namespace() {
        let path = CollectionPath::new(Namespace::new(" spice "), Collection::Orders);
        assert_eq!(path.key(), "restaurants/SPICE/orders");
    }

    #[test]
    fn test_merge_fields_rejects_scalars() {
        let path = CollectionPath::new(Namespace::new("a"), Collection::Tables);
        let mut doc = Value::from(3);
        let err = merge_fields(&path, "t1", &mut doc, Map::new()).unwrap_err();
        assert!(matches!(err, StoreError::InvalidDocument { .. }));
    }
}
