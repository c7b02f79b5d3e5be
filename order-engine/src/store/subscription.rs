//! Live collection subscriptions
//!
//! Every delivery is the *entire* current collection, never a delta. Code that
//! reacts to "new" documents diffs against the previous delivery with
//! [`SnapshotDiffer`], which treats the first delivery as the initial load.

use super::repository::{Document, decode};
use super::{CollectionPath, Snapshot};
use shared::models::Order;
use std::collections::HashSet;
use tokio::sync::watch;

/// Typed full-snapshot subscription to one collection
pub struct Subscription<T: Document> {
    path: CollectionPath,
    rx: watch::Receiver<Snapshot>,
    delivered_initial: bool,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Document> Subscription<T> {
    pub(crate) fn new(path: CollectionPath, rx: watch::Receiver<Snapshot>) -> Self {
        Self {
            path,
            rx,
            delivered_initial: false,
            _marker: std::marker::PhantomData,
        }
    }

    /// Wait for the next full snapshot.
    ///
    /// The first call returns the current state immediately. Returns `None`
    /// once the store is gone.
    pub async fn next(&mut self) -> Option<Vec<T>> {
        if self.delivered_initial {
            self.rx.changed().await.ok()?;
        } else {
            self.delivered_initial = true;
        }
        let snapshot = self.rx.borrow_and_update().clone();
        Some(self.decode_all(&snapshot))
    }

    /// Current state without waiting
    pub fn current(&self) -> Vec<T> {
        let snapshot = self.rx.borrow().clone();
        self.decode_all(&snapshot)
    }

    fn decode_all(&self, snapshot: &Snapshot) -> Vec<T> {
        snapshot
            .iter()
            .filter_map(|(id, doc)| decode(&self.path, id, doc.clone()))
            .collect()
    }
}

/// Detects documents that were not present in the previous delivery
#[derive(Debug)]
pub struct SnapshotDiffer<T: Document> {
    previous: Option<HashSet<String>>,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Document> Default for SnapshotDiffer<T> {
    fn default() -> Self {
        Self {
            previous: None,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T: Document> SnapshotDiffer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `snapshot` and return the entries new since the last call.
    ///
    /// The first call only records (initial load is not "new").
    pub fn observe<'a>(&mut self, snapshot: &'a [T]) -> Vec<&'a T> {
        let current: HashSet<String> = snapshot.iter().map(|doc| doc.doc_id().to_string()).collect();
        let fresh = match &self.previous {
            None => Vec::new(),
            Some(previous) => snapshot
                .iter()
                .filter(|doc| !previous.contains(doc.doc_id()))
                .collect(),
        };
        self.previous = Some(current);
        fresh
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }
}

/// Surfaces orders that genuinely appeared after subscribing
pub struct NewOrderWatcher {
    subscription: Subscription<Order>,
    differ: SnapshotDiffer<Order>,
}

impl NewOrderWatcher {
    /// Orders present when the subscription was taken count as the initial load
    pub fn new(subscription: Subscription<Order>) -> Self {
        let mut differ = SnapshotDiffer::new();
        differ.observe(&subscription.current());
        Self {
            subscription,
            differ,
        }
    }

    /// Wait until at least one new order shows up. `None` when the store is gone.
    pub async fn next_new_orders(&mut self) -> Option<Vec<Order>> {
        loop {
            let snapshot = self.subscription.next().await?;
            let fresh: Vec<Order> = self.differ.observe(&snapshot).into_iter().cloned().collect();
            if !fresh.is_empty() {
                return Some(fresh);
            }
        }
    }
}
