//! Snapshot fan-out shared by the store backends
//!
//! One `watch` channel per collection path. Backends publish the complete,
//! id-ordered contents of a collection after every committed write; a channel
//! only exists once somebody subscribed to that path.
//!
//! Backends must call [`SnapshotHub::publish`] and [`SnapshotHub::subscribe`]
//! under their write lock, otherwise a subscriber can be seeded with a
//! snapshot older than one already published.

use super::{CollectionPath, Snapshot};
use dashmap::DashMap;
use tokio::sync::watch;

#[derive(Debug, Default)]
pub struct SnapshotHub {
    channels: DashMap<String, watch::Sender<Snapshot>>,
}

impl SnapshotHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any subscriber ever asked for `path`
    pub fn is_watched(&self, path: &CollectionPath) -> bool {
        self.channels.contains_key(&path.key())
    }

    /// Replace the current snapshot of `path`. No-op for unwatched paths.
    pub fn publish(&self, path: &CollectionPath, snapshot: Snapshot) {
        if let Some(sender) = self.channels.get(&path.key()) {
            sender.send_replace(snapshot);
        }
    }

    /// Subscribe to `path`, seeding the channel with `load()` on first use.
    pub fn subscribe<E>(
        &self,
        path: &CollectionPath,
        load: impl FnOnce() -> Result<Snapshot, E>,
    ) -> Result<watch::Receiver<Snapshot>, E> {
        let key = path.key();
        if let Some(sender) = self.channels.get(&key) {
            return Ok(sender.subscribe());
        }
        let initial = load()?;
        let sender = self
            .channels
            .entry(key)
            .or_insert_with(|| watch::channel(initial).0);
        Ok(sender.subscribe())
    }
}
