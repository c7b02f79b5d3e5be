//! Outbox Worker - retries side effects left behind by transitions
//!
//! Scans the outbox every `OUTBOX_SCAN_INTERVAL_SECS`. Each entry backs off
//! exponentially; after `OUTBOX_MAX_RETRIES` failed attempts it moves to the
//! dead letter collection. Dead letters are requeued on startup.

use super::effects::{RunMode, SideEffects};
use super::outbox::{Outbox, OutboxEntry, Settled};
use crate::store::{DocumentStore, Namespace, OrderRepository};
use crate::utils::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Counts for one scan
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OutboxScan {
    pub settled: usize,
    pub retrying: usize,
    pub dead_lettered: usize,
    pub skipped: usize,
}

pub struct OutboxWorker {
    orders: OrderRepository,
    outbox: Outbox,
    effects: SideEffects,
    clock: Arc<dyn Clock>,
    scan_interval: Duration,
    max_retries: u32,
    shutdown: CancellationToken,
}

impl OutboxWorker {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        namespace: Namespace,
        effects: SideEffects,
        clock: Arc<dyn Clock>,
        scan_interval: Duration,
        max_retries: u32,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            orders: OrderRepository::new(store.clone(), namespace.clone()),
            outbox: Outbox::new(store, namespace),
            effects,
            clock,
            scan_interval,
            max_retries,
            shutdown,
        }
    }

    pub async fn run(self) {
        tracing::info!(
            interval_secs = self.scan_interval.as_secs(),
            max_retries = self.max_retries,
            "OutboxWorker started"
        );

        // Recover dead letter entries back to the pending queue
        match self.outbox.recover_dead_letters(self.clock.now_millis()).await {
            Ok(0) => {}
            Ok(n) => tracing::info!(count = n, "Recovered dead letter entries to outbox"),
            Err(e) => tracing::error!(error = %e, "Failed to recover dead letter entries"),
        }

        let mut scan_interval = tokio::time::interval(self.scan_interval);
        loop {
            tokio::select! {
                _ = scan_interval.tick() => {
                    self.process_pending_queue().await;
                }
                _ = self.shutdown.cancelled() => {
                    tracing::info!("OutboxWorker received shutdown signal");
                    break;
                }
            }
        }

        tracing::info!("OutboxWorker stopped");
    }

    /// Process every due entry once
    pub async fn process_pending_queue(&self) -> OutboxScan {
        let mut scan = OutboxScan::default();
        let pending = match self.outbox.pending().await {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load outbox");
                return scan;
            }
        };
        if pending.is_empty() {
            return scan;
        }

        tracing::debug!(count = pending.len(), "Processing outbox");
        for entry in pending {
            self.process_entry(entry, &mut scan).await;
        }
        if scan != OutboxScan::default() {
            tracing::info!(
                settled = scan.settled,
                retrying = scan.retrying,
                dead_lettered = scan.dead_lettered,
                "Outbox scan finished"
            );
        }
        scan
    }

    async fn process_entry(&self, entry: OutboxEntry, scan: &mut OutboxScan) {
        let now = self.clock.now_millis();

        if entry.retry_count >= self.max_retries {
            self.dead_letter(entry, now, scan).await;
            return;
        }
        if !entry.is_due(now) {
            scan.skipped += 1;
            return;
        }

        let order = match self.orders.find_by_id(&entry.order_id).await {
            Ok(Some(order)) => order,
            Ok(None) => {
                tracing::warn!(order_id = %entry.order_id, entry = %entry.id, "Order gone, dropping outbox entry");
                if let Err(e) = self.outbox.remove(&entry.id).await {
                    tracing::error!(entry = %entry.id, error = %e, "Failed to drop outbox entry");
                }
                scan.settled += 1;
                return;
            }
            Err(e) => {
                tracing::error!(order_id = %entry.order_id, error = %e, "Failed to load order for outbox entry");
                return;
            }
        };

        let outcome = self.effects.run_all(&order, &entry.effects, RunMode::Retry).await;
        match self.outbox.settle(entry, outcome, now).await {
            Ok(Settled::Done) => {
                tracing::info!(order_id = %order.id, "Outbox entry settled");
                scan.settled += 1;
            }
            Ok(Settled::Retrying(entry)) if entry.retry_count >= self.max_retries => {
                self.dead_letter(entry, now, scan).await;
            }
            Ok(Settled::Retrying(entry)) => {
                tracing::warn!(
                    order_id = %order.id,
                    retry_count = entry.retry_count,
                    next_attempt_at = entry.next_attempt_at,
                    last_error = ?entry.last_error,
                    "Outbox entry still failing"
                );
                scan.retrying += 1;
            }
            Err(e) => {
                tracing::error!(order_id = %order.id, error = %e, "Failed to settle outbox entry");
            }
        }
    }

    async fn dead_letter(&self, entry: OutboxEntry, now: i64, scan: &mut OutboxScan) {
        tracing::error!(
            order_id = %entry.order_id,
            entry = %entry.id,
            retry_count = entry.retry_count,
            last_error = ?entry.last_error,
            "Max retry count exceeded, moving to dead letter queue"
        );
        match self.outbox.move_to_dead_letter(entry, now).await {
            Ok(()) => scan.dead_lettered += 1,
            Err(e) => tracing::error!(error = %e, "Failed to move outbox entry to dead letters"),
        }
    }
}
