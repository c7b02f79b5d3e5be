//! Side-effect outbox
//!
//! One entry per persisted transition, keyed `{order_id}:{status}`, holding
//! the projection/ledger writes that have not succeeded yet. Entries are
//! deleted once empty; failing ones back off and end up in `dead_letters`.
//!
//! | Collection | Key | Value |
//! |------------|-----|-------|
//! | `outbox` | `{order_id}:{status}` | `OutboxEntry` pending retry |
//! | `dead_letters` | same | `OutboxEntry` that exhausted its retries |

use crate::store::{Collection, Document, DocumentStore, Namespace, Repository, StoreResult};
use serde::{Deserialize, Serialize};
use shared::models::{Order, OrderStatus};
use std::sync::Arc;

pub const RETRY_BASE_DELAY_SECS: u64 = 5;
pub const RETRY_MAX_DELAY_SECS: u64 = 300;

/// Derived-state write owed by a transition
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SideEffect {
    OccupyTable,
    ReleaseTable,
    RegisterCustomer,
    CompleteCustomer,
}

impl SideEffect {
    pub fn as_str(self) -> &'static str {
        match self {
            SideEffect::OccupyTable => "occupy_table",
            SideEffect::ReleaseTable => "release_table",
            SideEffect::RegisterCustomer => "register_customer",
            SideEffect::CompleteCustomer => "complete_customer",
        }
    }

    pub fn is_table(self) -> bool {
        matches!(self, SideEffect::OccupyTable | SideEffect::ReleaseTable)
    }
}

/// Effects owed by `order` having just entered `status`
pub fn effects_for(order: &Order, status: OrderStatus) -> Vec<SideEffect> {
    let has_phone = order
        .customer_phone
        .as_deref()
        .is_some_and(|p| !shared::util::normalize_phone(p).is_empty());

    let mut effects = Vec::new();
    match status {
        OrderStatus::Pending => {
            if order.has_table() {
                effects.push(SideEffect::OccupyTable);
            }
            if has_phone {
                effects.push(SideEffect::RegisterCustomer);
            }
        }
        OrderStatus::Served => {
            if order.has_table() {
                effects.push(SideEffect::ReleaseTable);
            }
            if has_phone {
                effects.push(SideEffect::CompleteCustomer);
            }
        }
        OrderStatus::Cancelled => {
            if order.has_table() {
                effects.push(SideEffect::ReleaseTable);
            }
        }
        OrderStatus::Preparing | OrderStatus::Ready => {}
    }
    effects
}

/// Exponential backoff: base * 2^attempt, capped
pub fn backoff_delay_secs(attempt: u32) -> u64 {
    2u64.checked_pow(attempt)
        .and_then(|factor| RETRY_BASE_DELAY_SECS.checked_mul(factor))
        .map_or(RETRY_MAX_DELAY_SECS, |delay| delay.min(RETRY_MAX_DELAY_SECS))
}

fn backoff_millis(attempt: u32) -> i64 {
    backoff_delay_secs(attempt) as i64 * 1000
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OutboxEntry {
    /// `{order_id}:{status}`
    pub id: String,
    pub order_id: String,
    pub status: OrderStatus,
    /// Effects still owed
    pub effects: Vec<SideEffect>,
    /// Failed attempts so far
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub last_error: Option<String>,
    pub created_at: i64,
    #[serde(default)]
    pub next_attempt_at: i64,
    /// Set while parked in `dead_letters`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<i64>,
}

impl Document for OutboxEntry {
    const COLLECTION: Collection = Collection::Outbox;

    fn doc_id(&self) -> &str {
        &self.id
    }
}

impl OutboxEntry {
    pub fn key(order_id: &str, status: OrderStatus) -> String {
        format!("{}:{}", order_id, status)
    }

    /// The inline run counts as attempt 0: the entry is not due before the
    /// first backoff has elapsed, so the worker cannot race the caller.
    pub fn new(order: &Order, effects: Vec<SideEffect>, now: i64) -> Self {
        Self {
            id: Self::key(&order.id, order.status),
            order_id: order.id.clone(),
            status: order.status,
            effects,
            retry_count: 0,
            last_error: None,
            created_at: now,
            next_attempt_at: now + backoff_millis(0),
            failed_at: None,
        }
    }

    pub fn is_due(&self, now: i64) -> bool {
        now >= self.next_attempt_at
    }
}

/// What an attempt left behind
#[derive(Debug, Default)]
pub struct EffectOutcome {
    pub remaining: Vec<SideEffect>,
    pub last_error: Option<String>,
}

/// Result of settling an attempt
#[derive(Debug)]
pub enum Settled {
    /// Nothing owed; entry deleted
    Done,
    /// Entry rescheduled with the remaining effects
    Retrying(OutboxEntry),
}

#[derive(Clone)]
pub struct Outbox {
    pending: Repository<OutboxEntry>,
    dead: Repository<OutboxEntry>,
}

impl Outbox {
    pub fn new(store: Arc<dyn DocumentStore>, namespace: Namespace) -> Self {
        Self {
            pending: Repository::new(store.clone(), namespace.clone()),
            dead: Repository::in_collection(store, namespace, Collection::DeadLetters),
        }
    }

    pub async fn enqueue(&self, entry: &OutboxEntry) -> StoreResult<()> {
        self.pending.put(entry).await
    }

    /// Record the outcome of an attempt made at `now`
    pub async fn settle(
        &self,
        mut entry: OutboxEntry,
        outcome: EffectOutcome,
        now: i64,
    ) -> StoreResult<Settled> {
        if outcome.remaining.is_empty() {
            self.pending.delete(&entry.id).await?;
            return Ok(Settled::Done);
        }
        entry.next_attempt_at = now + backoff_millis(entry.retry_count);
        entry.effects = outcome.remaining;
        entry.retry_count += 1;
        entry.last_error = outcome.last_error;
        self.pending.put(&entry).await?;
        Ok(Settled::Retrying(entry))
    }

    /// All pending entries, oldest first
    pub async fn pending(&self) -> StoreResult<Vec<OutboxEntry>> {
        let mut entries = self.pending.find_all().await?;
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(entries)
    }

    pub async fn remove(&self, id: &str) -> StoreResult<bool> {
        self.pending.delete(id).await
    }

    pub async fn move_to_dead_letter(&self, mut entry: OutboxEntry, now: i64) -> StoreResult<()> {
        entry.failed_at = Some(now);
        self.dead.put(&entry).await?;
        self.pending.delete(&entry.id).await?;
        Ok(())
    }

    pub async fn dead_letters(&self) -> StoreResult<Vec<OutboxEntry>> {
        self.dead.find_all().await
    }

    /// Requeue every dead letter with its retry count reset
    pub async fn recover_dead_letters(&self, now: i64) -> StoreResult<usize> {
        let mut recovered = 0;
        for mut entry in self.dead.find_all().await? {
            entry.retry_count = 0;
            entry.failed_at = None;
            entry.next_attempt_at = now;
            self.pending.put(&entry).await?;
            self.dead.delete(&entry.id).await?;
            recovered += 1;
        }
        Ok(recovered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use shared::models::OrderItem;

    fn order(table_number: u32, phone: Option<&str>) -> Order {
        Order {
            id: "o1".into(),
            table_number,
            customer_name: "Asha".into(),
            customer_phone: phone.map(str::to_string),
            items: vec![OrderItem {
                menu_item_id: "m1".into(),
                name: "Pizza".into(),
                price: 200.0,
                quantity: 2,
                note: None,
            }],
            status: OrderStatus::Pending,
            total_amount: 400.0,
            notes: String::new(),
            order_source: Default::default(),
            payment_method: None,
            created_at: 0,
            updated_at: 0,
            status_history: Vec::new(),
        }
    }

    #[test]
    fn test_effects_per_transition() {
        use SideEffect::*;
        let dine_in = order(5, Some("98765"));
        assert_eq!(
            effects_for(&dine_in, OrderStatus::Pending),
            vec![OccupyTable, RegisterCustomer]
        );
        assert_eq!(
            effects_for(&dine_in, OrderStatus::Served),
            vec![ReleaseTable, CompleteCustomer]
        );
        assert_eq!(effects_for(&dine_in, OrderStatus::Cancelled), vec![ReleaseTable]);
        assert!(effects_for(&dine_in, OrderStatus::Ready).is_empty());

        let pickup = order(0, Some("n/a"));
        assert!(effects_for(&pickup, OrderStatus::Pending).is_empty());
        assert!(effects_for(&pickup, OrderStatus::Served).is_empty());
    }

    #[test]
    fn test_backoff_is_capped() {
        assert_eq!(backoff_delay_secs(0), 5);
        assert_eq!(backoff_delay_secs(1), 10);
        assert_eq!(backoff_delay_secs(5), 160);
        assert_eq!(backoff_delay_secs(6), 300);
        assert_eq!(backoff_delay_secs(80), 300);
    }

    #[tokio::test]
    async fn test_settle_reschedules_then_deletes() {
        let outbox = Outbox::new(Arc::new(MemoryStore::new()), Namespace::new("r1"));
        let entry = OutboxEntry::new(&order(5, None), vec![SideEffect::OccupyTable], 1_000);
        assert_eq!(entry.id, "o1:pending");
        // 内联执行期间不可被 worker 取走
        assert!(!entry.is_due(1_000));
        assert!(entry.is_due(6_000));
        outbox.enqueue(&entry).await.unwrap();

        let failed = EffectOutcome {
            remaining: vec![SideEffect::OccupyTable],
            last_error: Some("table store down".into()),
        };
        let Settled::Retrying(entry) = outbox.settle(entry, failed, 2_000).await.unwrap() else {
            panic!("expected retry");
        };
        assert_eq!(entry.retry_count, 1);
        assert_eq!(entry.next_attempt_at, 7_000);
        assert!(!entry.is_due(6_999));

        let done = outbox.settle(entry, EffectOutcome::default(), 8_000).await.unwrap();
        assert!(matches!(done, Settled::Done));
        assert!(outbox.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dead_letter_round_trip() {
        let outbox = Outbox::new(Arc::new(MemoryStore::new()), Namespace::new("r1"));
        let mut entry = OutboxEntry::new(&order(5, None), vec![SideEffect::ReleaseTable], 0);
        entry.retry_count = 5;
        outbox.enqueue(&entry).await.unwrap();

        outbox.move_to_dead_letter(entry, 50).await.unwrap();
        assert!(outbox.pending().await.unwrap().is_empty());
        let dead = outbox.dead_letters().await.unwrap();
        assert_eq!(dead[0].failed_at, Some(50));

        assert_eq!(outbox.recover_dead_letters(60).await.unwrap(), 1);
        let pending = outbox.pending().await.unwrap();
        assert_eq!(pending[0].retry_count, 0);
        assert_eq!(pending[0].next_attempt_at, 60);
        assert!(outbox.dead_letters().await.unwrap().is_empty());
    }
}
