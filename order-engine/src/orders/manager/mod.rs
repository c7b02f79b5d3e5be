//! OrdersManager - order state machine
//!
//! # Transition Flow
//!
//! ```text
//! update_order_status(id, status)
//!     ├─ 1. Load order (NotFound if absent)
//!     ├─ 2. Check the transition table (InvalidTransition otherwise)
//!     ├─ 3. Append history entry (monotonic timestamp)
//!     ├─ 4. Persist status / statusHistory / updatedAt
//!     ├─ 5. Record outbox entry for table + customer effects
//!     ├─ 6. Run effects inline, settle the outbox entry
//!     └─ 7. Fire notifications (never retried)
//! ```
//!
//! Only steps 1-4 can fail the call. Everything after the order write is
//! best-effort and repaired by the outbox worker or reconciliation.

use super::effects::{RunMode, SideEffects};
use super::outbox::{Outbox, OutboxEntry, Settled, effects_for};
use crate::error::{OrderError, OrderResult, Resource};
use crate::notifications::NotificationDispatcher;
use crate::store::repository::fields;
use crate::store::{DocumentStore, Namespace, OrderRepository};
use crate::utils::Clock;
use crate::utils::validation::{
    MAX_NAME_LEN, MAX_NOTE_LEN, MAX_SHORT_TEXT_LEN, validate_amount, validate_optional_text,
    validate_required_text, validate_text_len,
};
use serde_json::json;
use shared::{AppError, ErrorCode};
use shared::models::{Order, OrderInput, OrderStatus, StatusHistoryEntry};
use std::sync::Arc;

/// Reject malformed input before anything is written
pub fn validate_order_input(input: &OrderInput) -> Result<(), AppError> {
    if input.items.is_empty() {
        return Err(AppError::with_message(
            ErrorCode::OrderEmpty,
            "Order must contain at least one item",
        ));
    }
    validate_amount(input.total_amount, "totalAmount")?;
    validate_text_len(&input.customer_name, "customerName", MAX_NAME_LEN)?;
    validate_optional_text(&input.customer_phone, "customerPhone", MAX_SHORT_TEXT_LEN)?;
    validate_text_len(&input.notes, "notes", MAX_NOTE_LEN)?;

    for (index, item) in input.items.iter().enumerate() {
        validate_required_text(&item.menu_item_id, &format!("items[{index}].menuItemId"), MAX_SHORT_TEXT_LEN)?;
        validate_required_text(&item.name, &format!("items[{index}].name"), MAX_NAME_LEN)?;
        validate_optional_text(&item.note, &format!("items[{index}].note"), MAX_NOTE_LEN)?;
        validate_amount(item.price, &format!("items[{index}].price"))?;
        if item.quantity == 0 {
            return Err(AppError::validation(format!(
                "items[{index}].quantity must be at least 1"
            )));
        }
    }
    Ok(())
}

#[derive(Clone)]
pub struct OrdersManager {
    orders: OrderRepository,
    outbox: Outbox,
    effects: SideEffects,
    notifier: NotificationDispatcher,
    clock: Arc<dyn Clock>,
}

impl OrdersManager {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        namespace: Namespace,
        effects: SideEffects,
        notifier: NotificationDispatcher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            orders: OrderRepository::new(store.clone(), namespace.clone()),
            outbox: Outbox::new(store, namespace),
            effects,
            notifier,
            clock,
        }
    }

    pub async fn create_order(&self, input: OrderInput) -> OrderResult<Order> {
        validate_order_input(&input)?;

        let now = self.clock.now_millis();
        let customer_phone = input
            .customer_phone
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        let order = Order {
            id: shared::util::new_document_id(),
            table_number: input.table_number,
            customer_name: input.customer_name.trim().to_string(),
            customer_phone,
            items: input.items,
            status: OrderStatus::Pending,
            total_amount: input.total_amount,
            notes: input.notes,
            order_source: input.order_source,
            payment_method: input.payment_method,
            created_at: now,
            updated_at: now,
            status_history: vec![StatusHistoryEntry {
                status: OrderStatus::Pending,
                timestamp: now,
                duration: 0,
            }],
        };
        self.orders.put(&order).await?;
        tracing::info!(
            order_id = %order.id,
            table_number = order.table_number,
            items = order.items.len(),
            total = order.total_amount,
            "Order created"
        );

        self.after_transition(&order).await;
        self.notifier.notify_new_order(&order).await;
        Ok(order)
    }

    pub async fn update_order_status(&self, order_id: &str, new_status: OrderStatus) -> OrderResult<Order> {
        let mut order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| OrderError::not_found(Resource::Order, order_id))?;

        if !order.status.can_transition_to(new_status) {
            return Err(OrderError::InvalidTransition {
                from: order.status,
                to: new_status,
            });
        }

        // 时钟回拨时不让历史倒序
        let previous_at = order.last_transition_at();
        let timestamp = self.clock.now_millis().max(previous_at);
        order.status_history.push(StatusHistoryEntry {
            status: new_status,
            timestamp,
            duration: timestamp - previous_at,
        });
        let from = order.status;
        order.status = new_status;
        order.updated_at = timestamp;

        self.orders
            .update_fields(
                order_id,
                fields([
                    ("status", json!(order.status)),
                    ("statusHistory", json!(order.status_history)),
                    ("updatedAt", json!(order.updated_at)),
                ]),
            )
            .await?;
        tracing::info!(order_id = %order.id, from = %from, to = %new_status, "Order status updated");

        self.after_transition(&order).await;
        if new_status == OrderStatus::Ready {
            self.notifier.notify_order_ready(&order).await;
        }
        Ok(order)
    }

    pub async fn get_order(&self, order_id: &str) -> OrderResult<Option<Order>> {
        Ok(self.orders.find_by_id(order_id).await?)
    }

    /// Orders in pending / preparing / ready, oldest first
    pub async fn active_orders(&self) -> OrderResult<Vec<Order>> {
        let mut active: Vec<Order> = self
            .orders
            .find_all()
            .await?
            .into_iter()
            .filter(|o| o.status.is_active())
            .collect();
        active.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(active)
    }

    /// Outbox + inline effects for the status `order` just entered. Never fails.
    async fn after_transition(&self, order: &Order) {
        let effects = effects_for(order, order.status);
        if effects.is_empty() {
            return;
        }

        let now = self.clock.now_millis();
        let entry = OutboxEntry::new(order, effects, now);
        let recorded = match self.outbox.enqueue(&entry).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(order_id = %order.id, status = %order.status, error = %e, "Failed to record outbox entry");
                false
            }
        };

        let outcome = self.effects.run_all(order, &entry.effects, RunMode::Inline).await;

        if !recorded {
            if !outcome.remaining.is_empty() {
                tracing::warn!(
                    order_id = %order.id,
                    remaining = outcome.remaining.len(),
                    "Side effects failed without outbox entry, left for reconciliation"
                );
            }
            return;
        }

        match self.outbox.settle(entry, outcome, now).await {
            Ok(Settled::Done) => {}
            Ok(Settled::Retrying(entry)) => {
                tracing::info!(
                    order_id = %order.id,
                    entry = %entry.id,
                    remaining = entry.effects.len(),
                    next_attempt_at = entry.next_attempt_at,
                    "Side effects queued for retry"
                );
            }
            Err(e) => {
                tracing::warn!(order_id = %order.id, error = %e, "Failed to settle outbox entry");
            }
        }
    }
}

#[cfg(test)]
mod tests;
