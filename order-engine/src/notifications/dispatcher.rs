//! Notification dispatcher
//!
//! Notifications are advisory. `notify_*` never fail the caller and are
//! never retried; `emit` returns the error for callers that care.

use crate::error::{OrderError, OrderResult, Resource};
use crate::store::repository::fields;
use crate::store::{DocumentStore, Namespace, NotificationRepository};
use crate::utils::Clock;
use serde_json::json;
use shared::models::{Notification, NotificationType, Order};
use std::sync::Arc;

#[derive(Clone)]
pub struct NotificationDispatcher {
    notifications: NotificationRepository,
    clock: Arc<dyn Clock>,
}

impl NotificationDispatcher {
    pub fn new(store: Arc<dyn DocumentStore>, namespace: Namespace, clock: Arc<dyn Clock>) -> Self {
        Self {
            notifications: NotificationRepository::new(store, namespace),
            clock,
        }
    }

    pub async fn emit(
        &self,
        notification_type: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
        order_id: Option<&str>,
        table_number: Option<u32>,
    ) -> OrderResult<Notification> {
        let notification = Notification {
            id: shared::util::new_document_id(),
            notification_type,
            title: title.into(),
            message: message.into(),
            order_id: order_id.map(str::to_string),
            table_number,
            is_read: false,
            created_at: self.clock.now_millis(),
        };
        self.notifications.put(&notification).await?;
        Ok(notification)
    }

    /// `new_order`, fire-and-forget
    pub async fn notify_new_order(&self, order: &Order) {
        let message = if order.has_table() {
            format!(
                "Table {} - {} ({} item(s))",
                order.table_number,
                order.customer_name,
                order.items.len()
            )
        } else {
            format!("Pickup - {} ({} item(s))", order.customer_name, order.items.len())
        };
        self.fire(order, NotificationType::NewOrder, "New Order", message)
            .await;
    }

    /// `order_ready`, fire-and-forget
    pub async fn notify_order_ready(&self, order: &Order) {
        let message = if order.has_table() {
            format!("Order for table {} is ready to serve", order.table_number)
        } else {
            format!("Pickup order for {} is ready", order.customer_name)
        };
        self.fire(order, NotificationType::OrderReady, "Order Ready", message)
            .await;
    }

    async fn fire(&self, order: &Order, kind: NotificationType, title: &str, message: String) {
        let table_number = order.has_table().then_some(order.table_number);
        if let Err(e) = self
            .emit(kind, title, message, Some(&order.id), table_number)
            .await
        {
            tracing::warn!(order_id = %order.id, kind = ?kind, error = %e, "Failed to emit notification");
        }
    }

    /// Idempotent; NotFound if the notification does not exist
    pub async fn mark_read(&self, notification_id: &str) -> OrderResult<()> {
        let notification = self
            .notifications
            .find_by_id(notification_id)
            .await?
            .ok_or_else(|| OrderError::not_found(Resource::Notification, notification_id))?;
        if notification.is_read {
            return Ok(());
        }
        self.notifications
            .update_fields(notification_id, fields([("isRead", json!(true))]))
            .await?;
        Ok(())
    }

    /// Unread notifications, newest first
    pub async fn unread(&self) -> OrderResult<Vec<Notification>> {
        let mut unread = self.notifications.find_where("isRead", &json!(false)).await?;
        unread.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(unread)
    }

    /// Returns how many notifications were marked. Individual failures are logged and skipped.
    pub async fn mark_all_read(&self) -> OrderResult<usize> {
        let mut marked = 0;
        for notification in self.unread().await? {
            match self
                .notifications
                .update_fields(&notification.id, fields([("isRead", json!(true))]))
                .await
            {
                Ok(()) => marked += 1,
                Err(e) => {
                    tracing::warn!(notification_id = %notification.id, error = %e, "Failed to mark notification read");
                }
            }
        }
        Ok(marked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::FailingStore;
    use crate::store::{Collection, MemoryStore};
    use crate::utils::ManualClock;

    fn dispatcher(store: Arc<dyn DocumentStore>, clock: Arc<ManualClock>) -> NotificationDispatcher {
        NotificationDispatcher::new(store, Namespace::new("r1"), clock)
    }

    #[tokio::test]
    async fn test_emit_and_mark_read() {
        let clock = Arc::new(ManualClock::new(10));
        let d = dispatcher(Arc::new(MemoryStore::new()), clock.clone());
        let first = d
            .emit(NotificationType::NewOrder, "New Order", "Table 2", Some("o1"), Some(2))
            .await
            .unwrap();
        clock.advance(5);
        let second = d
            .emit(NotificationType::OrderReady, "Order Ready", "Table 2", Some("o1"), Some(2))
            .await
            .unwrap();

        let unread = d.unread().await.unwrap();
        assert_eq!(unread.len(), 2);
        assert_eq!(unread[0].id, second.id);
        assert!(!unread[0].is_read);

        d.mark_read(&first.id).await.unwrap();
        d.mark_read(&first.id).await.unwrap();
        let unread = d.unread().await.unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].id, second.id);
    }

    #[tokio::test]
    async fn test_mark_read_unknown_is_not_found() {
        let d = dispatcher(Arc::new(MemoryStore::new()), Arc::new(ManualClock::new(0)));
        let err = d.mark_read("missing").await.unwrap_err();
        assert!(matches!(err, OrderError::NotFound(Resource::Notification, _)));
    }

    #[tokio::test]
    async fn test_mark_all_read() {
        let d = dispatcher(Arc::new(MemoryStore::new()), Arc::new(ManualClock::new(0)));
        for i in 0..3 {
            d.emit(NotificationType::TableStatus, "Table", format!("{i}"), None, Some(i))
                .await
                .unwrap();
        }
        assert_eq!(d.mark_all_read().await.unwrap(), 3);
        assert!(d.unread().await.unwrap().is_empty());
        assert_eq!(d.mark_all_read().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_notify_swallows_store_failures() {
        let store = Arc::new(FailingStore::new());
        store.break_writes(Collection::Notifications);
        let d = dispatcher(store.clone(), Arc::new(ManualClock::new(0)));
        let order = Order {
            id: "o1".into(),
            table_number: 0,
            customer_name: "Walk-in".into(),
            customer_phone: None,
            items: Vec::new(),
            status: Default::default(),
            total_amount: 0.0,
            notes: String::new(),
            order_source: Default::default(),
            payment_method: None,
            created_at: 0,
            updated_at: 0,
            status_history: Vec::new(),
        };
        d.notify_new_order(&order).await;
        assert_eq!(store.writes(Collection::Notifications), 0);
    }
}
