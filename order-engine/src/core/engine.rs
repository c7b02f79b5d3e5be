//! Engine - wiring of the order lifecycle components for one restaurant
//!
//! ```text
//! Engine
//!   ├─ OrdersManager ──┬─ SideEffects ─┬─ TableProjector
//!   │                  │               ├─ TableReconciler
//!   │                  │               └─ CustomerLedger
//!   │                  └─ NotificationDispatcher
//!   ├─ OutboxWorker        (TaskKind::Worker)
//!   └─ ReconcileScheduler  (TaskKind::Periodic)
//! ```

use super::config::Config;
use super::tasks::{BackgroundTasks, TaskKind};
use crate::analytics::{self, AnalyticsContext, AnalyticsQuery, AnalyticsReport};
use crate::customers::CustomerLedger;
use crate::error::OrderResult;
use crate::notifications::NotificationDispatcher;
use crate::orders::{OrdersManager, OutboxWorker, SideEffects};
use crate::store::{
    CustomerRepository, DocumentStore, Namespace, NewOrderWatcher, NotificationRepository,
    OrderRepository, Subscription, TableRepository,
};
use crate::tables::{ReconcileReport, ReconcileScheduler, TableProjector, TableReconciler};
use crate::utils::{Clock, SystemClock};
use chrono_tz::Tz;
use shared::AppResult;
use shared::models::{
    Customer, DiningTable, MenuItem, Notification, Order, OrderInput, OrderStatus,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct Engine {
    namespace: Namespace,
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    tz: Tz,
    orders: OrdersManager,
    effects: SideEffects,
    reconciler: TableReconciler,
    ledger: CustomerLedger,
    notifications: NotificationDispatcher,
    outbox_scan_interval: Duration,
    outbox_max_retries: u32,
    reconcile_interval: Duration,
}

impl Engine {
    pub fn new(store: Arc<dyn DocumentStore>, config: &Config) -> AppResult<Self> {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn DocumentStore>,
        config: &Config,
        clock: Arc<dyn Clock>,
    ) -> AppResult<Self> {
        let tz = config.timezone()?;
        let namespace = Namespace::new(&config.restaurant_id);
        if namespace.as_str().is_empty() {
            return Err(shared::AppError::config("RESTAURANT_ID must not be empty"));
        }

        let projector = TableProjector::new(store.clone(), namespace.clone(), clock.clone());
        let reconciler = TableReconciler::new(store.clone(), namespace.clone(), projector.clone());
        let ledger = CustomerLedger::new(
            store.clone(),
            namespace.clone(),
            clock.clone(),
            config.favorite_items_cap,
        );
        let notifications = NotificationDispatcher::new(store.clone(), namespace.clone(), clock.clone());
        let effects = SideEffects::new(projector, reconciler.clone(), ledger.clone());
        let orders = OrdersManager::new(
            store.clone(),
            namespace.clone(),
            effects.clone(),
            notifications.clone(),
            clock.clone(),
        );

        tracing::info!(namespace = %namespace, timezone = %tz, "Order engine initialized");

        Ok(Self {
            namespace,
            store,
            clock,
            tz,
            orders,
            effects,
            reconciler,
            ledger,
            notifications,
            outbox_scan_interval: config.outbox_scan_interval(),
            outbox_max_retries: config.outbox_max_retries,
            reconcile_interval: config.reconcile_interval(),
        })
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    // ========== Orders ==========

    pub async fn create_order(&self, input: OrderInput) -> OrderResult<Order> {
        self.orders.create_order(input).await
    }

    pub async fn update_order_status(&self, order_id: &str, status: OrderStatus) -> OrderResult<Order> {
        self.orders.update_order_status(order_id, status).await
    }

    pub async fn get_order(&self, order_id: &str) -> OrderResult<Option<Order>> {
        self.orders.get_order(order_id).await
    }

    pub async fn active_orders(&self) -> OrderResult<Vec<Order>> {
        self.orders.active_orders().await
    }

    // ========== Subscriptions ==========

    pub fn subscribe_to_orders(&self) -> OrderResult<Subscription<Order>> {
        Ok(OrderRepository::new(self.store.clone(), self.namespace.clone()).subscribe()?)
    }

    pub fn subscribe_to_tables(&self) -> OrderResult<Subscription<DiningTable>> {
        Ok(TableRepository::new(self.store.clone(), self.namespace.clone()).subscribe()?)
    }

    pub fn subscribe_to_customers(&self) -> OrderResult<Subscription<Customer>> {
        Ok(CustomerRepository::new(self.store.clone(), self.namespace.clone()).subscribe()?)
    }

    pub fn subscribe_to_notifications(&self) -> OrderResult<Subscription<Notification>> {
        Ok(NotificationRepository::new(self.store.clone(), self.namespace.clone()).subscribe()?)
    }

    /// Orders created after this call
    pub fn watch_new_orders(&self) -> OrderResult<NewOrderWatcher> {
        Ok(NewOrderWatcher::new(self.subscribe_to_orders()?))
    }

    // ========== Tables ==========

    pub async fn sync_table_statuses_with_orders(&self) -> OrderResult<ReconcileReport> {
        self.reconciler.sync_table_statuses_with_orders().await
    }

    // ========== Customers ==========

    pub async fn find_customer(&self, phone: &str) -> OrderResult<Option<Customer>> {
        self.ledger.find_by_phone(phone).await
    }

    // ========== Notifications ==========

    pub async fn mark_notification_read(&self, notification_id: &str) -> OrderResult<()> {
        self.notifications.mark_read(notification_id).await
    }

    pub async fn unread_notifications(&self) -> OrderResult<Vec<Notification>> {
        self.notifications.unread().await
    }

    pub async fn mark_all_notifications_read(&self) -> OrderResult<usize> {
        self.notifications.mark_all_read().await
    }

    // ========== Analytics ==========

    pub fn analytics_context(&self) -> AnalyticsContext {
        AnalyticsContext {
            now_millis: self.clock.now_millis(),
            tz: self.tz,
        }
    }

    /// Analytics over the current order set
    pub async fn compute_analytics(
        &self,
        menu_items: &[MenuItem],
        query: &AnalyticsQuery,
    ) -> OrderResult<AnalyticsReport> {
        let orders = OrderRepository::new(self.store.clone(), self.namespace.clone())
            .find_all()
            .await?;
        Ok(analytics::compute_analytics(
            &orders,
            menu_items,
            query,
            &self.analytics_context(),
        ))
    }

    // ========== Background tasks ==========

    pub fn outbox_worker(&self, shutdown: CancellationToken) -> OutboxWorker {
        OutboxWorker::new(
            self.store.clone(),
            self.namespace.clone(),
            self.effects.clone(),
            self.clock.clone(),
            self.outbox_scan_interval,
            self.outbox_max_retries,
            shutdown,
        )
    }

    pub fn reconcile_scheduler(&self, shutdown: CancellationToken) -> ReconcileScheduler {
        ReconcileScheduler::new(self.reconciler.clone(), self.reconcile_interval, shutdown)
    }

    pub fn start_background_tasks(&self, tasks: &mut BackgroundTasks) {
        let worker = self.outbox_worker(tasks.shutdown_token());
        tasks.spawn("outbox_worker", TaskKind::Worker, worker.run());

        let scheduler = self.reconcile_scheduler(tasks.shutdown_token());
        tasks.spawn("reconcile_scheduler", TaskKind::Periodic, scheduler.run());

        tasks.log_summary();
    }
}
