use super::*;
use crate::customers::CustomerLedger;
use crate::orders::outbox::SideEffect;
use crate::orders::outbox_worker::OutboxWorker;
use crate::store::testing::FailingStore;
use crate::store::{Collection, CustomerRepository, NotificationRepository, TableRepository};
use crate::tables::{TableProjector, TableReconciler};
use crate::utils::ManualClock;
use shared::models::{Customer, DiningTable, Notification, NotificationType, OrderItem};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const START: i64 = 1_760_000_000_000;

struct Harness {
    store: Arc<FailingStore>,
    clock: Arc<ManualClock>,
    manager: OrdersManager,
    effects: SideEffects,
    outbox: Outbox,
    tables: TableRepository,
    customers: CustomerRepository,
    notifications: NotificationRepository,
    namespace: Namespace,
}

impl Harness {
    async fn new(table_numbers: &[u32]) -> Self {
        let store = Arc::new(FailingStore::new());
        let clock = Arc::new(ManualClock::new(START));
        let namespace = Namespace::new("spice");
        let dyn_store: Arc<dyn DocumentStore> = store.clone();
        let dyn_clock: Arc<dyn Clock> = clock.clone();

        let tables = TableRepository::new(dyn_store.clone(), namespace.clone());
        for &n in table_numbers {
            tables
                .put(&DiningTable {
                    id: format!("table-{n}"),
                    table_number: n,
                    capacity: 4,
                    occupied: false,
                    current_order_id: None,
                    updated_at: 0,
                })
                .await
                .unwrap();
        }

        let projector = TableProjector::new(dyn_store.clone(), namespace.clone(), dyn_clock.clone());
        let reconciler = TableReconciler::new(dyn_store.clone(), namespace.clone(), projector.clone());
        let ledger = CustomerLedger::new(dyn_store.clone(), namespace.clone(), dyn_clock.clone(), 10);
        let effects = SideEffects::new(projector, reconciler, ledger);
        let notifier = NotificationDispatcher::new(dyn_store.clone(), namespace.clone(), dyn_clock.clone());
        let manager = OrdersManager::new(
            dyn_store.clone(),
            namespace.clone(),
            effects.clone(),
            notifier,
            dyn_clock,
        );
        store.reset_write_counts();

        Self {
            outbox: Outbox::new(dyn_store.clone(), namespace.clone()),
            customers: CustomerRepository::new(dyn_store.clone(), namespace.clone()),
            notifications: NotificationRepository::new(dyn_store, namespace.clone()),
            store,
            clock,
            manager,
            effects,
            tables,
            namespace,
        }
    }

    fn worker(&self, max_retries: u32) -> OutboxWorker {
        OutboxWorker::new(
            self.store.clone(),
            self.namespace.clone(),
            self.effects.clone(),
            self.clock.clone(),
            Duration::from_secs(30),
            max_retries,
            CancellationToken::new(),
        )
    }

    async fn table(&self, table_number: u32) -> DiningTable {
        self.tables
            .find_by_id(&format!("table-{table_number}"))
            .await
            .unwrap()
            .unwrap()
    }

    async fn customer(&self, phone: &str) -> Option<Customer> {
        self.customers
            .find_by_id(&shared::util::normalize_phone(phone))
            .await
            .unwrap()
    }

    async fn notifications(&self) -> Vec<Notification> {
        let mut all = self.notifications.find_all().await.unwrap();
        all.sort_by_key(|n| n.created_at);
        all
    }

    async fn outbox_entries(&self) -> Vec<OutboxEntry> {
        self.outbox.pending().await.unwrap()
    }

    fn advance_secs(&self, secs: i64) {
        self.clock.advance(secs * 1000);
    }
}

fn item(menu_item_id: &str, name: &str, price: f64, quantity: u32) -> OrderItem {
    OrderItem {
        menu_item_id: menu_item_id.to_string(),
        name: name.to_string(),
        price,
        quantity,
        note: None,
    }
}

/// 2× Pizza @ 200 = 400
fn pizza_order(table_number: u32, phone: Option<&str>) -> OrderInput {
    OrderInput {
        table_number,
        customer_name: "Asha".to_string(),
        customer_phone: phone.map(str::to_string),
        items: vec![item("m-pizza", "Pizza", 200.0, 2)],
        total_amount: 400.0,
        notes: String::new(),
        order_source: Default::default(),
        payment_method: None,
    }
}

async fn advance_to(h: &Harness, order_id: &str, path: &[OrderStatus]) -> Order {
    let mut order = None;
    for &status in path {
        h.advance_secs(60);
        order = Some(h.manager.update_order_status(order_id, status).await.unwrap());
    }
    order.expect("path must not be empty")
}

mod test_outbox;
