//! Occupancy reconciliation
//!
//! Recomputes every table's projection from the order set and writes only
//! where the stored value drifted. Running it twice in a row writes nothing
//! the second time.
//!
//! The full pass compares against a snapshot that live transitions can
//! overtake. A table that looks drifted is re-read, together with the orders
//! for its number, before anything is written; the table is always read
//! before its orders so a concurrent `create_order` is never undone.

use super::projector::TableProjector;
use crate::error::{OrderError, OrderResult, Resource};
use crate::store::{DocumentStore, Namespace, OrderRepository};
use serde::Serialize;
use serde_json::json;
use shared::models::{DiningTable, Order};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub tables_scanned: usize,
    pub corrected: usize,
    pub failed: usize,
    /// Table numbers with active orders but no table document
    pub unknown_table_numbers: Vec<u32>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.corrected == 0 && self.failed == 0
    }
}

/// Active order holding each table number.
///
/// Several active orders on one table is not supposed to happen; the most
/// recently created one wins (ties broken by id).
pub fn active_orders_by_table(orders: &[Order]) -> BTreeMap<u32, &Order> {
    let mut truth: BTreeMap<u32, &Order> = BTreeMap::new();
    for order in orders.iter().filter(|o| o.status.is_active() && o.has_table()) {
        match truth.get(&order.table_number) {
            Some(&held) => {
                tracing::warn!(
                    table_number = order.table_number,
                    order_id = %order.id,
                    other_order_id = %held.id,
                    "Multiple active orders for one table"
                );
                if (order.created_at, &order.id) > (held.created_at, &held.id) {
                    truth.insert(order.table_number, order);
                }
            }
            None => {
                truth.insert(order.table_number, order);
            }
        }
    }
    truth
}

#[derive(Clone)]
pub struct TableReconciler {
    orders: OrderRepository,
    projector: TableProjector,
}

impl TableReconciler {
    pub fn new(store: Arc<dyn DocumentStore>, namespace: Namespace, projector: TableProjector) -> Self {
        Self {
            orders: OrderRepository::new(store, namespace),
            projector,
        }
    }

    /// Full pass over all tables. Fails only if the initial loads fail;
    /// per-table write failures are counted in the report.
    pub async fn sync_table_statuses_with_orders(&self) -> OrderResult<ReconcileReport> {
        let orders = self.orders.find_all().await?;
        let tables = self.projector.all_tables().await?;
        let truth = active_orders_by_table(&orders);

        let mut report = ReconcileReport {
            tables_scanned: tables.len(),
            ..Default::default()
        };

        for table in &tables {
            let desired = truth.get(&table.table_number).map(|o| o.id.as_str());
            if table.matches(desired.is_some(), desired) {
                continue;
            }
            match self.recheck(&table.id).await {
                Ok(true) => {
                    report.corrected += 1;
                    tracing::info!(
                        table_number = table.table_number,
                        was_occupied = table.occupied,
                        was_order_id = ?table.current_order_id,
                        "Corrected table occupancy drift"
                    );
                }
                Ok(false) => {
                    tracing::debug!(
                        table_number = table.table_number,
                        "Drift resolved by concurrent activity"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(table_number = table.table_number, error = %e, "Failed to correct table");
                }
            }
        }

        report.unknown_table_numbers = truth
            .keys()
            .copied()
            .filter(|n| !tables.iter().any(|t| t.table_number == *n))
            .collect();
        if !report.unknown_table_numbers.is_empty() {
            tracing::warn!(
                tables = ?report.unknown_table_numbers,
                "Active orders reference tables that do not exist"
            );
        }

        Ok(report)
    }

    /// Re-project a single table from its orders. Returns whether a write happened.
    pub async fn reconcile_table(&self, table_number: u32) -> OrderResult<bool> {
        let table = self
            .projector
            .find_table(table_number)
            .await?
            .ok_or_else(|| OrderError::not_found(Resource::Table, table_number))?;
        self.reproject(&table).await
    }

    /// Fresh read of one table document, then re-projection. A table deleted
    /// in the meantime needs nothing.
    async fn recheck(&self, table_id: &str) -> OrderResult<bool> {
        match self.projector.reload(table_id).await? {
            Some(table) => self.reproject(&table).await,
            None => Ok(false),
        }
    }

    /// `table` must have been read before this call loads its orders
    async fn reproject(&self, table: &DiningTable) -> OrderResult<bool> {
        let orders = self
            .orders
            .find_where("tableNumber", &json!(table.table_number))
            .await?;
        let truth = active_orders_by_table(&orders);
        let desired = truth.get(&table.table_number).map(|o| o.id.as_str());
        self.projector.apply(table, desired).await
    }
}
