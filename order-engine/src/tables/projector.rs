//! Table occupancy projection
//!
//! `occupied` / `currentOrderId` are written only through here. Tables are
//! addressed by `tableNumber`, never by storage id.

use crate::error::{OrderError, OrderResult, Resource};
use crate::store::repository::fields;
use crate::store::{DocumentStore, Namespace, TableRepository};
use crate::utils::Clock;
use serde_json::{Value, json};
use shared::models::DiningTable;
use std::sync::Arc;

#[derive(Clone)]
pub struct TableProjector {
    tables: TableRepository,
    clock: Arc<dyn Clock>,
}

impl TableProjector {
    pub fn new(store: Arc<dyn DocumentStore>, namespace: Namespace, clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: TableRepository::new(store, namespace),
            clock,
        }
    }

    pub async fn find_table(&self, table_number: u32) -> OrderResult<Option<DiningTable>> {
        let mut hits = self
            .tables
            .find_where("tableNumber", &json!(table_number))
            .await?;
        if hits.len() > 1 {
            tracing::warn!(
                table_number,
                count = hits.len(),
                "Duplicate table documents for one table number, using the first"
            );
        }
        Ok(if hits.is_empty() {
            None
        } else {
            Some(hits.swap_remove(0))
        })
    }

    async fn require_table(&self, table_number: u32) -> OrderResult<DiningTable> {
        self.find_table(table_number)
            .await?
            .ok_or_else(|| OrderError::not_found(Resource::Table, table_number))
    }

    /// Mark the table as held by `order_id`
    pub async fn occupy(&self, table_number: u32, order_id: &str) -> OrderResult<()> {
        let table = self.require_table(table_number).await?;
        self.apply(&table, Some(order_id)).await?;
        Ok(())
    }

    /// Free the table. Releasing a free table writes nothing.
    pub async fn release(&self, table_number: u32) -> OrderResult<()> {
        let table = self.require_table(table_number).await?;
        self.apply(&table, None).await?;
        Ok(())
    }

    /// Write the projection for `table` if it differs. Returns whether a write happened.
    pub(crate) async fn apply(
        &self,
        table: &DiningTable,
        current_order_id: Option<&str>,
    ) -> OrderResult<bool> {
        let occupied = current_order_id.is_some();
        if table.matches(occupied, current_order_id) {
            return Ok(false);
        }
        let order_value = current_order_id.map_or(Value::Null, |id| json!(id));
        self.tables
            .update_fields(
                &table.id,
                fields([
                    ("occupied", json!(occupied)),
                    ("currentOrderId", order_value),
                    ("updatedAt", json!(self.clock.now_millis())),
                ]),
            )
            .await?;
        tracing::debug!(
            table_number = table.table_number,
            occupied,
            order_id = ?current_order_id,
            "Table projection updated"
        );
        Ok(true)
    }

    /// Current stored state of one table document
    pub(crate) async fn reload(&self, table_id: &str) -> OrderResult<Option<DiningTable>> {
        Ok(self.tables.find_by_id(table_id).await?)
    }

    pub async fn all_tables(&self) -> OrderResult<Vec<DiningTable>> {
        Ok(self.tables.find_all().await?)
    }
}
