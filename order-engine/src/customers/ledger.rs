//! Customer loyalty ledger
//!
//! Two phases per order: `register` when the order is placed (customer
//! becomes searchable, counters untouched) and `complete` when it is served
//! (`totalOrders += 1`).

use crate::error::{OrderError, OrderResult};
use crate::store::repository::fields;
use crate::store::{CustomerRepository, DocumentStore, Namespace};
use crate::utils::Clock;
use serde_json::json;
use shared::models::Customer;
use shared::util::normalize_phone;
use std::sync::Arc;

/// Merge `names` into `existing`: keep existing first, drop duplicates, cap the length.
pub fn merge_favorites(existing: &[String], names: &[String], cap: usize) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(cap.min(existing.len() + names.len()));
    for name in existing.iter().chain(names) {
        if merged.len() >= cap {
            break;
        }
        if !merged.contains(name) {
            merged.push(name.clone());
        }
    }
    merged
}

#[derive(Clone)]
pub struct CustomerLedger {
    customers: CustomerRepository,
    clock: Arc<dyn Clock>,
    favorites_cap: usize,
}

impl CustomerLedger {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        namespace: Namespace,
        clock: Arc<dyn Clock>,
        favorites_cap: usize,
    ) -> Self {
        Self {
            customers: CustomerRepository::new(store, namespace),
            clock,
            favorites_cap,
        }
    }

    fn ledger_key(phone: &str) -> OrderResult<String> {
        let key = normalize_phone(phone);
        if key.is_empty() {
            return Err(OrderError::validation(format!(
                "Phone number has no digits: {phone:?}"
            )));
        }
        Ok(key)
    }

    pub async fn find_by_phone(&self, phone: &str) -> OrderResult<Option<Customer>> {
        let key = normalize_phone(phone);
        if key.is_empty() {
            return Ok(None);
        }
        Ok(self.customers.find_by_id(&key).await?)
    }

    /// Phase one: create or refresh the entry. Never touches `totalOrders`.
    pub async fn register(
        &self,
        name: &str,
        phone: &str,
        last_visit: i64,
        item_names: &[String],
    ) -> OrderResult<Customer> {
        let key = Self::ledger_key(phone)?;
        match self.customers.find_by_id(&key).await? {
            Some(mut customer) => {
                customer.name = name.to_string();
                customer.last_visit = last_visit;
                customer.favorite_items =
                    merge_favorites(&customer.favorite_items, item_names, self.favorites_cap);
                self.customers
                    .update_fields(
                        &key,
                        fields([
                            ("name", json!(customer.name)),
                            ("lastVisit", json!(customer.last_visit)),
                            ("favoriteItems", json!(customer.favorite_items)),
                        ]),
                    )
                    .await?;
                Ok(customer)
            }
            None => {
                let customer = Customer {
                    phone: key,
                    name: name.to_string(),
                    total_orders: 0,
                    last_visit,
                    favorite_items: merge_favorites(&[], item_names, self.favorites_cap),
                    created_at: self.clock.now_millis(),
                };
                self.customers.put(&customer).await?;
                tracing::info!(phone = %customer.phone, "Customer registered");
                Ok(customer)
            }
        }
    }

    /// Phase two: count a served order
    pub async fn complete(
        &self,
        name: &str,
        phone: &str,
        item_names: &[String],
    ) -> OrderResult<Customer> {
        let key = Self::ledger_key(phone)?;
        match self.customers.find_by_id(&key).await? {
            Some(mut customer) => {
                customer.name = name.to_string();
                customer.total_orders = customer.total_orders.saturating_add(1);
                customer.favorite_items =
                    merge_favorites(&customer.favorite_items, item_names, self.favorites_cap);
                self.customers
                    .update_fields(
                        &key,
                        fields([
                            ("name", json!(customer.name)),
                            ("totalOrders", json!(customer.total_orders)),
                            ("favoriteItems", json!(customer.favorite_items)),
                        ]),
                    )
                    .await?;
                Ok(customer)
            }
            None => {
                // register 失败过：直接建档并计入本单
                tracing::warn!(phone = %key, "Completing order for unregistered customer");
                let now = self.clock.now_millis();
                let customer = Customer {
                    phone: key,
                    name: name.to_string(),
                    total_orders: 1,
                    last_visit: now,
                    favorite_items: merge_favorites(&[], item_names, self.favorites_cap),
                    created_at: now,
                };
                self.customers.put(&customer).await?;
                Ok(customer)
            }
        }
    }
}
