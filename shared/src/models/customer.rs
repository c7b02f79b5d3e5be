//! Customer Model

use serde::{Deserialize, Serialize};

/// Customer ledger entry (顾客), keyed by normalized phone
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    /// Digits-only phone, also the document id
    pub phone: String,
    pub name: String,
    /// Orders that reached `served`
    #[serde(default)]
    pub total_orders: u32,
    pub last_visit: i64,
    #[serde(default)]
    pub favorite_items: Vec<String>,
    pub created_at: i64,
}
