//! Dining Table Model

use serde::{Deserialize, Serialize};

/// Dining table entity (桌台)
///
/// `occupied` and `current_order_id` are a projection of the active orders
/// for `table_number`; nothing outside the projector writes them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiningTable {
    /// Storage id (not the table number)
    pub id: String,
    pub table_number: u32,
    pub capacity: u32,
    #[serde(default)]
    pub occupied: bool,
    #[serde(default)]
    pub current_order_id: Option<String>,
    #[serde(default)]
    pub updated_at: i64,
}

impl DiningTable {
    /// Whether the stored projection equals the given truth
    pub fn matches(&self, occupied: bool, current_order_id: Option<&str>) -> bool {
        self.occupied == occupied && self.current_order_id.as_deref() == current_order_id
    }
}
