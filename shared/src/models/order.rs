//! Order Model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Order status
///
/// `pending → preparing → ready → served`, with `cancelled` reachable from
/// every non-terminal status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Preparing,
    Ready,
    Served,
    Cancelled,
}

impl OrderStatus {
    /// Active orders occupy their table.
    pub const ACTIVE: [OrderStatus; 3] = [Self::Pending, Self::Preparing, Self::Ready];

    pub fn is_active(self) -> bool {
        Self::ACTIVE.contains(&self)
    }

    /// Served and cancelled accept no further transition
    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }

    /// Statuses reachable from `self` in one step
    pub fn allowed_next(self) -> &'static [OrderStatus] {
        match self {
            Self::Pending => &[Self::Preparing, Self::Cancelled],
            Self::Preparing => &[Self::Ready, Self::Cancelled],
            Self::Ready => &[Self::Served, Self::Cancelled],
            Self::Served | Self::Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        !self.is_terminal() && self.allowed_next().contains(&next)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Preparing => "preparing",
            Self::Ready => "ready",
            Self::Served => "served",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the order was placed from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderSource {
    QrCode,
    QuickOrder,
    WalkIn,
    #[default]
    DirectOrder,
}

impl OrderSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::QrCode => "qr_code",
            Self::QuickOrder => "quick_order",
            Self::WalkIn => "walk_in",
            Self::DirectOrder => "direct_order",
        }
    }
}

/// Payment method recorded at billing time
///
/// Unknown values written by older dashboards deserialize as `Other`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    Upi,
    Online,
    #[serde(other)]
    Other,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Card => "card",
            Self::Upi => "upi",
            Self::Online => "online",
            Self::Other => "other",
        }
    }
}

/// Order line item (name and price are snapshots taken at order time)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    /// Menu item reference
    pub menu_item_id: String,
    pub name: String,
    /// Unit price in currency unit
    pub price: f64,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl OrderItem {
    pub fn line_total(&self) -> f64 {
        self.price * self.quantity as f64
    }
}

/// One entry of the append-only status history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusHistoryEntry {
    pub status: OrderStatus,
    /// Unix millis
    pub timestamp: i64,
    /// Millis spent in the previous status (0 for the first entry)
    pub duration: i64,
}

/// Order entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    /// `0` = pickup / no table
    pub table_number: u32,
    pub customer_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_phone: Option<String>,
    pub items: Vec<OrderItem>,
    pub status: OrderStatus,
    pub total_amount: f64,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub order_source: OrderSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub status_history: Vec<StatusHistoryEntry>,
}

impl Order {
    /// Pickup orders never touch a table
    pub fn has_table(&self) -> bool {
        self.table_number != 0
    }

    /// Timestamp the next history entry measures its duration from
    pub fn last_transition_at(&self) -> i64 {
        self.status_history
            .last()
            .map(|entry| entry.timestamp)
            .unwrap_or(self.created_at)
    }

    pub fn item_names(&self) -> Vec<String> {
        self.items.iter().map(|item| item.name.clone()).collect()
    }

    pub fn contains_menu_item(&self, menu_item_id: &str) -> bool {
        self.items.iter().any(|item| item.menu_item_id == menu_item_id)
    }
}

/// Create order payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderInput {
    #[serde(default)]
    pub table_number: u32,
    pub customer_name: String,
    #[serde(default)]
    pub customer_phone: Option<String>,
    pub items: Vec<OrderItem>,
    pub total_amount: f64,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub order_source: OrderSource,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
}
