//! Data models
//!
//! Documents persisted per restaurant namespace. Field names serialize in
//! camelCase to match the dashboard's document layout; timestamps are Unix
//! millis.

pub mod customer;
pub mod dining_table;
pub mod menu_item;
pub mod notification;
pub mod order;

// Re-exports
pub use customer::*;
pub use dining_table::*;
pub use menu_item::*;
pub use notification::*;
pub use order::*;
