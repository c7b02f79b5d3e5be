//! Table occupancy: projector, reconciliation, scheduling

pub mod projector;
pub mod reconcile;
pub mod scheduler;

pub use projector::TableProjector;
pub use reconcile::{ReconcileReport, TableReconciler, active_orders_by_table};
pub use scheduler::ReconcileScheduler;
