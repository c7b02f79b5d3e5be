//! Order lifecycle: state machine, side-effect outbox, retry worker

pub mod effects;
pub mod manager;
pub mod outbox;
pub mod outbox_worker;

pub use effects::{RunMode, SideEffects};
pub use manager::{OrdersManager, validate_order_input};
pub use outbox::{Outbox, OutboxEntry, SideEffect};
pub use outbox_worker::{OutboxScan, OutboxWorker};
