//! Customer ledger

pub mod ledger;

pub use ledger::{CustomerLedger, merge_favorites};
