//! Shared types for the restaurant order engine
//!
//! Domain models persisted in the document store, the unified error codes
//! surfaced to dashboard collaborators, and small utilities used across
//! crates.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use error::{AppError, AppResult, ErrorCategory, ErrorCode};
pub use serde::{Deserialize, Serialize};
