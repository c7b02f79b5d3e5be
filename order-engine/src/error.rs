//! Engine errors
//!
//! `StoreError` → `OrderError` → `AppError`. Only `OrderError` is returned
//! from engine operations; `SideEffectError` is logged and dropped.

use crate::store::StoreError;
use shared::error::{AppError, ErrorCode};
use shared::models::OrderStatus;
use std::fmt;
use thiserror::Error;

/// Entity kinds that can be looked up and missing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Order,
    Table,
    Customer,
    Notification,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Resource::Order => "Order",
            Resource::Table => "Table",
            Resource::Customer => "Customer",
            Resource::Notification => "Notification",
        })
    }
}

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("{0} not found: {1}")]
    NotFound(Resource, String),

    /// Rejected input; carries the collaborator-facing code
    #[error("Validation error: {0}")]
    Validation(AppError),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl OrderError {
    pub fn not_found(resource: Resource, id: impl fmt::Display) -> Self {
        OrderError::NotFound(resource, id.to_string())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        OrderError::Validation(AppError::validation(msg))
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            OrderError::NotFound(..) => true,
            OrderError::Store(e) => e.is_not_found(),
            _ => false,
        }
    }
}

impl From<AppError> for OrderError {
    fn from(err: AppError) -> Self {
        OrderError::Validation(err)
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NotFound(resource, id) => {
                let code = match resource {
                    Resource::Order => ErrorCode::OrderNotFound,
                    Resource::Table => ErrorCode::TableNotFound,
                    Resource::Customer => ErrorCode::CustomerNotFound,
                    Resource::Notification => ErrorCode::NotificationNotFound,
                };
                AppError::with_message(code, format!("{resource} not found: {id}"))
                    .with_detail("id", id)
            }
            OrderError::Validation(err) => err,
            OrderError::InvalidTransition { from, to } => {
                let code = match from {
                    OrderStatus::Served => ErrorCode::OrderAlreadyServed,
                    OrderStatus::Cancelled => ErrorCode::OrderAlreadyCancelled,
                    _ => ErrorCode::InvalidStatusTransition,
                };
                AppError::with_message(code, format!("Cannot move order from {from} to {to}"))
                    .with_detail("from", from.as_str())
                    .with_detail("to", to.as_str())
            }
            OrderError::Store(e) => {
                let code = classify_store_error(&e);
                tracing::error!(error = %e, error_code = %code, "Storage error occurred");
                AppError::with_message(code, e.to_string())
            }
        }
    }
}

fn classify_store_error(e: &StoreError) -> ErrorCode {
    match e {
        StoreError::NotFound { .. } => return ErrorCode::NotFound,
        StoreError::Serialization(_) | StoreError::InvalidDocument { .. } => {
            return ErrorCode::InternalError;
        }
        StoreError::Unavailable(_) => return ErrorCode::SystemBusy,
        _ => {}
    }

    // redb 错误通过字符串匹配分类
    let err_str = e.to_string().to_lowercase();
    if err_str.contains("no space") || err_str.contains("disk full") || err_str.contains("enospc") {
        return ErrorCode::StorageFull;
    }
    if err_str.contains("corrupt") || err_str.contains("invalid database") {
        return ErrorCode::StorageCorrupted;
    }
    if err_str.contains("timeout") || err_str.contains("timed out") {
        return ErrorCode::TimeoutError;
    }
    ErrorCode::DatabaseError
}

pub type OrderResult<T> = Result<T, OrderError>;

/// A best-effort write that failed after the order itself was persisted
#[derive(Debug, Error)]
#[error("{effect} failed for order {order_id}: {source}")]
pub struct SideEffectError {
    pub effect: &'static str,
    pub order_id: String,
    #[source]
    pub source: OrderError,
}

impl SideEffectError {
    pub fn new(effect: &'static str, order_id: impl Into<String>, source: OrderError) -> Self {
        Self {
            effect,
            order_id: order_id.into(),
            source,
        }
    }
}
