//! Notification dispatch

pub mod dispatcher;

pub use dispatcher::NotificationDispatcher;
