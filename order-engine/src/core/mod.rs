//! Core: configuration, background tasks, engine wiring

pub mod config;
pub mod engine;
pub mod tasks;

pub use config::Config;
pub use engine::Engine;
pub use tasks::{BackgroundTasks, TaskKind};
