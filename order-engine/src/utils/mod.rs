//! 工具函数

pub mod logger;
pub mod money;
pub mod time;
pub mod validation;

pub use time::{Clock, ManualClock, SystemClock};
