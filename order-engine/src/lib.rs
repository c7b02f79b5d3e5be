//! Crab Order Engine - 订单生命周期与派生状态同步
//!
//! # 架构概述
//!
//! - **订单状态机** (`orders`): 状态转换、历史记录、副作用 outbox
//! - **桌台投影** (`tables`): 占用状态投影与定期对账
//! - **顾客账本** (`customers`): 两阶段登记 / 完成计数
//! - **通知** (`notifications`): 新订单、出餐提醒
//! - **统计** (`analytics`): 营收、热销、分类与支付构成
//! - **存储** (`store`): 文档存储抽象 (内存 / redb) 与全量快照订阅
//!
//! # 模块结构
//!
//! ```text
//! order-engine/src/
//! ├── core/           # 配置、后台任务、Engine
//! ├── store/          # DocumentStore、仓储、订阅
//! ├── orders/         # OrdersManager、outbox、重试 worker
//! ├── tables/         # 投影、对账、调度
//! ├── customers/      # 顾客账本
//! ├── notifications/  # 通知分发
//! ├── analytics/      # 统计聚合
//! └── utils/          # 日志、时间、校验、金额
//! ```
//!
//! The order document is the source of truth. Table occupancy and the
//! customer ledger are derived from it by best-effort writes after each
//! transition; the outbox worker retries those and the reconciliation job
//! repairs whatever drift is left.

pub mod analytics;
pub mod core;
pub mod customers;
pub mod error;
pub mod notifications;
pub mod orders;
pub mod store;
pub mod tables;
pub mod utils;

// Re-export 公共类型
pub use analytics::{AnalyticsContext, AnalyticsQuery, AnalyticsReport, DateRange};
pub use crate::core::{BackgroundTasks, Config, Engine, TaskKind};
pub use error::{OrderError, OrderResult, Resource, SideEffectError};
pub use store::{DocumentStore, MemoryStore, Namespace, RedbStore, StoreError};
pub use tables::ReconcileReport;

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// Create the work and log directories, then start logging
pub fn setup_environment(config: &Config) -> std::io::Result<()> {
    std::fs::create_dir_all(&config.work_dir)?;
    std::fs::create_dir_all(config.log_dir())?;
    let log_dir = config.log_dir();
    init_logger_with_file(Some(&config.log_level), log_dir.to_str());
    Ok(())
}
