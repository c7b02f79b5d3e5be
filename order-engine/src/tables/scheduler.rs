//! 桌台对账调度器
//!
//! 启动时执行一次全量对账，之后每 `RECONCILE_INTERVAL_SECS` 秒触发。

use super::reconcile::TableReconciler;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// 注册为 `TaskKind::Periodic`
pub struct ReconcileScheduler {
    reconciler: TableReconciler,
    interval: Duration,
    shutdown: CancellationToken,
}

impl ReconcileScheduler {
    pub fn new(reconciler: TableReconciler, interval: Duration, shutdown: CancellationToken) -> Self {
        Self {
            reconciler,
            interval,
            shutdown,
        }
    }

    /// 主循环：启动对账 → 周期触发
    pub async fn run(self) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Reconcile scheduler started"
        );

        loop {
            self.run_once().await;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Reconcile scheduler received shutdown signal");
                    break;
                }
            }
        }

        tracing::info!("Reconcile scheduler stopped");
    }

    async fn run_once(&self) {
        match self.reconciler.sync_table_statuses_with_orders().await {
            Ok(report) if report.is_clean() => {
                tracing::debug!(tables = report.tables_scanned, "Table occupancy in sync");
            }
            Ok(report) => {
                tracing::info!(
                    tables = report.tables_scanned,
                    corrected = report.corrected,
                    failed = report.failed,
                    "Table reconciliation finished with corrections"
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "Table reconciliation failed");
            }
        }
    }
}
