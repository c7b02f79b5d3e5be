//! Side-effect execution
//!
//! Inline runs apply the transition's write directly. Retries of table
//! effects re-project the table from the order set instead, since the
//! order may have moved on since the effect was recorded.

use super::outbox::{EffectOutcome, SideEffect};
use crate::customers::CustomerLedger;
use crate::error::{OrderResult, SideEffectError};
use crate::tables::{TableProjector, TableReconciler};
use shared::models::Order;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Inline,
    Retry,
}

#[derive(Clone)]
pub struct SideEffects {
    projector: TableProjector,
    reconciler: TableReconciler,
    ledger: CustomerLedger,
}

impl SideEffects {
    pub fn new(projector: TableProjector, reconciler: TableReconciler, ledger: CustomerLedger) -> Self {
        Self {
            projector,
            reconciler,
            ledger,
        }
    }

    /// Run `effects` in order; every one is attempted even if an earlier one fails.
    pub async fn run_all(&self, order: &Order, effects: &[SideEffect], mode: RunMode) -> EffectOutcome {
        let mut outcome = EffectOutcome::default();
        for &effect in effects {
            if let Err(e) = self.run(order, effect, mode).await {
                tracing::warn!(
                    order_id = %order.id,
                    table_number = order.table_number,
                    effect = effect.as_str(),
                    mode = ?mode,
                    error = %e.source,
                    "Side effect failed"
                );
                outcome.remaining.push(effect);
                outcome.last_error = Some(e.to_string());
            }
        }
        outcome
    }

    pub async fn run(&self, order: &Order, effect: SideEffect, mode: RunMode) -> Result<(), SideEffectError> {
        match self.execute(order, effect, mode).await {
            Ok(()) => Ok(()),
            // 桌台不存在：没有可投影的对象，视为完成
            Err(e) if effect.is_table() && e.is_not_found() => {
                tracing::warn!(
                    order_id = %order.id,
                    table_number = order.table_number,
                    effect = effect.as_str(),
                    "Table not found, nothing to project"
                );
                Ok(())
            }
            Err(e) => Err(SideEffectError::new(effect.as_str(), &order.id, e)),
        }
    }

    async fn execute(&self, order: &Order, effect: SideEffect, mode: RunMode) -> OrderResult<()> {
        let phone = order.customer_phone.as_deref().unwrap_or_default();
        match (effect, mode) {
            (SideEffect::OccupyTable | SideEffect::ReleaseTable, RunMode::Retry) => {
                self.reconciler.reconcile_table(order.table_number).await?;
            }
            (SideEffect::OccupyTable, RunMode::Inline) => {
                self.projector.occupy(order.table_number, &order.id).await?;
            }
            (SideEffect::ReleaseTable, RunMode::Inline) => {
                self.projector.release(order.table_number).await?;
            }
            (SideEffect::RegisterCustomer, _) => {
                self.ledger
                    .register(&order.customer_name, phone, order.created_at, &order.item_names())
                    .await?;
            }
            (SideEffect::CompleteCustomer, _) => {
                self.ledger
                    .complete(&order.customer_name, phone, &order.item_names())
                    .await?;
            }
        }
        Ok(())
    }
}
