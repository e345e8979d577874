//! Demotes `PENDING` records that outlived the expiry window.
//!
//! Runs at the start of every history read and, when configured, on a
//! background interval as well.

use crate::models::{Transaction, TransactionStatus};
use crate::services::clock::Clock;
use crate::services::error::PaymentError;
use crate::services::metrics;
use crate::services::reconciler::{reconcile, StatusEvent};
use crate::services::store::{StoreError, TransactionStore};
use chrono::Duration;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Pending records examined.
    pub scanned: usize,
    pub expired: usize,
    /// Records another writer settled first.
    pub conflicts: usize,
    pub errors: usize,
}

#[derive(Clone)]
pub struct ExpirySweeper {
    store: Arc<dyn TransactionStore>,
    clock: Arc<dyn Clock>,
    expiry_window: Duration,
}

impl ExpirySweeper {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        clock: Arc<dyn Clock>,
        expiry_window: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            expiry_window,
        }
    }

    pub async fn sweep(&self) -> Result<SweepReport, PaymentError> {
        let mut report = SweepReport::default();
        let pending = self.store.list_by_status(TransactionStatus::Pending).await?;

        for tx in pending {
            report.scanned += 1;
            match self.expire_if_stale(&tx).await {
                Ok(Some(_)) => report.expired += 1,
                Ok(None) => {}
                Err(StoreError::Conflict { actual, .. }) => {
                    report.conflicts += 1;
                    tracing::debug!(
                        order_code = tx.order_code,
                        actual = %actual,
                        "Record settled by another writer during sweep"
                    );
                }
                Err(e) => {
                    report.errors += 1;
                    tracing::error!(
                        order_code = tx.order_code,
                        error = %e,
                        "Failed to expire transaction"
                    );
                }
            }
        }

        if report.expired > 0 || report.errors > 0 {
            tracing::info!(
                scanned = report.scanned,
                expired = report.expired,
                conflicts = report.conflicts,
                errors = report.errors,
                "Expiry sweep finished"
            );
        }

        Ok(report)
    }

    /// Read-time check for a single record. Returns the record as it now stands.
    pub async fn refresh(&self, tx: Transaction) -> Result<Transaction, PaymentError> {
        match self.expire_if_stale(&tx).await {
            Ok(Some(updated)) => Ok(updated),
            Ok(None) => Ok(tx),
            Err(StoreError::Conflict { .. }) => Ok(self.store.get(tx.order_code).await?),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns the updated record when the expiry was written.
    async fn expire_if_stale(&self, tx: &Transaction) -> Result<Option<Transaction>, StoreError> {
        let now = self.clock.now();
        let event = StatusEvent::expiry();
        if !reconcile(tx, &event, now, self.expiry_window).applied {
            return Ok(None);
        }

        let updated = self
            .store
            .compare_and_update(tx.order_code, tx.status_code, event.to_update(now))
            .await?;

        metrics::record_expired();
        metrics::record_reconciliation(event.source, "applied");
        tracing::info!(
            order_code = updated.order_code,
            created_at = %updated.created_at,
            "Transaction expired"
        );
        Ok(Some(updated))
    }

    /// Run [`sweep`](Self::sweep) every `period` until the task is aborted.
    pub fn spawn_interval(self, period: std::time::Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = self.sweep().await {
                    tracing::error!(error = %e, "Background expiry sweep failed");
                }
            }
        })
    }
}
