//! Turns webhook and redirect deliveries into guarded status transitions.

use crate::models::{EventSource, Transaction, TransactionStatus};
use crate::services::clock::Clock;
use crate::services::error::PaymentError;
use crate::services::metrics;
use crate::services::reconciler::{reconcile, StatusEvent};
use crate::services::store::{StoreError, TransactionStore};
use chrono::Duration;
use std::sync::Arc;

/// One retry after a lost compare-and-update.
const MAX_CAS_ATTEMPTS: usize = 2;

/// Key the external event carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Correlation {
    OrderCode(i64),
    PaymentLinkId(String),
}

impl std::fmt::Display for Correlation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Correlation::OrderCode(code) => write!(f, "orderCode {}", code),
            Correlation::PaymentLinkId(id) => write!(f, "paymentLinkId {}", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IngressOutcome {
    Applied(Transaction),
    NoOp(Transaction),
    NotFound,
    /// Lost the compare-and-update twice in a row.
    Contended,
}

impl IngressOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngressOutcome::Applied(_) => "applied",
            IngressOutcome::NoOp(_) => "noop",
            IngressOutcome::NotFound => "not_found",
            IngressOutcome::Contended => "contended",
        }
    }

    pub fn transaction(&self) -> Option<&Transaction> {
        match self {
            IngressOutcome::Applied(tx) | IngressOutcome::NoOp(tx) => Some(tx),
            IngressOutcome::NotFound | IngressOutcome::Contended => None,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, IngressOutcome::Applied(_))
    }
}

#[derive(Clone)]
pub struct EventIngress {
    store: Arc<dyn TransactionStore>,
    clock: Arc<dyn Clock>,
    expiry_window: Duration,
}

impl EventIngress {
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

    /// Provider notification keyed by payment link id.
    pub async fn webhook(
        &self,
        payment_link_id: &str,
        status: &str,
    ) -> Result<IngressOutcome, PaymentError> {
        self.handle(
            Correlation::PaymentLinkId(payment_link_id.to_string()),
            StatusEvent::reported(status, EventSource::Webhook),
        )
        .await
    }

    pub async fn success_redirect(&self, order_code: i64) -> Result<IngressOutcome, PaymentError> {
        self.handle(
            Correlation::OrderCode(order_code),
            StatusEvent::new(TransactionStatus::Success, EventSource::SuccessRedirect),
        )
        .await
    }

    pub async fn cancel_redirect(&self, order_code: i64) -> Result<IngressOutcome, PaymentError> {
        self.handle(
            Correlation::OrderCode(order_code),
            StatusEvent::new(TransactionStatus::Canceled, EventSource::CancelRedirect),
        )
        .await
    }

    pub async fn handle(
        &self,
        correlation: Correlation,
        event: StatusEvent,
    ) -> Result<IngressOutcome, PaymentError> {
        let outcome = self.settle(&correlation, &event).await?;
        metrics::record_reconciliation(event.source, outcome.as_str());

        match &outcome {
            IngressOutcome::Applied(tx) => tracing::info!(
                order_code = tx.order_code,
                status = %tx.status_code,
                source = %event.source,
                "Transaction settled"
            ),
            IngressOutcome::NoOp(tx) => tracing::info!(
                order_code = tx.order_code,
                current = %tx.status_code,
                incoming = %event.status,
                source = %event.source,
                "Status event ignored"
            ),
            IngressOutcome::NotFound => tracing::warn!(
                correlation = %correlation,
                source = %event.source,
                "Status event for unknown transaction"
            ),
            IngressOutcome::Contended => tracing::warn!(
                correlation = %correlation,
                source = %event.source,
                "Status event gave up after repeated conflicts"
            ),
        }

        Ok(outcome)
    }

    async fn lookup(&self, correlation: &Correlation) -> Result<Transaction, StoreError> {
        match correlation {
            Correlation::OrderCode(code) => self.store.get(*code).await,
            Correlation::PaymentLinkId(id) => self.store.get_by_payment_link_id(id).await,
        }
    }

    async fn settle(
        &self,
        correlation: &Correlation,
        event: &StatusEvent,
    ) -> Result<IngressOutcome, PaymentError> {
        let mut current = match self.lookup(correlation).await {
            Ok(tx) => tx,
            Err(StoreError::NotFound) => return Ok(IngressOutcome::NotFound),
            Err(e) => return Err(e.into()),
        };

        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let now = self.clock.now();
            let decision = reconcile(&current, event, now, self.expiry_window);
            if !decision.applied {
                return Ok(IngressOutcome::NoOp(current));
            }

            match self
                .store
                .compare_and_update(current.order_code, current.status_code, event.to_update(now))
                .await
            {
                Ok(updated) => return Ok(IngressOutcome::Applied(updated)),
                Err(StoreError::Conflict { actual, .. }) => {
                    tracing::debug!(
                        order_code = current.order_code,
                        actual = %actual,
                        attempt,
                        "Compare-and-update lost, re-reading"
                    );
                    current = match self.store.get(current.order_code).await {
                        Ok(tx) => tx,
                        Err(StoreError::NotFound) => return Ok(IngressOutcome::NotFound),
                        Err(e) => return Err(e.into()),
                    };
                }
                Err(StoreError::NotFound) => return Ok(IngressOutcome::NotFound),
                Err(e) => return Err(e.into()),
            }
        }

        Ok(IngressOutcome::Contended)
    }
}
