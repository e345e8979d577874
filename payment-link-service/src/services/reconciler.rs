//! Decides whether an incoming status may overwrite the stored one.
//!
//! Only `PENDING` records move. The first writer to settle a record wins and
//! every later event for it becomes a no-op.

use crate::models::{EventSource, StatusUpdate, Transaction, TransactionStatus};
use chrono::{DateTime, Duration, Utc};

/// A status signal from the webhook, a redirect or the sweeper.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusEvent {
    pub status: TransactionStatus,
    pub detail: Option<String>,
    pub source: EventSource,
}

impl StatusEvent {
    /// Event carrying a status string as reported by the provider or browser.
    pub fn reported(raw: &str, source: EventSource) -> Self {
        let (status, detail) = TransactionStatus::from_reported(raw);
        Self {
            status,
            detail,
            source,
        }
    }

    pub fn new(status: TransactionStatus, source: EventSource) -> Self {
        Self {
            status,
            detail: None,
            source,
        }
    }

    /// Synthetic expiry raised by the sweeper.
    pub fn expiry() -> Self {
        Self::new(TransactionStatus::Expired, EventSource::Sweeper)
    }

    pub fn to_update(&self, now: DateTime<Utc>) -> StatusUpdate {
        StatusUpdate {
            status_code: self.status,
            status_detail: self.detail.clone(),
            settled_by: self.source,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciliation {
    /// Status the record should hold afterwards.
    pub status: TransactionStatus,
    pub applied: bool,
}

impl Reconciliation {
    fn keep(current: TransactionStatus) -> Self {
        Self {
            status: current,
            applied: false,
        }
    }

    fn apply(next: TransactionStatus) -> Self {
        Self {
            status: next,
            applied: true,
        }
    }
}

/// Whether a record created at `created_at` has outlived `window` at `now`.
pub fn is_stale(created_at: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    now - created_at > window
}

pub fn reconcile(
    current: &Transaction,
    event: &StatusEvent,
    now: DateTime<Utc>,
    expiry_window: Duration,
) -> Reconciliation {
    if current.status_code.is_terminal() {
        return Reconciliation::keep(current.status_code);
    }

    match event.status {
        TransactionStatus::Pending => Reconciliation::keep(current.status_code),
        TransactionStatus::Success | TransactionStatus::Canceled | TransactionStatus::Failed => {
            Reconciliation::apply(event.status)
        }
        // The provider's own expiry is authoritative; ours needs the clock.
        TransactionStatus::Expired if event.source != EventSource::Sweeper => {
            Reconciliation::apply(TransactionStatus::Expired)
        }
        TransactionStatus::Expired => {
            if is_stale(current.created_at, now, expiry_window) {
                Reconciliation::apply(TransactionStatus::Expired)
            } else {
                Reconciliation::keep(current.status_code)
            }
        }
    }
}
