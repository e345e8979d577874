use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a payment link. Every state other than `Pending` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Success,
    Canceled,
    Expired,
    Failed,
}

impl TransactionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Success => "SUCCESS",
            TransactionStatus::Canceled => "CANCELED",
            TransactionStatus::Expired => "EXPIRED",
            TransactionStatus::Failed => "FAILED",
        }
    }

    /// Human-readable label shown next to the status code.
    pub fn label(self) -> &'static str {
        match self {
            TransactionStatus::Pending => "Awaiting payment",
            TransactionStatus::Success => "Payment successful",
            TransactionStatus::Canceled => "Canceled",
            TransactionStatus::Expired => "Expired",
            TransactionStatus::Failed => "Payment failed",
        }
    }

    /// Map a status string reported by the provider or a callback.
    ///
    /// Unrecognized strings become `Failed`; the original text is returned
    /// alongside so it can be kept on the record.
    pub fn from_reported(raw: &str) -> (Self, Option<String>) {
        let normalized = raw.trim().to_ascii_uppercase();
        let status = match normalized.as_str() {
            "SUCCESS" | "PAID" => TransactionStatus::Success,
            "CANCELED" | "CANCELLED" => TransactionStatus::Canceled,
            "FAILED" => TransactionStatus::Failed,
            "EXPIRED" => TransactionStatus::Expired,
            "PENDING" | "PROCESSING" => TransactionStatus::Pending,
            _ => return (TransactionStatus::Failed, Some(raw.to_string())),
        };
        (status, None)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which signal drove a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventSource {
    Webhook,
    SuccessRedirect,
    CancelRedirect,
    Sweeper,
}

impl EventSource {
    /// Lower-case name used in logs and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            EventSource::Webhook => "webhook",
            EventSource::SuccessRedirect => "success_redirect",
            EventSource::CancelRedirect => "cancel_redirect",
            EventSource::Sweeper => "sweeper",
        }
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub order_code: i64,
    pub payment_link_id: String,
    /// Minor currency units.
    pub amount: i64,
    pub currency: String,
    pub description: String,
    pub checkout_url: String,
    pub status_code: TransactionStatus,
    pub status_detail: Option<String>,
    pub settled_by: Option<EventSource>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// A freshly created link awaiting payment.
    pub fn pending(
        order_code: i64,
        payment_link_id: String,
        amount: i64,
        currency: String,
        description: String,
        checkout_url: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            order_code,
            payment_link_id,
            amount,
            currency,
            description,
            checkout_url,
            status_code: TransactionStatus::Pending,
            status_detail: None,
            settled_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The record after `update` is applied. Identity, amount and creation
    /// time are carried over untouched.
    pub fn with_update(&self, update: &StatusUpdate) -> Self {
        Self {
            status_code: update.status_code,
            status_detail: update.status_detail.clone(),
            settled_by: Some(update.settled_by),
            updated_at: update.updated_at.max(self.created_at),
            ..self.clone()
        }
    }
}

/// Fields written by a compare-and-update.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status_code: TransactionStatus,
    pub status_detail: Option<String>,
    pub settled_by: EventSource,
    pub updated_at: DateTime<Utc>,
}
