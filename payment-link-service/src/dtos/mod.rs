use crate::models::{Transaction, TransactionStatus};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// `amount` stays untyped so every malformed value is reported as an invalid amount.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaymentRequest {
    #[serde(default)]
    pub amount: Option<serde_json::Value>,
    #[validate(length(max = 255))]
    pub description: Option<String>,
}

/// A transaction as returned by read endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub status_label: &'static str,
}

impl From<Transaction> for TransactionView {
    fn from(transaction: Transaction) -> Self {
        let status_label = transaction.status_code.label();
        Self {
            transaction,
            status_label,
        }
    }
}

/// Provider notification body.
///
/// `paymentLinkID` is accepted as a spelling of `paymentLinkId`. The two name
/// one field, so a body carrying both is rejected as a duplicate field.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    #[serde(alias = "paymentLinkID")]
    pub payment_link_id: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub success: bool,
    pub outcome: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct RedirectQuery {
    #[serde(rename = "orderCode")]
    pub order_code: Option<String>,
}

/// Body of a redirect callback in JSON mode.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectEcho {
    pub order_code: Option<i64>,
    pub status_code: Option<TransactionStatus>,
    pub status_label: Option<&'static str>,
    pub applied: bool,
}
