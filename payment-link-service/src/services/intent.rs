//! Creates payment links and records them as `PENDING`.

use crate::models::Transaction;
use crate::services::clock::Clock;
use crate::services::error::PaymentError;
use crate::services::metrics;
use crate::services::order_code::OrderCodeGenerator;
use crate::services::payos::{PaymentLinkRequest, PaymentProvider, ProviderError};
use crate::services::store::{StoreError, TransactionStore};
use chrono::Duration;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

const MAX_INSERT_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
pub struct IntentSettings {
    pub public_base_url: String,
    pub currency: String,
    pub default_description: String,
    pub expiry_window: Duration,
    pub provider_timeout: std::time::Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedIntent {
    pub checkout_url: String,
    pub order_code: i64,
    pub payment_link_id: String,
}

/// Accept only a positive integer JSON number.
pub fn parse_amount(value: Option<&Value>) -> Result<i64, PaymentError> {
    let value = value.ok_or_else(|| PaymentError::InvalidAmount("amount is required".to_string()))?;
    match value {
        Value::Number(n) => n
            .as_i64()
            .filter(|amount| *amount > 0)
            .ok_or_else(|| PaymentError::InvalidAmount(format!("{} is not a positive integer", n))),
        other => Err(PaymentError::InvalidAmount(format!(
            "expected a number, got {}",
            other
        ))),
    }
}

#[derive(Clone)]
pub struct PaymentIntentCreator {
    store: Arc<dyn TransactionStore>,
    provider: Arc<dyn PaymentProvider>,
    clock: Arc<dyn Clock>,
    order_codes: Arc<OrderCodeGenerator>,
    settings: Arc<IntentSettings>,
}

impl PaymentIntentCreator {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        provider: Arc<dyn PaymentProvider>,
        clock: Arc<dyn Clock>,
        settings: IntentSettings,
    ) -> Self {
        Self {
            store,
            provider,
            clock,
            order_codes: Arc::new(OrderCodeGenerator::new()),
            settings: Arc::new(settings),
        }
    }

    /// Run [`create`](Self::create) on its own task so a dropped request does
    /// not abandon a link the provider already issued.
    pub async fn create_detached(
        &self,
        amount: i64,
        description: Option<String>,
    ) -> Result<CreatedIntent, PaymentError> {
        let creator = self.clone();
        tokio::spawn(async move { creator.create(amount, description).await })
            .await
            .map_err(|e| PaymentError::Internal(anyhow::Error::new(e)))?
    }

    pub async fn create(
        &self,
        amount: i64,
        description: Option<String>,
    ) -> Result<CreatedIntent, PaymentError> {
        if amount <= 0 {
            metrics::record_intent_failure("invalid_amount");
            return Err(PaymentError::InvalidAmount(format!(
                "{} is not a positive integer",
                amount
            )));
        }

        let description = description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| self.settings.default_description.clone());

        for attempt in 1..=MAX_INSERT_ATTEMPTS {
            let now = self.clock.now();
            let order_code = self
                .order_codes
                .allocate(self.store.as_ref(), now)
                .await
                .inspect_err(|_| metrics::record_intent_failure("store"))?;

            let request = self.link_request(order_code, amount, &description, now);
            let link = self.call_provider(&request).await.inspect_err(|e| {
                metrics::record_intent_failure("provider");
                tracing::error!(order_code, error = %e, "Payment link creation failed");
            })?;

            let transaction = Transaction::pending(
                order_code,
                link.payment_link_id.clone(),
                amount,
                self.settings.currency.clone(),
                description.clone(),
                link.checkout_url.clone(),
                now,
            );

            match self.store.insert(transaction).await {
                Ok(()) => {
                    metrics::record_intent_created(&self.settings.currency);
                    tracing::info!(
                        order_code,
                        payment_link_id = %link.payment_link_id,
                        amount,
                        "Payment intent recorded"
                    );
                    return Ok(CreatedIntent {
                        checkout_url: link.checkout_url,
                        order_code,
                        payment_link_id: link.payment_link_id,
                    });
                }
                Err(StoreError::DuplicateKey(key)) => {
                    // The issued link stays live at the provider until its expiredAt.
                    tracing::warn!(
                        order_code,
                        attempt,
                        key = %key,
                        abandoned_payment_link_id = %link.payment_link_id,
                        abandoned_expired_at = request.expired_at,
                        "Duplicate key on insert, abandoning issued link and retrying"
                    );
                }
                Err(e) => {
                    metrics::record_intent_failure("store");
                    return Err(e.into());
                }
            }
        }

        metrics::record_intent_failure("store");
        Err(PaymentError::Internal(anyhow::anyhow!(
            "could not record payment intent after {} attempts",
            MAX_INSERT_ATTEMPTS
        )))
    }

    fn link_request(
        &self,
        order_code: i64,
        amount: i64,
        description: &str,
        now: chrono::DateTime<chrono::Utc>,
    ) -> PaymentLinkRequest {
        let base = self.settings.public_base_url.trim_end_matches('/');
        PaymentLinkRequest {
            order_code,
            amount,
            description: description.to_string(),
            return_url: format!("{}/payment/success?orderCode={}", base, order_code),
            cancel_url: format!("{}/payment/cancel?orderCode={}", base, order_code),
            expired_at: (now + self.settings.expiry_window).timestamp(),
        }
    }

    async fn call_provider(
        &self,
        request: &PaymentLinkRequest,
    ) -> Result<crate::services::payos::PaymentLink, ProviderError> {
        let timeout = self.settings.provider_timeout;
        tokio::time::timeout(timeout, self.provider.create_payment_link(request))
            .await
            .map_err(|_| ProviderError::Timeout(timeout))?
    }
}
