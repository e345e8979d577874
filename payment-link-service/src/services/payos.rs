//! payOS merchant API client.
//!
//! Creates hosted payment links. Requests are signed with the merchant
//! checksum key over the canonical `amount/cancelUrl/description/orderCode/returnUrl`
//! string; a response is only trusted when it carries code `00` and echoes
//! our order code.

use crate::config::ProviderConfig;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use service_core::utils::signature::sign_fields;
use std::time::Duration;
use thiserror::Error;

const SUCCESS_CODE: &str = "00";

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("payment provider credentials not configured")]
    NotConfigured,

    #[error("payment provider did not answer within {0:?}")]
    Timeout(Duration),

    #[error("payment provider unreachable: {0}")]
    Transport(String),

    #[error("payment provider rejected the request ({code}): {desc}")]
    Rejected { code: String, desc: String },

    #[error("unexpected payment provider response: {0}")]
    InvalidResponse(String),
}

/// What we ask the provider for.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentLinkRequest {
    pub order_code: i64,
    pub amount: i64,
    pub description: String,
    pub return_url: String,
    pub cancel_url: String,
    /// Unix seconds after which the provider closes the link.
    pub expired_at: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentLink {
    pub checkout_url: String,
    pub payment_link_id: String,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_payment_link(
        &self,
        request: &PaymentLinkRequest,
    ) -> Result<PaymentLink, ProviderError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePaymentLinkBody<'a> {
    order_code: i64,
    amount: i64,
    description: &'a str,
    return_url: &'a str,
    cancel_url: &'a str,
    expired_at: i64,
    signature: String,
}

#[derive(Debug, Deserialize)]
struct PayOsEnvelope {
    code: String,
    #[serde(default)]
    desc: String,
    data: Option<PaymentLinkData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentLinkData {
    checkout_url: String,
    payment_link_id: String,
    order_code: i64,
    amount: i64,
}

#[derive(Clone)]
pub struct PayOsClient {
    client: Client,
    config: ProviderConfig,
}

impl PayOsClient {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn signature(&self, request: &PaymentLinkRequest) -> Result<String, ProviderError> {
        let fields = [
            ("amount", request.amount.to_string()),
            ("cancelUrl", request.cancel_url.clone()),
            ("description", request.description.clone()),
            ("orderCode", request.order_code.to_string()),
            ("returnUrl", request.return_url.clone()),
        ];
        sign_fields(self.config.checksum_key.expose_secret(), &fields)
            .map_err(|_| ProviderError::NotConfigured)
    }
}

#[async_trait]
impl PaymentProvider for PayOsClient {
    async fn create_payment_link(
        &self,
        request: &PaymentLinkRequest,
    ) -> Result<PaymentLink, ProviderError> {
        if !self.config.is_configured() {
            return Err(ProviderError::NotConfigured);
        }

        let body = CreatePaymentLinkBody {
            order_code: request.order_code,
            amount: request.amount,
            description: &request.description,
            return_url: &request.return_url,
            cancel_url: &request.cancel_url,
            expired_at: request.expired_at,
            signature: self.signature(request)?,
        };

        let url = format!(
            "{}/v2/payment-requests",
            self.config.api_base_url.trim_end_matches('/')
        );
        let timeout = self.config.timeout();

        let response = self
            .client
            .post(&url)
            .header("x-client-id", &self.config.client_id)
            .header("x-api-key", self.config.api_key.expose_secret())
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(timeout)
                } else {
                    ProviderError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(timeout)
            } else {
                ProviderError::Transport(e.to_string())
            }
        })?;

        tracing::debug!(
            status = %status,
            order_code = request.order_code,
            "payOS create payment link response"
        );

        if !status.is_success() {
            let desc = serde_json::from_str::<PayOsEnvelope>(&text)
                .map(|envelope| envelope.desc)
                .unwrap_or_else(|_| text.chars().take(200).collect());
            tracing::error!(status = %status, desc = %desc, "payOS returned an error status");
            return Err(ProviderError::Rejected {
                code: status.as_u16().to_string(),
                desc,
            });
        }

        let envelope: PayOsEnvelope = serde_json::from_str(&text)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        if envelope.code != SUCCESS_CODE {
            tracing::error!(
                code = %envelope.code,
                desc = %envelope.desc,
                order_code = request.order_code,
                "payOS rejected payment link"
            );
            return Err(ProviderError::Rejected {
                code: envelope.code,
                desc: envelope.desc,
            });
        }

        let data = envelope
            .data
            .ok_or_else(|| ProviderError::InvalidResponse("missing data".to_string()))?;

        if data.order_code != request.order_code || data.amount != request.amount {
            return Err(ProviderError::InvalidResponse(format!(
                "link for order {} amount {} does not match request",
                data.order_code, data.amount
            )));
        }

        tracing::info!(
            order_code = data.order_code,
            payment_link_id = %data.payment_link_id,
            amount = data.amount,
            "payOS payment link created"
        );

        Ok(PaymentLink {
            checkout_url: data.checkout_url,
            payment_link_id: data.payment_link_id,
        })
    }
}
