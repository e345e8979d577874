use crate::dtos::{WebhookPayload, WebhookResponse};
use crate::services::error::PaymentError;
use crate::startup::AppState;
use axum::{extract::State, http::HeaderMap, Json};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::utils::signature::verify_payload;

pub const SIGNATURE_HEADER: &str = "x-payos-signature";

/// payOS payment notification.
///
/// Any handled outcome, including an unknown payment link, is acknowledged
/// with 200 so the provider stops redelivering.
pub async fn payos_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, AppError> {
    if state.config.provider.verify_webhooks {
        verify_signature(&state, &headers, &body)?;
    }

    let payload: WebhookPayload = serde_json::from_str(&body).map_err(|e| {
        tracing::warn!(error = %e, "Malformed webhook payload");
        PaymentError::InvalidPayload(e.to_string())
    })?;

    if payload.payment_link_id.trim().is_empty() || payload.status.trim().is_empty() {
        return Err(PaymentError::InvalidPayload(
            "paymentLinkId and status are required".to_string(),
        )
        .into());
    }

    tracing::info!(
        payment_link_id = %payload.payment_link_id,
        status = %payload.status,
        "Received payOS webhook"
    );

    let outcome = state
        .ingress
        .webhook(payload.payment_link_id.trim(), &payload.status)
        .await?;

    Ok(Json(WebhookResponse {
        success: true,
        outcome: outcome.as_str(),
    }))
}

fn verify_signature(state: &AppState, headers: &HeaderMap, body: &str) -> Result<(), AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Missing webhook signature");
            AppError::Unauthorized(anyhow::anyhow!("Missing webhook signature"))
        })?;

    let is_valid = verify_payload(
        state.config.provider.checksum_key.expose_secret(),
        body,
        signature,
    )
    .map_err(|e| {
        tracing::error!(error = %e, "Webhook signature verification error");
        AppError::InternalError(anyhow::anyhow!("Webhook verification failed"))
    })?;

    if !is_valid {
        tracing::warn!("Invalid webhook signature");
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Invalid webhook signature"
        )));
    }

    Ok(())
}
