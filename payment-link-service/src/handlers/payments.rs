use crate::dtos::{CreatePaymentRequest, TransactionView};
use crate::services::error::PaymentError;
use crate::services::intent::{parse_amount, CreatedIntent};
use crate::services::metrics;
use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use service_core::error::AppError;
use service_core::middleware::capability::Caller;
use validator::Validate;

/// Create a payOS payment link and record it as pending.
pub async fn create_payment(
    State(state): State<AppState>,
    caller: Option<Extension<Caller>>,
    Json(payload): Json<CreatePaymentRequest>,
) -> Result<Json<CreatedIntent>, AppError> {
    let amount = parse_amount(payload.amount.as_ref()).inspect_err(|e| {
        metrics::record_intent_failure("invalid_amount");
        tracing::warn!(error = %e, "Rejected payment request");
    })?;
    payload.validate()?;

    tracing::info!(
        amount,
        user_id = caller
            .as_ref()
            .and_then(|Extension(c)| c.user_id.as_deref())
            .unwrap_or("-"),
        "Creating payment link"
    );

    let intent = state
        .creator
        .create_detached(amount, payload.description)
        .await?;

    Ok(Json(intent))
}

/// All transactions in creation order, after expiring stale ones.
pub async fn payment_history(
    State(state): State<AppState>,
) -> Result<Json<Vec<TransactionView>>, AppError> {
    let report = state.sweeper.sweep().await?;
    tracing::debug!(
        scanned = report.scanned,
        expired = report.expired,
        "History read sweep"
    );

    let transactions = state.store.list().await.map_err(PaymentError::from)?;
    Ok(Json(
        transactions.into_iter().map(TransactionView::from).collect(),
    ))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    Path(order_code): Path<i64>,
) -> Result<Json<TransactionView>, AppError> {
    let transaction = state
        .store
        .get(order_code)
        .await
        .map_err(PaymentError::from)?;
    let transaction = state.sweeper.refresh(transaction).await?;

    Ok(Json(transaction.into()))
}
