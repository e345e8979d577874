use crate::services::payos::ProviderError;
use crate::services::store::StoreError;
use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Payment provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Transaction not found")]
    NotFound,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::InvalidAmount(msg) => {
                AppError::BadRequest(anyhow::anyhow!("Invalid amount: {}", msg))
            }
            PaymentError::InvalidPayload(msg) => {
                AppError::BadRequest(anyhow::anyhow!("Invalid payload: {}", msg))
            }
            PaymentError::Provider(e) => AppError::BadGateway(e.to_string()),
            PaymentError::NotFound => AppError::NotFound(anyhow::anyhow!("Transaction not found")),
            PaymentError::Store(StoreError::NotFound) => {
                AppError::NotFound(anyhow::anyhow!("Transaction not found"))
            }
            PaymentError::Store(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            PaymentError::Internal(e) => AppError::InternalError(e),
        }
    }
}
