//! Durable keyed storage for transactions.
//!
//! Every status change goes through [`TransactionStore::compare_and_update`],
//! so a writer that lost a race observes [`StoreError::Conflict`] instead of
//! silently overwriting the winner.

mod memory;
mod mongo;
#[cfg(test)]
pub(crate) mod testing;

pub use memory::InMemoryTransactionStore;
pub use mongo::MongoTransactionStore;

use crate::models::{StatusUpdate, Transaction, TransactionStatus};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Transaction not found")]
    NotFound,

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Status conflict: expected {expected}, found {actual}")]
    Conflict {
        expected: TransactionStatus,
        actual: TransactionStatus,
    },

    #[error("Store backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn get(&self, order_code: i64) -> Result<Transaction, StoreError>;

    async fn get_by_payment_link_id(&self, payment_link_id: &str)
        -> Result<Transaction, StoreError>;

    /// Fails with `DuplicateKey` if the order code or the payment link id is taken.
    async fn insert(&self, transaction: Transaction) -> Result<(), StoreError>;

    /// Apply `update` only while the stored status still equals `expected`.
    /// Returns the record as written.
    async fn compare_and_update(
        &self,
        order_code: i64,
        expected: TransactionStatus,
        update: StatusUpdate,
    ) -> Result<Transaction, StoreError>;

    /// All records, oldest first.
    async fn list(&self) -> Result<Vec<Transaction>, StoreError>;

    /// Records currently in `status`, oldest first.
    async fn list_by_status(
        &self,
        status: TransactionStatus,
    ) -> Result<Vec<Transaction>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
