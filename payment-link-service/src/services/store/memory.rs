use super::{StoreError, TransactionStore};
use crate::models::{StatusUpdate, Transaction, TransactionStatus};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Records {
    by_order_code: HashMap<i64, Transaction>,
    by_payment_link_id: HashMap<String, i64>,
    insertion_order: Vec<i64>,
}

/// In-process store. Compare and swap happen under one write lock.
#[derive(Default, Clone)]
pub struct InMemoryTransactionStore {
    records: Arc<RwLock<Records>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn get(&self, order_code: i64) -> Result<Transaction, StoreError> {
        let records = self.records.read().await;
        records
            .by_order_code
            .get(&order_code)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_payment_link_id(
        &self,
        payment_link_id: &str,
    ) -> Result<Transaction, StoreError> {
        let records = self.records.read().await;
        records
            .by_payment_link_id
            .get(payment_link_id)
            .and_then(|order_code| records.by_order_code.get(order_code))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn insert(&self, transaction: Transaction) -> Result<(), StoreError> {
        let mut records = self.records.write().await;

        if records.by_order_code.contains_key(&transaction.order_code) {
            return Err(StoreError::DuplicateKey(format!(
                "orderCode {}",
                transaction.order_code
            )));
        }
        if records
            .by_payment_link_id
            .contains_key(&transaction.payment_link_id)
        {
            return Err(StoreError::DuplicateKey(format!(
                "paymentLinkId {}",
                transaction.payment_link_id
            )));
        }

        records
            .by_payment_link_id
            .insert(transaction.payment_link_id.clone(), transaction.order_code);
        records.insertion_order.push(transaction.order_code);
        records
            .by_order_code
            .insert(transaction.order_code, transaction);
        Ok(())
    }

    async fn compare_and_update(
        &self,
        order_code: i64,
        expected: TransactionStatus,
        update: StatusUpdate,
    ) -> Result<Transaction, StoreError> {
        let mut records = self.records.write().await;
        let record = records
            .by_order_code
            .get_mut(&order_code)
            .ok_or(StoreError::NotFound)?;

        if record.status_code != expected {
            return Err(StoreError::Conflict {
                expected,
                actual: record.status_code,
            });
        }

        *record = record.with_update(&update);
        Ok(record.clone())
    }

    async fn list(&self) -> Result<Vec<Transaction>, StoreError> {
        Ok(self.collect_sorted(|_| true).await)
    }

    async fn list_by_status(
        &self,
        status: TransactionStatus,
    ) -> Result<Vec<Transaction>, StoreError> {
        Ok(self.collect_sorted(|t| t.status_code == status).await)
    }
}

impl InMemoryTransactionStore {
    async fn collect_sorted(&self, keep: impl Fn(&Transaction) -> bool) -> Vec<Transaction> {
        let records = self.records.read().await;
        let mut transactions: Vec<Transaction> = records
            .insertion_order
            .iter()
            .filter_map(|order_code| records.by_order_code.get(order_code))
            .filter(|t| keep(t))
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps.
        transactions.sort_by_key(|t| t.created_at);
        transactions
    }
}
