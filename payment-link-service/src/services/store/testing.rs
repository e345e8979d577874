//! Store wrapper that injects write failures ahead of an in-memory store.

use super::{InMemoryTransactionStore, StoreError, TransactionStore};
use crate::models::{StatusUpdate, Transaction, TransactionStatus};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
pub struct FaultyStore {
    inner: InMemoryTransactionStore,
    conflicts_left: AtomicUsize,
    duplicates_left: AtomicUsize,
    /// Only this order code sees injected conflicts. `None` means every code.
    conflict_on: Option<i64>,
    cas_calls: AtomicUsize,
    insert_calls: AtomicUsize,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` compare-and-updates fail with `Conflict { actual: Pending }`.
    pub fn with_conflicts(mut self, n: usize) -> Self {
        self.conflicts_left = AtomicUsize::new(n);
        self
    }

    pub fn conflicts_only_on(mut self, order_code: i64) -> Self {
        self.conflict_on = Some(order_code);
        self
    }

    /// The next `n` inserts fail with `DuplicateKey` without writing.
    pub fn with_duplicates(mut self, n: usize) -> Self {
        self.duplicates_left = AtomicUsize::new(n);
        self
    }

    pub fn cas_calls(&self) -> usize {
        self.cas_calls.load(Ordering::SeqCst)
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    fn take(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl TransactionStore for FaultyStore {
    async fn get(&self, order_code: i64) -> Result<Transaction, StoreError> {
        self.inner.get(order_code).await
    }

    async fn get_by_payment_link_id(
        &self,
        payment_link_id: &str,
    ) -> Result<Transaction, StoreError> {
        self.inner.get_by_payment_link_id(payment_link_id).await
    }

    async fn insert(&self, transaction: Transaction) -> Result<(), StoreError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take(&self.duplicates_left) {
            return Err(StoreError::DuplicateKey(format!(
                "orderCode {}",
                transaction.order_code
            )));
        }
        self.inner.insert(transaction).await
    }

    async fn compare_and_update(
        &self,
        order_code: i64,
        expected: TransactionStatus,
        update: StatusUpdate,
    ) -> Result<Transaction, StoreError> {
        self.cas_calls.fetch_add(1, Ordering::SeqCst);
        let targeted = self.conflict_on.map_or(true, |code| code == order_code);
        if targeted && Self::take(&self.conflicts_left) {
            return Err(StoreError::Conflict {
                expected,
                actual: TransactionStatus::Pending,
            });
        }
        self.inner.compare_and_update(order_code, expected, update).await
    }

    async fn list(&self) -> Result<Vec<Transaction>, StoreError> {
        self.inner.list().await
    }

    async fn list_by_status(
        &self,
        status: TransactionStatus,
    ) -> Result<Vec<Transaction>, StoreError> {
        self.inner.list_by_status(status).await
    }
}
