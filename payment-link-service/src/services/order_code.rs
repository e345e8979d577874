//! Local order codes: millisecond timestamps, forced strictly increasing.

use crate::services::store::{StoreError, TransactionStore};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

const MAX_ATTEMPTS: usize = 5;

#[derive(Debug, Default)]
pub struct OrderCodeGenerator {
    last: AtomicI64,
}

impl OrderCodeGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `now` in milliseconds, or one past the last issued code if the clock
    /// has not moved far enough.
    pub fn next(&self, now: DateTime<Utc>) -> i64 {
        let candidate = now.timestamp_millis();
        let mut previous = self.last.load(Ordering::SeqCst);
        loop {
            let next = candidate.max(previous + 1);
            match self
                .last
                .compare_exchange(previous, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return next,
                Err(actual) => previous = actual,
            }
        }
    }

    /// Issue a code that the store does not hold yet.
    pub async fn allocate(
        &self,
        store: &dyn TransactionStore,
        now: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        for attempt in 1..=MAX_ATTEMPTS {
            let code = self.next(now);
            match store.get(code).await {
                Err(StoreError::NotFound) => return Ok(code),
                Ok(_) => {
                    tracing::warn!(order_code = code, attempt, "Order code already in use");
                }
                Err(e) => return Err(e),
            }
        }

        Err(StoreError::DuplicateKey(format!(
            "no free order code after {} attempts",
            MAX_ATTEMPTS
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Transaction;
    use crate::services::store::InMemoryTransactionStore;
    use chrono::{Duration, TimeZone};
    use std::collections::HashSet;
    use std::sync::Arc;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 5, 5, 5, 5).unwrap()
    }

    #[test]
    fn test_codes_strictly_increase_on_a_frozen_clock() {
        let generator = OrderCodeGenerator::new();
        let first = generator.next(now());
        let second = generator.next(now());
        let third = generator.next(now());

        assert_eq!(first, now().timestamp_millis());
        assert_eq!(second, first + 1);
        assert_eq!(third, first + 2);
    }

    #[test]
    fn test_codes_never_go_backwards() {
        let generator = OrderCodeGenerator::new();
        let ahead = generator.next(now() + Duration::seconds(5));
        let behind = generator.next(now());
        assert!(behind > ahead);
    }

    #[test]
    fn test_concurrent_codes_are_unique() {
        let generator = Arc::new(OrderCodeGenerator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let generator = generator.clone();
                std::thread::spawn(move || (0..250).map(|_| generator.next(now())).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for code in handle.join().unwrap() {
                assert!(seen.insert(code), "duplicate code {}", code);
            }
        }
        assert_eq!(seen.len(), 2000);
    }

    #[tokio::test]
    async fn test_allocate_skips_codes_in_use() {
        let store = InMemoryTransactionStore::new();
        let taken = now().timestamp_millis();
        store
            .insert(Transaction::pending(
                taken,
                "plink-taken".to_string(),
                1000,
                "VND".to_string(),
                "Existing".to_string(),
                "https://pay/taken".to_string(),
                now(),
            ))
            .await
            .unwrap();

        let code = OrderCodeGenerator::new().allocate(&store, now()).await.unwrap();
        assert_eq!(code, taken + 1);
    }
}
