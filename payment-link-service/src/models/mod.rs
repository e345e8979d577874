mod transaction;

pub use transaction::{EventSource, StatusUpdate, Transaction, TransactionStatus};
