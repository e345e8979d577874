use super::{StoreError, TransactionStore};
use crate::models::{EventSource, StatusUpdate, Transaction, TransactionStatus};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, DateTime as BsonDateTime, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument};
use mongodb::{Collection, Database, IndexModel};
use serde::{Deserialize, Serialize};

const COLLECTION: &str = "transactions";
const DUPLICATE_KEY_CODE: i32 = 11000;

/// Stored shape. The order code is the document `_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TransactionDocument {
    #[serde(rename = "_id")]
    order_code: i64,
    payment_link_id: String,
    amount: i64,
    currency: String,
    description: String,
    checkout_url: String,
    status_code: TransactionStatus,
    status_detail: Option<String>,
    settled_by: Option<EventSource>,
    created_at: BsonDateTime,
    updated_at: BsonDateTime,
}

impl From<&Transaction> for TransactionDocument {
    fn from(t: &Transaction) -> Self {
        Self {
            order_code: t.order_code,
            payment_link_id: t.payment_link_id.clone(),
            amount: t.amount,
            currency: t.currency.clone(),
            description: t.description.clone(),
            checkout_url: t.checkout_url.clone(),
            status_code: t.status_code,
            status_detail: t.status_detail.clone(),
            settled_by: t.settled_by,
            created_at: BsonDateTime::from_chrono(t.created_at),
            updated_at: BsonDateTime::from_chrono(t.updated_at),
        }
    }
}

impl From<TransactionDocument> for Transaction {
    fn from(d: TransactionDocument) -> Self {
        Self {
            order_code: d.order_code,
            payment_link_id: d.payment_link_id,
            amount: d.amount,
            currency: d.currency,
            description: d.description,
            checkout_url: d.checkout_url,
            status_code: d.status_code,
            status_detail: d.status_detail,
            settled_by: d.settled_by,
            created_at: d.created_at.to_chrono(),
            updated_at: d.updated_at.to_chrono(),
        }
    }
}

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        StoreError::Backend(anyhow::Error::new(err))
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == DUPLICATE_KEY_CODE
    )
}

#[derive(Clone)]
pub struct MongoTransactionStore {
    db: Database,
    collection: Collection<TransactionDocument>,
}

impl MongoTransactionStore {
    pub fn new(db: &Database) -> Self {
        Self {
            db: db.clone(),
            collection: db.collection(COLLECTION),
        }
    }

    pub async fn init_indexes(&self) -> anyhow::Result<()> {
        let payment_link_index = IndexModel::builder()
            .keys(doc! { "payment_link_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("payment_link_id_unique".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        let created_at_index = IndexModel::builder()
            .keys(doc! { "created_at": 1, "_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("created_at_idx".to_string())
                    .build(),
            )
            .build();

        let status_index = IndexModel::builder()
            .keys(doc! { "status_code": 1, "created_at": 1 })
            .options(
                IndexOptions::builder()
                    .name("status_created_at_idx".to_string())
                    .build(),
            )
            .build();

        self.collection
            .create_indexes([payment_link_index, created_at_index, status_index], None)
            .await?;

        tracing::info!(collection = COLLECTION, "Transaction indexes initialized");
        Ok(())
    }

    async fn find_sorted(&self, filter: Option<Document>) -> Result<Vec<Transaction>, StoreError> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": 1, "_id": 1 })
            .build();
        let cursor = self.collection.find(filter, options).await?;
        let documents: Vec<TransactionDocument> = cursor.try_collect().await?;
        Ok(documents.into_iter().map(Transaction::from).collect())
    }
}

fn status_filter(status: TransactionStatus) -> Document {
    doc! { "status_code": status.as_str() }
}

#[async_trait]
impl TransactionStore for MongoTransactionStore {
    async fn get(&self, order_code: i64) -> Result<Transaction, StoreError> {
        self.collection
            .find_one(doc! { "_id": order_code }, None)
            .await?
            .map(Transaction::from)
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_payment_link_id(
        &self,
        payment_link_id: &str,
    ) -> Result<Transaction, StoreError> {
        self.collection
            .find_one(doc! { "payment_link_id": payment_link_id }, None)
            .await?
            .map(Transaction::from)
            .ok_or(StoreError::NotFound)
    }

    async fn insert(&self, transaction: Transaction) -> Result<(), StoreError> {
        let document = TransactionDocument::from(&transaction);
        match self.collection.insert_one(document, None).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(StoreError::DuplicateKey(format!(
                "orderCode {} or paymentLinkId {}",
                transaction.order_code, transaction.payment_link_id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn compare_and_update(
        &self,
        order_code: i64,
        expected: TransactionStatus,
        update: StatusUpdate,
    ) -> Result<Transaction, StoreError> {
        let filter = doc! { "_id": order_code, "status_code": expected.as_str() };
        // updated_at starts at created_at, so $max keeps it from moving behind creation.
        let changes = doc! {
            "$set": {
                "status_code": update.status_code.as_str(),
                "status_detail": update.status_detail.clone(),
                "settled_by": mongodb::bson::to_bson(&update.settled_by)
                    .map_err(|e| StoreError::Backend(anyhow::Error::new(e)))?,
            },
            "$max": {
                "updated_at": BsonDateTime::from_chrono(update.updated_at),
            },
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        if let Some(updated) = self
            .collection
            .find_one_and_update(filter, changes, options)
            .await?
        {
            return Ok(updated.into());
        }

        match self
            .collection
            .find_one(doc! { "_id": order_code }, None)
            .await?
        {
            Some(current) => Err(StoreError::Conflict {
                expected,
                actual: current.status_code,
            }),
            None => Err(StoreError::NotFound),
        }
    }

    async fn list(&self) -> Result<Vec<Transaction>, StoreError> {
        self.find_sorted(None).await
    }

    async fn list_by_status(
        &self,
        status: TransactionStatus,
    ) -> Result<Vec<Transaction>, StoreError> {
        self.find_sorted(Some(status_filter(status))).await
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.db.run_command(doc! { "ping": 1 }, None).await?;
        Ok(())
    }
}
