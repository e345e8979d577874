pub mod clock;
pub mod error;
pub mod ingress;
pub mod intent;
pub mod metrics;
pub mod order_code;
pub mod payos;
pub mod reconciler;
pub mod store;
pub mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::PaymentError;
pub use ingress::{Correlation, EventIngress, IngressOutcome};
pub use intent::{CreatedIntent, IntentSettings, PaymentIntentCreator};
pub use metrics::{get_metrics, init_metrics};
pub use payos::{PayOsClient, PaymentProvider};
pub use store::{InMemoryTransactionStore, MongoTransactionStore, TransactionStore};
pub use sweeper::{ExpirySweeper, SweepReport};
