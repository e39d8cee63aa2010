pub mod models;
pub mod db;
pub mod error;
pub mod keys;
pub mod ledger;
pub mod repositories;
pub mod store;

pub use sqlx;

pub use error::{LedgerError, StoreError};
pub use ledger::{CodeLedger, Decision, Entropy, Rejection, SystemEntropy};
pub use store::{KvStore, StoreBackend};
