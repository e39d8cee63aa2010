//! Key-value persistence surface.
//!
//! Every collection the ledger and the repositories keep is a JSON document
//! under a plain string key. Backends only need `get`/`set`; the ones with a
//! transaction primitive also override [`KvStore::set_many`].

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::StoreError;

pub mod file;
pub mod memory;
pub mod postgres;
pub mod redis_store;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use redis_store::RedisStore;

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> std::result::Result<Option<Value>, StoreError>;

    async fn set(&self, key: &str, value: Value) -> std::result::Result<(), StoreError>;

    /// Writes entries in order. Stops at the first failure, so earlier
    /// entries stay written and later ones are skipped.
    async fn set_many(&self, entries: Vec<(String, Value)>) -> std::result::Result<(), StoreError> {
        for (key, value) in entries {
            self.set(&key, value).await?;
        }
        Ok(())
    }

    fn backend(&self) -> &'static str;
}

/// Reads a collection, treating an absent or malformed document as empty.
pub async fn load_or_default<T>(store: &dyn KvStore, key: &str) -> std::result::Result<T, StoreError>
where
    T: DeserializeOwned + Default,
{
    let value = match store.get(key).await {
        Ok(Some(value)) => value,
        Ok(None) => return Ok(T::default()),
        Err(StoreError::Corrupt { key, source }) => {
            warn!("Discarding corrupt document under '{}': {}", key, source);
            return Ok(T::default());
        }
        Err(e) => return Err(e),
    };

    match serde_json::from_value(value) {
        Ok(parsed) => Ok(parsed),
        Err(e) => {
            warn!("Document under '{}' has unexpected shape, treating as empty: {}", key, e);
            Ok(T::default())
        }
    }
}

pub fn to_document<T: Serialize>(key: &str, value: &T) -> std::result::Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|source| StoreError::Serialize {
        key: key.to_string(),
        source,
    })
}

pub async fn save<T: Serialize>(store: &dyn KvStore, key: &str, value: &T) -> std::result::Result<(), StoreError> {
    let doc = to_document(key, value)?;
    store.set(key, doc).await
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreBackend {
    Memory,
    File { path: String },
    Postgres { url: String, max_connections: Option<u32> },
    Redis { url: String, namespace: Option<String> },
}

impl Default for StoreBackend {
    fn default() -> Self {
        StoreBackend::File {
            path: "course-data.json".to_string(),
        }
    }
}

pub async fn open_store(backend: &StoreBackend) -> Result<Arc<dyn KvStore>> {
    let store: Arc<dyn KvStore> = match backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::File { path } => Arc::new(
            FileStore::open(path)
                .await
                .with_context(|| format!("Failed to open file store at {}", path))?,
        ),
        StoreBackend::Postgres { url, max_connections } => {
            let pool = crate::db::init_db(url, max_connections.unwrap_or(20)).await?;
            Arc::new(PgStore::new(pool))
        }
        StoreBackend::Redis { url, namespace } => Arc::new(
            RedisStore::connect(url, namespace.clone())
                .await
                .context("Failed to connect to Redis")?,
        ),
    };

    info!("Key-value store ready (backend: {})", store.backend());
    Ok(store)
}
