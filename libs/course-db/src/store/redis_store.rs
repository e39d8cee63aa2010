use async_trait::async_trait;
use redis::aio::ConnectionManager;
use serde_json::Value;
use tracing::info;

use super::KvStore;
use crate::error::StoreError;

#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
    namespace: String,
}

impl RedisStore {
    pub async fn connect(redis_url: &str, namespace: Option<String>) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)?;
        let manager = client.get_connection_manager().await?;

        info!("Redis store connected");
        Ok(Self {
            manager,
            namespace: namespace.unwrap_or_else(|| "course".to_string()),
        })
    }

    fn scoped(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    fn encode(key: &str, value: &Value) -> Result<String, StoreError> {
        serde_json::to_string(value).map_err(|source| StoreError::Serialize {
            key: key.to_string(),
            source,
        })
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(self.scoped(key))
            .query_async(&mut conn)
            .await?;

        match raw {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| StoreError::Corrupt {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let body = Self::encode(key, &value)?;
        let mut conn = self.manager.clone();
        let _: () = redis::cmd("SET")
            .arg(self.scoped(key))
            .arg(body)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn set_many(&self, entries: Vec<(String, Value)>) -> Result<(), StoreError> {
        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, value) in &entries {
            pipe.cmd("SET").arg(self.scoped(key)).arg(Self::encode(key, value)?).ignore();
        }

        let mut conn = self.manager.clone();
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
