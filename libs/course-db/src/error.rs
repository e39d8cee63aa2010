use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("corrupt value under key {key}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize value for key {key}: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("quantity {requested} outside allowed range {min}..={max}")]
    InvalidQuantity { requested: u32, min: u32, max: u32 },
    #[error("could not draw a unique code after {attempts} attempts")]
    CodeCollision { attempts: usize },
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl LedgerError {
    /// Message shown to end users; storage failures never leak details.
    pub fn user_message(&self) -> String {
        match self {
            LedgerError::InvalidQuantity { min, max, .. } => {
                format!("يرجى إدخال عدد بين {} و {}", min, max)
            }
            LedgerError::CodeCollision { .. } | LedgerError::Storage(_) => {
                "حدث خطأ في التسجيل. يرجى المحاولة مرة أخرى لاحقاً.".to_string()
            }
        }
    }
}
