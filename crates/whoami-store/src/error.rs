use thiserror::Error;

use whoami_core::error::CoreError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("ledger read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("ledger write failed: {0}")]
    Write(#[source] std::io::Error),

    #[error("ledger encoding failed: {0}")]
    Encode(#[from] CoreError),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("external store not ready")]
    NotReady,

    #[error("external store timed out after {0} ms")]
    Timeout(u64),
}
