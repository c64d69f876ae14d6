pub mod error;
pub mod file;
pub mod health;
pub mod redis;

pub use self::redis::{RedisConfig, RedisStore};
pub use error::StoreError;
pub use file::FileStore;
pub use health::StoreHealth;
