//! Persistent key/value storage.
//!
//! # Data Flow
//! ```text
//! Dispatcher construction:
//!     → hostname.rs load() → KeyValueStore::read_encrypted(key)
//!
//! Probe request succeeds through a new failover hostname:
//!     → hostname.rs save() → KeyValueStore::write_encrypted(key, value)
//! ```
//!
//! # Design Decisions
//! - Stores are injected, so tests run without touching disk
//! - Encryption is the store's concern; callers only see plaintext
//! - Storage failures are logged and never fail a request

pub mod file;
pub mod hostname;
pub mod memory;

pub use file::FileStore;
pub use hostname::PersistentHostnameStore;
pub use memory::MemoryStore;

use thiserror::Error;

/// Errors raised by key/value stores.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt store file: {0}")]
    Format(#[from] serde_json::Error),

    #[error("Encryption error: {0}")]
    Crypto(String),
}

/// String store whose values are encrypted at rest.
pub trait KeyValueStore: Send + Sync {
    fn read_encrypted(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn write_encrypted(&self, key: &str, value: &str) -> Result<(), StorageError>;
}
