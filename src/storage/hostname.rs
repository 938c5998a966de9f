//! Last known good failover hostname.

use std::sync::Arc;

use crate::storage::KeyValueStore;

const FAILOVER_HOSTNAME_KEY: &str = "flvId";

/// Persists the failover hostname under one fixed key.
#[derive(Clone)]
pub struct PersistentHostnameStore {
    store: Arc<dyn KeyValueStore>,
}

impl PersistentHostnameStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Read the cached hostname. Errors and empty values read as absent.
    pub fn load(&self) -> Option<String> {
        match self.store.read_encrypted(FAILOVER_HOSTNAME_KEY) {
            Ok(Some(hostname)) if !hostname.is_empty() => Some(hostname),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read cached failover hostname");
                None
            }
        }
    }

    pub fn save(&self, hostname: &str) {
        if let Err(e) = self.store.write_encrypted(FAILOVER_HOSTNAME_KEY, hostname) {
            tracing::warn!(error = %e, hostname = %hostname, "Failed to persist failover hostname");
        }
    }
}
