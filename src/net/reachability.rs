//! Network reachability.

use std::sync::atomic::{AtomicBool, Ordering};

/// Answers whether the host currently has any network connection.
pub trait NetworkReachability: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Online flag updated by the platform's network detection.
#[derive(Debug)]
pub struct NetworkDetector {
    online: AtomicBool,
}

impl NetworkDetector {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        let prev = self.online.swap(online, Ordering::Relaxed);
        if prev != online {
            tracing::info!(online, "Network reachability changed");
        }
    }
}

impl Default for NetworkDetector {
    fn default() -> Self {
        Self::new(true)
    }
}

impl NetworkReachability for NetworkDetector {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }
}
