//! Structured logging.
//!
//! # Responsibilities
//! - Install the global tracing subscriber
//! - Resolve the log filter from the environment or config

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when neither `RUST_LOG` nor config provides one.
pub const DEFAULT_LOG_FILTER: &str = "server_api=debug";

/// Install the global subscriber. `RUST_LOG` wins over `filter`.
///
/// Returns false if a subscriber was already installed.
pub fn init_tracing(filter: Option<&str>) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| filter.unwrap_or(DEFAULT_LOG_FILTER).into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}
