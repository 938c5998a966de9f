//! Failover hostname resolution.
//!
//! # Data Flow
//! ```text
//! Dispatcher starts or re-enters a probe:
//!     → FailoverResolver::get_next_hostname(ignore_ssl_errors, AnswerSink)
//!     → resolver strategy picks the next candidate (hostname_list.rs)
//!     → AnswerSink posts FailoverAnswer back to the dispatcher
//! ```
//!
//! # Design Decisions
//! - The resolver strategy is opaque to the dispatcher; only the answer
//!   variants matter
//! - Exactly one answer per call; a dropped sink answers `Failed`
//! - Probe state (`FailoverState`) is owned by the dispatcher, not the resolver

pub mod hostname_list;

pub use hostname_list::HostnameListResolver;

use serde::{Deserialize, Serialize};

use crate::dispatcher::events::AnswerSink;

/// Result of one hostname discovery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailoverAnswer {
    /// A candidate hostname to try.
    Success(String),
    /// The VPN state changed while resolving; retry the request fresh.
    ConnectStateChanged,
    SslError,
    /// No candidates left.
    Failed,
}

impl FailoverAnswer {
    pub fn label(&self) -> &'static str {
        match self {
            FailoverAnswer::Success(_) => "success",
            FailoverAnswer::ConnectStateChanged => "connect_state_changed",
            FailoverAnswer::SslError => "ssl_error",
            FailoverAnswer::Failed => "failed",
        }
    }
}

/// Coarse failover state kept by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailoverState {
    /// Never attempted, or reset.
    #[default]
    Unknown,
    /// A hostname was confirmed reachable and is cached.
    Ready,
    /// Resolution is exhausted; stays failed for the rest of the process.
    Failed,
}

/// How the API endpoint is resolved while disconnected.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiResolutionSettings {
    /// Use the built-in candidate list.
    pub automatic: bool,
    /// User-provided address tried first when `automatic` is false.
    pub manual_address: String,
}

impl Default for ApiResolutionSettings {
    fn default() -> Self {
        Self {
            automatic: true,
            manual_address: String::new(),
        }
    }
}

/// Discovers alternate API hostnames.
pub trait FailoverResolver: Send {
    /// Start one discovery attempt. The answer is delivered through `answer`.
    fn get_next_hostname(&mut self, ignore_ssl_errors: bool, answer: AnswerSink);

    fn set_api_resolution_settings(&mut self, settings: ApiResolutionSettings);
}
