//! Transport contract consumed by the dispatcher.

use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::dispatcher::events::ReplySink;
use crate::request::RequestType;

/// Errors an exchange can finish with.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// TLS/SSL failures are escalated instead of retried through failover.
    pub fn is_ssl(&self) -> bool {
        matches!(self, TransportError::Tls(_))
    }
}

/// One HTTP exchange as handed to the transport.
#[derive(Debug, Clone)]
pub struct NetworkRequest {
    pub method: RequestType,
    pub url: Url,
    pub timeout: Duration,
    pub body: Option<Vec<u8>>,
    pub content_type: Option<String>,
    pub ignore_ssl_errors: bool,
    /// DNS servers to resolve with; empty means the system resolver.
    pub dns_servers: Vec<IpAddr>,
}

/// Executes HTTP exchanges.
///
/// Implementations must eventually call `reply.finish(..)`. A sink dropped
/// without an answer reports a transport failure on its own.
pub trait Transport: Send + Sync {
    fn execute(&self, request: NetworkRequest, reply: ReplySink);
}
