//! `reqwest`-backed transport.
//!
//! # Responsibilities
//! - Execute GET/POST/PUT/DELETE with the per-exchange timeout
//! - Honour the ignore-SSL-errors flag per exchange
//! - Classify failures (TLS, timeout, connect, other)
//!
//! # Design Decisions
//! - Two pooled clients (strict, lenient) instead of one per exchange
//! - Any HTTP status is a completed exchange; the request's own handler
//!   decides what the body means
//! - Resolution goes through the system resolver; `dns_servers` is logged
//!   but not applied by this transport

use std::error::Error as StdError;
use std::time::{Duration, Instant};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;

use crate::dispatcher::events::ReplySink;
use crate::net::transport::{NetworkRequest, Transport, TransportError};
use crate::request::RequestType;

const TLS_MARKERS: [&str; 4] = ["certificate", "tls", "ssl", "handshake"];

/// HTTP transport built on `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    strict: Client,
    lenient: Client,
}

impl ReqwestTransport {
    pub fn new(user_agent: &str) -> Result<Self, reqwest::Error> {
        let strict = Client::builder().user_agent(user_agent).build()?;
        let lenient = Client::builder()
            .user_agent(user_agent)
            .danger_accept_invalid_certs(true)
            .build()?;

        tracing::info!(user_agent = %user_agent, "HTTP transport initialized");
        Ok(Self { strict, lenient })
    }

    async fn perform(client: Client, request: NetworkRequest) -> Result<Vec<u8>, TransportError> {
        let mut builder = match request.method {
            RequestType::Get => client.get(request.url.clone()),
            RequestType::Post => client.post(request.url.clone()),
            RequestType::Put => client.put(request.url.clone()),
            RequestType::Delete => client.delete(request.url.clone()),
        }
        .timeout(request.timeout);

        if let Some(body) = request.body {
            if let Some(content_type) = &request.content_type {
                builder = builder.header(CONTENT_TYPE, content_type.as_str());
            }
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify(e, request.timeout))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify(e, request.timeout))?;

        tracing::trace!(url = %request.url, status = %status, len = bytes.len(), "Exchange completed");
        Ok(bytes.to_vec())
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: NetworkRequest, reply: ReplySink) {
        let client = if request.ignore_ssl_errors {
            self.lenient.clone()
        } else {
            self.strict.clone()
        };
        if !request.dns_servers.is_empty() {
            tracing::debug!(dns_servers = ?request.dns_servers, "Custom DNS servers requested, using system resolver");
        }

        tokio::spawn(async move {
            let start = Instant::now();
            let url = request.url.clone();
            let result = Self::perform(client, request).await;
            if let Err(e) = &result {
                tracing::debug!(url = %url, error = %e, elapsed = ?start.elapsed(), "Exchange failed");
            }
            reply.finish(result);
        });
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> TransportError {
    // Hostnames must not feed the TLS marker match.
    let err = err.without_url();
    if err.is_timeout() {
        return TransportError::Timeout(timeout);
    }
    if is_tls_error(&err) {
        return TransportError::Tls(error_chain(&err));
    }
    if err.is_connect() {
        TransportError::Connect(error_chain(&err))
    } else if err.is_builder() {
        TransportError::InvalidUrl(error_chain(&err))
    } else {
        TransportError::Other(error_chain(&err))
    }
}

fn is_tls_error(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        let msg = e.to_string().to_ascii_lowercase();
        if TLS_MARKERS.iter().any(|marker| msg.contains(marker)) {
            return true;
        }
        current = e.source();
    }
    false
}

fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut current = err.source();
    while let Some(e) = current {
        parts.push(e.to_string());
        current = e.source();
    }
    parts.join(": ")
}
