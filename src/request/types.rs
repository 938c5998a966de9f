//! Request method and result code types.

use std::fmt;

/// HTTP method used for an API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestType {
    Get,
    Post,
    Put,
    Delete,
}

impl RequestType {
    /// Whether the method carries a request body.
    pub fn has_body(&self) -> bool {
        matches!(self, RequestType::Post | RequestType::Put)
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestType::Get => "GET",
            RequestType::Post => "POST",
            RequestType::Put => "PUT",
            RequestType::Delete => "DELETE",
        };
        f.write_str(s)
    }
}

/// Outcome of an API request as seen by its caller.
///
/// The first six variants are produced by the dispatcher itself. `Domain`
/// carries request-specific codes produced by payload parsing; the dispatcher
/// forwards them untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RetCode {
    #[default]
    Success,
    NoNetworkConnection,
    NetworkError,
    SslError,
    /// The response body was not a valid payload for this request.
    IncorrectJson,
    FailoverFailed,
    Domain(u16),
}

impl RetCode {
    /// Only `Success`; domain codes are failures too.
    pub fn is_success(&self) -> bool {
        matches!(self, RetCode::Success)
    }

    /// Short label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            RetCode::Success => "success",
            RetCode::NoNetworkConnection => "no_network_connection",
            RetCode::NetworkError => "network_error",
            RetCode::SslError => "ssl_error",
            RetCode::IncorrectJson => "incorrect_json",
            RetCode::FailoverFailed => "failover_failed",
            RetCode::Domain(_) => "domain",
        }
    }
}

impl fmt::Display for RetCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetCode::Domain(code) => write!(f, "domain({})", code),
            other => f.write_str(other.as_str()),
        }
    }
}
