//! Request abstraction shared by every API call.
//!
//! # Responsibilities
//! - Describe one API call (method, URL for a hostname, body, timeout)
//! - Hold the mutable result code and the parsed output
//! - Fire the completion notification exactly once
//!
//! # Design Decisions
//! - Callers own requests through `Arc`; the dispatcher only keeps `Weak`
//! - Payload-specific behaviour lives behind the `Payload` trait so the
//!   dispatcher never sees response formats
//! - Completion is a `watch` flag so late waiters still observe it

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;
use url::Url;

use crate::request::types::{RequestType, RetCode};

/// Weak handle the dispatcher keeps for a caller-owned request.
pub type WeakRequest = Weak<dyn Request>;

/// One API call as consumed by the dispatcher.
pub trait Request: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    fn request_type(&self) -> RequestType;

    /// Full URL of this call against `hostname`.
    fn url(&self, hostname: &str) -> Result<Url, url::ParseError>;

    fn timeout(&self) -> Duration;

    /// Body sent with POST/PUT.
    fn body(&self) -> Option<Vec<u8>>;

    fn content_type(&self) -> Option<&str>;

    /// Parse a successful response and set the result code accordingly.
    fn handle(&self, data: &[u8]);

    fn ret_code(&self) -> RetCode;

    fn set_ret_code(&self, code: RetCode);

    /// Fire the completion notification. Only the first call has any effect.
    fn notify_finished(&self);

    fn is_write_to_log(&self) -> bool;
}

/// Payload-specific half of a request.
pub trait Payload: Send + Sync + 'static {
    type Output: Send + 'static;

    fn name(&self) -> &str;

    fn request_type(&self) -> RequestType {
        RequestType::Get
    }

    fn url(&self, hostname: &str) -> Result<Url, url::ParseError>;

    fn body(&self) -> Option<Vec<u8>> {
        None
    }

    fn content_type(&self) -> Option<&str> {
        None
    }

    /// Decode a response body, or return the code the request should finish with.
    fn parse(&self, data: &[u8]) -> Result<Self::Output, RetCode>;
}

/// A caller-owned request built from a payload.
pub struct ApiRequest<P: Payload> {
    payload: P,
    timeout: Duration,
    write_to_log: AtomicBool,
    ret_code: Mutex<RetCode>,
    output: Mutex<Option<P::Output>>,
    finished: watch::Sender<bool>,
}

impl<P: Payload> ApiRequest<P> {
    pub fn new(payload: P, timeout: Duration) -> Self {
        let (finished, _) = watch::channel(false);
        Self {
            payload,
            timeout,
            write_to_log: AtomicBool::new(true),
            ret_code: Mutex::new(RetCode::Success),
            output: Mutex::new(None),
            finished,
        }
    }

    /// Suppress failure logging for this request (e.g. periodic pings).
    pub fn set_not_write_to_log(&self) {
        self.write_to_log.store(false, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        *self.finished.borrow()
    }

    /// Wait until the request has finished and return its result code.
    pub async fn wait_finished(&self) -> RetCode {
        let mut rx = self.finished.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|done| *done).await;
        self.ret_code()
    }

    /// Take the parsed output, if the response was decoded successfully.
    pub fn take_output(&self) -> Option<P::Output> {
        lock(&self.output).take()
    }
}

impl<P: Payload> Request for ApiRequest<P> {
    fn name(&self) -> &str {
        self.payload.name()
    }

    fn request_type(&self) -> RequestType {
        self.payload.request_type()
    }

    fn url(&self, hostname: &str) -> Result<Url, url::ParseError> {
        self.payload.url(hostname)
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn body(&self) -> Option<Vec<u8>> {
        self.payload.body()
    }

    fn content_type(&self) -> Option<&str> {
        self.payload.content_type()
    }

    fn handle(&self, data: &[u8]) {
        match self.payload.parse(data) {
            Ok(output) => {
                *lock(&self.output) = Some(output);
                self.set_ret_code(RetCode::Success);
            }
            Err(code) => self.set_ret_code(code),
        }
    }

    fn ret_code(&self) -> RetCode {
        *lock(&self.ret_code)
    }

    fn set_ret_code(&self, code: RetCode) {
        *lock(&self.ret_code) = code;
    }

    fn notify_finished(&self) {
        let first = self.finished.send_if_modified(|done| {
            if *done {
                false
            } else {
                *done = true;
                true
            }
        });
        if !first {
            tracing::warn!(request = %self.name(), "Request finished more than once, ignoring");
        }
    }

    fn is_write_to_log(&self) -> bool {
        self.write_to_log.load(Ordering::Relaxed)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
