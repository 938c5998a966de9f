//! API request subsystem.
//!
//! # Data Flow
//! ```text
//! Caller builds a Payload (json.rs or its own)
//!     → base.rs wraps it in ApiRequest (result code, output, completion)
//!     → caller keeps Arc<ApiRequest>, dispatcher gets Weak<dyn Request>
//!     → dispatcher calls url()/body() to build the exchange
//!     → dispatcher calls handle() with the response, then notify_finished()
//! ```
//!
//! # Design Decisions
//! - Response formats are opaque to the dispatcher
//! - Result codes (types.rs) are plain values, not errors

pub mod base;
pub mod json;
pub mod types;

pub use base::{ApiRequest, Payload, Request, WeakRequest};
pub use json::JsonPayload;
pub use types::{RequestType, RetCode};
