//! Network collaborators.
//!
//! # Data Flow
//! ```text
//! Dispatcher routing:
//!     → reachability.rs (offline? finish with NoNetworkConnection)
//!     → transport.rs NetworkRequest + ReplySink
//!     → http_client.rs executes the exchange on a spawned task
//!     → ReplySink posts ExchangeFinished back to the dispatcher
//! ```
//!
//! # Design Decisions
//! - The dispatcher only sees the `Transport` trait; tests plug in stubs
//! - Timeouts surface as ordinary transport failures

pub mod http_client;
pub mod reachability;
pub mod transport;

pub use http_client::ReqwestTransport;
pub use reachability::{NetworkDetector, NetworkReachability};
pub use transport::{NetworkRequest, Transport, TransportError};
