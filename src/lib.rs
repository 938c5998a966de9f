//! Failover-aware API request dispatcher for a VPN client.
//!
//! Callers submit requests through [`ServerApi`]. While the VPN is
//! connected they go to the primary hostname. While it is disconnected the
//! dispatcher routes them through a cached alternate hostname, or runs a
//! single failover probe and queues everything else behind it.

// Core
pub mod dispatcher;
pub mod failover;
pub mod request;

// Collaborators
pub mod connect_state;
pub mod net;
pub mod storage;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::ApiConfig;
pub use dispatcher::ServerApi;
pub use lifecycle::Shutdown;
pub use request::{ApiRequest, JsonPayload, Request, RetCode};
