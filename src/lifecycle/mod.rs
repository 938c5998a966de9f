//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger() → broadcast → dispatcher task and config watcher exit
//!
//! Signals (signals.rs):
//!     SIGINT/SIGTERM → Shutdown::trigger()
//! ```
//!
//! # Design Decisions
//! - Requests still owed a completion at shutdown (queued, waiting on the
//!   resolver, or on the wire) finish with `NetworkError`
//! - One coordinator per process, cloned into every long-running task

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
