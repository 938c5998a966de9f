//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher, transport, resolver, storage:
//!     → tracing macros (structured events) → logging.rs subscriber → stdout
//!     → metrics.rs record_* helpers → metrics recorder
//!
//! Consumers:
//!     → Terminal / log collection
//!     → Prometheus scrape (optional exporter)
//! ```
//!
//! # Design Decisions
//! - Log filter comes from `RUST_LOG` first, then config
//! - Metrics are no-ops until a recorder is installed, so library users
//!   and tests pay nothing

pub mod logging;
pub mod metrics;
