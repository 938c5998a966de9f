//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ApiConfig (validated)
//!     → ServerApi::spawn builds the dispatcher and collaborators from it
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → watcher.rs keeps RuntimeSettings (ignore_ssl_errors, resolution)
//!       and sends them on mpsc only when they changed
//!     → binary forwards them to the running dispatcher
//! ```
//!
//! # Design Decisions
//! - Only runtime-switchable settings are applied on reload; hostnames and
//!   storage need a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{ApiConfig, ApiSection, FailoverConfig, ObservabilityConfig, StorageConfig, TransportConfig};
pub use validation::{validate_config, ValidationError};
pub use watcher::{ConfigWatcher, RuntimeSettings};
