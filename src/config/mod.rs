//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! service config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!
//! domain files (TOML/JSON)
//!     → loader.rs (parse & normalize)
//!     → compiler (findings or emission plans)
//!
//! On change in the domains directory:
//!     watcher.rs detects change
//!     → loader.rs reloads every domain file
//!     → daemon recompiles, re-applies and swaps the published state
//! ```
//!
//! # Design Decisions
//! - Service config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_domain_file, load_domains, ConfigError};
pub use schema::{GatewayFileConfig, LogFormat, ObservabilityConfig, ServiceConfig};
pub use watcher::DomainWatcher;
