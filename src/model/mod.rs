//! Domain configuration model.
//!
//! # Responsibilities
//! - Format typed endpoints into canonical gateway addresses
//! - Own the pools and the ordered rule set of one domain
//! - Expose the edit operations, each re-checking referential invariants
//!
//! # Design Decisions
//! - One owned `DomainConfig` is the only way to mutate pools and rules, so
//!   rename cascades and removal guards live in a single place
//! - Route targets are a tagged variant, never a loose string
//! - Edits return the live findings so callers can render inline errors

pub mod address;
pub mod domain;
pub mod error;
pub mod pool;
pub mod rules;

pub use address::{AddressError, Endpoint};
pub use domain::{DomainConfig, EditResult, PoolUpdate, RoutingMode, SslMode};
pub use error::EditError;
pub use pool::{Algorithm, BackendPool, PoolFeatures, PoolStore, ProtocolMode, ServerEndpoint};
pub use rules::{MatchKind, RoutingRule, RuleSet, RuleSpec, Target, SYSTEM_SENTINEL};
