//! Domain routing and backend-pool configuration engine.
//!
//! Editors describe each public domain as a `DomainConfig`: backend pools,
//! ordered routing rules, a default target, routing and SSL modes. The
//! compiler validates a configuration and turns it into an `EmissionPlan`,
//! which the render module writes out as gateway configuration text. The
//! layout engine positions the resulting topology for drawing.

// Domain model and validation
pub mod model;
pub mod compiler;

// Consumers of compiled plans
pub mod render;
pub mod routing;
pub mod gateway;
pub mod layout;
pub mod apply;

// Daemon surfaces
pub mod admin;
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use compiler::{compile, validate, EmissionPlan, Finding, FindingCode, ValidationReport};
pub use config::ServiceConfig;
pub use lifecycle::Shutdown;
pub use model::DomainConfig;
