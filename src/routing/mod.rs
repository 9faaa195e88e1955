//! Routing subsystem.
//!
//! Evaluates a compiled route table the way the gateway will, so operators
//! can ask "where does this path go?" before a change is applied.
//!
//! # Data Flow
//! ```text
//! Request path
//!     → router.rs (ordered scan)
//!     → matcher.rs (evaluate one condition)
//!     → Return: first matching rule's target, else the default
//!
//! Route Compilation:
//!     EmissionPlan.routes
//!     → Build one matcher per rule (inert rules never match)
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Tables compiled from plans, immutable at runtime
//! - Deterministic: same input always matches same route
//! - First match wins (rule order)

pub mod matcher;
pub mod router;

pub use matcher::Matcher;
pub use router::RouteTable;
