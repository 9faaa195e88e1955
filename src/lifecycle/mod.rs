//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → wait_for_shutdown_signal() returns
//!
//! Shutdown (shutdown.rs):
//!     trigger() → admin server drains → watcher loop exits
//! ```
//!
//! # Design Decisions
//! - One broadcast channel fans the stop signal out to every long-running task
//! - The last applied gateway file is left in place on exit

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_shutdown_signal;
