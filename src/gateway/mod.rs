//! Raw gateway configuration.
//!
//! Reads the gateway-wide configuration file, including sections this
//! engine does not own, so the whole gateway can be visualized.

pub mod parser;

pub use parser::{parse, Acl, GatewayConfig, ParseError, RawServer, Section, SectionKind, UseBackend};
