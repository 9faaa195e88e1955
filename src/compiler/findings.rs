//! Validation findings.
//!
//! A finding is data, not an error: the validator always returns a list of
//! findings, and callers render them inline next to the pool, rule or field
//! named by `path`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Taxonomy shared by validation findings and refused edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FindingCode {
    MalformedEndpoint,
    DuplicateName,
    DanglingReference,
    EmptyPool,
    BlockedRemoval,
    InvalidDomainSyntax,
    AliasCollision,
    #[serde(rename = "SSLModeConflict")]
    SslModeConflict,
    /// Something references a pool but the domain has none.
    MissingPool,
    /// Two servers of one pool resolve to the same address.
    DuplicateAddress,
    InvalidName,
    InvalidPattern,
    /// A verbatim pool directive that is blank or spans lines.
    InvalidOption,
    /// A path rule that cannot match under SSL passthrough.
    InertRule,
    UnknownEntity,
}

impl FindingCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingCode::MalformedEndpoint => "MalformedEndpoint",
            FindingCode::DuplicateName => "DuplicateName",
            FindingCode::DanglingReference => "DanglingReference",
            FindingCode::EmptyPool => "EmptyPool",
            FindingCode::BlockedRemoval => "BlockedRemoval",
            FindingCode::InvalidDomainSyntax => "InvalidDomainSyntax",
            FindingCode::AliasCollision => "AliasCollision",
            FindingCode::SslModeConflict => "SSLModeConflict",
            FindingCode::MissingPool => "MissingPool",
            FindingCode::DuplicateAddress => "DuplicateAddress",
            FindingCode::InvalidName => "InvalidName",
            FindingCode::InvalidPattern => "InvalidPattern",
            FindingCode::InvalidOption => "InvalidOption",
            FindingCode::InertRule => "InertRule",
            FindingCode::UnknownEntity => "UnknownEntity",
        }
    }
}

impl fmt::Display for FindingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Blocks compilation.
    Error,
    /// Reported alongside a successful compile.
    Warning,
}

/// One violation, located by a path such as `pools[api].servers[0].host`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub code: FindingCode,
    pub severity: Severity,
    pub message: String,
    pub path: String,
}

impl Finding {
    pub fn error(code: FindingCode, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: Severity::Error,
            message: message.into(),
            path: path.into(),
        }
    }

    pub fn warning(code: FindingCode, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: Severity::Warning,
            message: message.into(),
            path: path.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.path, self.message)
    }
}

/// Path builders, kept in one place so paths stay consistent.
pub mod path {
    pub const DOMAIN: &str = "domain";
    pub const DEFAULT_TARGET: &str = "default_target";
    pub const SSL_MODE: &str = "ssl_mode";

    pub fn alias(index: usize) -> String {
        format!("aliases[{}]", index)
    }

    pub fn pool(name: &str) -> String {
        format!("pools[{}]", name)
    }

    pub fn pool_field(name: &str, field: &str) -> String {
        format!("pools[{}].{}", name, field)
    }

    pub fn server(pool: &str, index: usize) -> String {
        format!("pools[{}].servers[{}]", pool, index)
    }

    pub fn server_field(pool: &str, index: usize, field: &str) -> String {
        format!("pools[{}].servers[{}].{}", pool, index, field)
    }

    pub fn pool_option(pool: &str, index: usize) -> String {
        format!("pools[{}].options[{}]", pool, index)
    }

    pub fn rule(name: &str) -> String {
        format!("rules[{}]", name)
    }

    pub fn rule_field(name: &str, field: &str) -> String {
        format!("rules[{}].{}", name, field)
    }
}
