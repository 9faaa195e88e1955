//! Refusals returned by model mutations.

use thiserror::Error;

use crate::compiler::findings::FindingCode;
use crate::model::address::AddressError;

/// Why an edit to a domain configuration was refused.
///
/// A refused edit leaves the configuration untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("{kind} name '{name}' is already in use")]
    DuplicateName { kind: &'static str, name: String },

    #[error("invalid {kind} name '{name}': {reason}")]
    InvalidName {
        kind: &'static str,
        name: String,
        reason: &'static str,
    },

    #[error("pool '{name}' does not exist")]
    DanglingReference { name: String },

    #[error("pool '{pool}' is still referenced by {}", referents.join(", "))]
    BlockedRemoval { pool: String, referents: Vec<String> },

    #[error(transparent)]
    MalformedEndpoint(#[from] AddressError),

    #[error("pool '{pool}' already has a server at {address}")]
    DuplicateAddress { pool: String, address: String },

    #[error("'{0}' is not a valid domain name")]
    InvalidDomainSyntax(String),

    #[error("alias '{0}' collides with the primary domain or another alias")]
    AliasCollision(String),

    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("invalid pool option '{option}': {reason}")]
    InvalidOption {
        option: String,
        reason: &'static str,
    },

    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error("index {index} is out of range for {len} entries")]
    IndexOutOfRange { index: usize, len: usize },
}

impl EditError {
    /// Finding code with the same meaning, so refusals and validation
    /// findings can be rendered by one code path.
    pub fn code(&self) -> FindingCode {
        match self {
            EditError::DuplicateName { .. } => FindingCode::DuplicateName,
            EditError::InvalidName { .. } => FindingCode::InvalidName,
            EditError::DanglingReference { .. } => FindingCode::DanglingReference,
            EditError::BlockedRemoval { .. } => FindingCode::BlockedRemoval,
            EditError::MalformedEndpoint(_) => FindingCode::MalformedEndpoint,
            EditError::DuplicateAddress { .. } => FindingCode::DuplicateAddress,
            EditError::InvalidDomainSyntax(_) => FindingCode::InvalidDomainSyntax,
            EditError::AliasCollision(_) => FindingCode::AliasCollision,
            EditError::InvalidPattern { .. } => FindingCode::InvalidPattern,
            EditError::InvalidOption { .. } => FindingCode::InvalidOption,
            EditError::NotFound { .. } | EditError::IndexOutOfRange { .. } => {
                FindingCode::UnknownEntity
            }
        }
    }
}
