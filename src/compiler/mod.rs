//! Validator and compiler.
//!
//! # Responsibilities
//! - Decide whether a domain configuration is renderable
//! - Report every violation in the first failing class as a located finding
//! - Produce the ordered emission plan handed to the apply layer
//!
//! # Data Flow
//! ```text
//! DomainConfig ──▶ validate ──▶ findings ──(errors)──▶ rejected
//!                                   │
//!                                   └──(ok)──▶ build ──▶ EmissionPlan
//! ```

pub mod findings;
pub mod plan;
pub mod validate;

use serde::{Deserialize, Serialize};

pub use findings::{Finding, FindingCode, Severity};
pub use plan::{compile, EmissionPlan, PoolStanza, RouteEntry, ServerLine};
pub use validate::{validate, validate_structure, ValidationReport};

/// Serialized answer of a compile request: a plan or the blocking findings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<EmissionPlan>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<Finding>,
}

impl From<Result<EmissionPlan, Vec<Finding>>> for CompileResponse {
    fn from(result: Result<EmissionPlan, Vec<Finding>>) -> Self {
        match result {
            Ok(plan) => Self {
                ok: true,
                plan: Some(plan),
                findings: Vec::new(),
            },
            Err(findings) => Self {
                ok: false,
                plan: None,
                findings,
            },
        }
    }
}
