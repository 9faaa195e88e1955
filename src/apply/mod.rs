//! Apply collaborators and the submit step.
//!
//! # Responsibilities
//! - Look up certificates for SSL termination
//! - Hand compiled plans to the gateway (write file, reload process)
//! - Report compile success and apply success as separate outcomes
//!
//! # Design Decisions
//! - A compiled plan that the gateway refused is `CompiledNotApplied`, never
//!   folded into `Applied` or `Rejected`
//! - Apply failures carry their own error type, distinct from findings

pub mod applier;
pub mod certs;

use serde::Serialize;

pub use applier::{Applier, ApplyError, CommandApplier};
pub use certs::{CertificateStore, DirCertificateStore, StaticCertificates};

use crate::compiler::findings::Finding;
use crate::compiler::plan::{compile, EmissionPlan};
use crate::model::DomainConfig;
use crate::observability::metrics;

/// Result of submitting a draft configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// Validation failed; nothing was sent to the gateway.
    Rejected { findings: Vec<Finding> },
    /// The plan compiled but the gateway did not accept it.
    CompiledNotApplied { plan: EmissionPlan, error: String },
    /// The plan compiled and the gateway reloaded with it.
    Applied { plan: EmissionPlan },
}

impl SubmitOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, SubmitOutcome::Applied { .. })
    }

    pub fn plan(&self) -> Option<&EmissionPlan> {
        match self {
            SubmitOutcome::Rejected { .. } => None,
            SubmitOutcome::CompiledNotApplied { plan, .. } | SubmitOutcome::Applied { plan } => {
                Some(plan)
            }
        }
    }
}

/// Compile `config` and, if it compiles, apply it.
pub async fn submit<A: Applier>(
    config: &DomainConfig,
    certs: &dyn CertificateStore,
    applier: &A,
) -> SubmitOutcome {
    let plan = match compile(config, certs) {
        Ok(plan) => plan,
        Err(findings) => {
            metrics::record_apply("rejected");
            return SubmitOutcome::Rejected { findings };
        }
    };

    match applier.apply(std::slice::from_ref(&plan)).await {
        Ok(()) => {
            metrics::record_apply("applied");
            tracing::info!(domain = %plan.domain, "Submitted and applied");
            SubmitOutcome::Applied { plan }
        }
        Err(e) => {
            metrics::record_apply("failed");
            tracing::warn!(domain = %plan.domain, error = %e, "Compiled but not applied");
            SubmitOutcome::CompiledNotApplied {
                plan,
                error: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::findings::FindingCode;
    use crate::model::BackendPool;

    struct Refusing;

    impl Applier for Refusing {
        async fn apply(&self, _plans: &[EmissionPlan]) -> Result<(), ApplyError> {
            Err(ApplyError::Reload {
                status: "exit status: 1".into(),
                stderr: "config check failed".into(),
            })
        }
    }

    #[tokio::test]
    async fn test_submit_outcomes_are_distinct() {
        let mut config = DomainConfig::new("app.example.com").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let applier = CommandApplier::new(dir.path().join("out.cfg"), Vec::new());

        let outcome = submit(&config, &StaticCertificates::none(), &applier).await;
        assert!(outcome.is_applied());

        let outcome = submit(&config, &StaticCertificates::none(), &Refusing).await;
        assert!(matches!(outcome, SubmitOutcome::CompiledNotApplied { .. }));
        assert!(outcome.plan().is_some());

        config.add_pool(BackendPool::new("empty")).unwrap();
        let outcome = submit(&config, &StaticCertificates::none(), &applier).await;
        match outcome {
            SubmitOutcome::Rejected { findings } => {
                assert_eq!(findings[0].code, FindingCode::EmptyPool)
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }
}
