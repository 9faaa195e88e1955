//! Shared state behind the admin API and the daemon loop.

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Serialize;

use crate::apply::CertificateStore;
use crate::compiler::{compile, EmissionPlan, Finding};
use crate::config::GatewayFileConfig;
use crate::model::DomainConfig;

/// Everything loaded from the domains directory, compiled.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GatewayState {
    pub domains: Vec<DomainConfig>,
    /// Plans of domains that compiled, in domain order.
    pub plans: Vec<EmissionPlan>,
    /// Blocking findings of domains that did not compile.
    pub rejected: BTreeMap<String, Vec<Finding>>,
}

impl GatewayState {
    /// Compile every domain. A rejected domain never blocks the others.
    pub fn build(domains: Vec<DomainConfig>, certs: &dyn CertificateStore) -> Self {
        let mut plans = Vec::with_capacity(domains.len());
        let mut rejected = BTreeMap::new();

        for config in &domains {
            match compile(config, certs) {
                Ok(plan) => plans.push(plan),
                Err(findings) => {
                    tracing::warn!(
                        domain = %config.domain(),
                        errors = findings.len(),
                        "Domain rejected"
                    );
                    rejected.insert(config.domain().to_string(), findings);
                }
            }
        }

        Self {
            domains,
            plans,
            rejected,
        }
    }
}

/// Application state injected into admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub gateway: Arc<ArcSwap<GatewayState>>,
    pub certs: Arc<dyn CertificateStore>,
    /// Bearer key; empty disables authentication.
    pub api_key: Arc<str>,
    /// Live gateway file behind `/admin/layout/gateway`.
    pub gateway_file: Option<Arc<GatewayFileConfig>>,
}

impl AdminState {
    pub fn new(
        gateway: Arc<ArcSwap<GatewayState>>,
        certs: Arc<dyn CertificateStore>,
        api_key: &str,
    ) -> Self {
        Self {
            gateway,
            certs,
            api_key: Arc::from(api_key),
            gateway_file: None,
        }
    }

    pub fn with_gateway_file(mut self, file: GatewayFileConfig) -> Self {
        self.gateway_file = Some(Arc::new(file));
        self
    }
}
