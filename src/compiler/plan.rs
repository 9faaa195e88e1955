//! Emission plan: the compiled, render-ready form of a domain configuration.
//!
//! The plan carries every canonical address and the ordered route table, so
//! the render layer never has to re-run validation or the address formatter.

use serde::{Deserialize, Serialize};

use crate::apply::certs::CertificateStore;
use crate::compiler::findings::Finding;
use crate::compiler::validate::validate;
use crate::model::{
    Algorithm, DomainConfig, MatchKind, PoolFeatures, ProtocolMode, RoutingMode, SslMode, Target,
};
use crate::observability::metrics;

static SYSTEM: Target = Target::System;

/// One server line of a pool stanza.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerLine {
    pub name: String,
    /// Canonical address from the formatter.
    pub address: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub extra: String,
}

/// Directive group for one pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStanza {
    pub name: String,
    pub mode: ProtocolMode,
    pub algorithm: Algorithm,
    pub features: PoolFeatures,
    pub servers: Vec<ServerLine>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

/// One entry of the domain's route table, in priority order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "match", rename_all = "snake_case")]
pub enum RouteEntry {
    Rule {
        name: String,
        kind: MatchKind,
        pattern: String,
        target: Target,
        /// Set under SSL passthrough: kept for display, never matches.
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        inert: bool,
    },
    Default {
        target: Target,
    },
}

impl RouteEntry {
    pub fn target(&self) -> &Target {
        match self {
            RouteEntry::Rule { target, .. } | RouteEntry::Default { target } => target,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmissionPlan {
    pub domain: String,
    pub aliases: Vec<String>,
    pub routing_mode: RoutingMode,
    pub ssl_mode: SslMode,
    pub enabled: bool,
    pub pools: Vec<PoolStanza>,
    /// Rules in evaluation order, always terminated by the default entry.
    pub routes: Vec<RouteEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Finding>,
}

impl EmissionPlan {
    pub fn pool(&self, name: &str) -> Option<&PoolStanza> {
        self.pools.iter().find(|p| p.name == name)
    }

    pub fn default_target(&self) -> &Target {
        match self.routes.last() {
            Some(RouteEntry::Default { target }) => target,
            _ => &SYSTEM,
        }
    }

    /// True when any route sends traffic to the system web server.
    pub fn targets_system(&self) -> bool {
        self.routes.iter().any(|r| r.target().is_system())
    }

    /// Rule entries only, without the trailing default.
    pub fn rules(&self) -> impl Iterator<Item = &RouteEntry> {
        self.routes
            .iter()
            .filter(|r| matches!(r, RouteEntry::Rule { .. }))
    }
}

/// Validate `config` and, when no error finding remains, build its plan.
///
/// Warnings travel inside the plan; errors are returned instead of a plan.
pub fn compile(
    config: &DomainConfig,
    certs: &dyn CertificateStore,
) -> Result<EmissionPlan, Vec<Finding>> {
    let report = validate(config, certs);
    metrics::record_findings(&report.findings);
    if !report.ok {
        tracing::info!(
            domain = %config.domain(),
            findings = report.findings.len(),
            "Compile rejected"
        );
        metrics::record_compile(config.domain(), false);
        return Err(report.findings);
    }

    let plan = build(config, report.findings);
    tracing::debug!(
        domain = %plan.domain,
        pools = plan.pools.len(),
        routes = plan.routes.len(),
        warnings = plan.warnings.len(),
        "Compiled domain"
    );
    metrics::record_compile(config.domain(), true);
    Ok(plan)
}

// Only called on validated input, so every address formats.
fn build(config: &DomainConfig, warnings: Vec<Finding>) -> EmissionPlan {
    let pools = config
        .pools()
        .iter()
        .map(|pool| PoolStanza {
            name: pool.name.clone(),
            mode: pool.mode,
            algorithm: pool.algorithm,
            features: pool.features,
            servers: pool
                .servers
                .iter()
                .enumerate()
                .filter_map(|(i, server)| {
                    server.address().ok().map(|address| ServerLine {
                        name: server.effective_name(i),
                        address,
                        extra: server.extra.trim().to_string(),
                    })
                })
                .collect(),
            options: pool.options.iter().map(|o| o.trim().to_string()).collect(),
        })
        .collect();

    // Paths are encrypted under passthrough, so no rule can ever match.
    let inert = config.ssl_mode() == SslMode::Passthrough;

    let mut routes = Vec::new();
    if config.routing_mode() == RoutingMode::RuleBased {
        routes.extend(config.rules().iter().map(|rule| RouteEntry::Rule {
            name: rule.name.clone(),
            kind: rule.kind,
            pattern: rule.pattern.clone(),
            target: rule.target.clone(),
            inert,
        }));
    }
    routes.push(RouteEntry::Default {
        target: config.default_target().clone(),
    });

    EmissionPlan {
        domain: config.domain().to_string(),
        aliases: config.aliases().to_vec(),
        routing_mode: config.routing_mode(),
        ssl_mode: config.ssl_mode(),
        enabled: config.enabled(),
        pools,
        routes,
        warnings,
    }
}
