//! Ordered validation of a domain configuration.
//!
//! Checks run class by class. The first class that produces an error stops
//! the run, but every finding inside that class is reported:
//!
//! 1. domain-name syntax (primary and aliases)
//! 2. alias uniqueness
//! 3. pool presence
//! 4. pools and their endpoints
//! 5. rules and references
//! 6. SSL consistency (errors) and inert rules (warnings)

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::apply::certs::CertificateStore;
use crate::compiler::findings::{path, Finding, FindingCode};
use crate::model::domain::{is_valid_hostname, normalize_hostname};
use crate::model::pool::{check_name, check_option};
use crate::model::rules::check_pattern;
use crate::model::{DomainConfig, EditError, ProtocolMode, RoutingMode, SslMode, Target};

/// Outcome of a validation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// True when no finding is an error; warnings do not block.
    pub ok: bool,
    pub findings: Vec<Finding>,
}

impl ValidationReport {
    fn new(findings: Vec<Finding>) -> Self {
        Self {
            ok: !findings.iter().any(Finding::is_error),
            findings,
        }
    }

    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| !f.is_error())
    }
}

type Check = fn(&DomainConfig) -> Vec<Finding>;

const STRUCTURAL_CHECKS: [Check; 5] = [
    check_domain_names,
    check_aliases,
    check_pool_presence,
    check_pools,
    check_rules,
];

/// Full validation, consulting `certs` for SSL termination.
pub fn validate(config: &DomainConfig, certs: &dyn CertificateStore) -> ValidationReport {
    run(config, Some(certs))
}

/// Validation without the certificate lookup. Used for the live findings
/// returned after every edit.
pub fn validate_structure(config: &DomainConfig) -> ValidationReport {
    run(config, None)
}

fn run(config: &DomainConfig, certs: Option<&dyn CertificateStore>) -> ValidationReport {
    let mut findings = Vec::new();
    for check in STRUCTURAL_CHECKS {
        let class = check(config);
        let failed = class.iter().any(Finding::is_error);
        findings.extend(class);
        if failed {
            return ValidationReport::new(findings);
        }
    }
    findings.extend(check_ssl(config, certs));
    ValidationReport::new(findings)
}

fn from_edit(err: EditError, path: String) -> Finding {
    Finding::error(err.code(), path, err.to_string())
}

fn check_domain_names(config: &DomainConfig) -> Vec<Finding> {
    let mut findings = Vec::new();
    let primary = normalize_hostname(config.domain());
    if !is_valid_hostname(&primary) {
        findings.push(from_edit(
            EditError::InvalidDomainSyntax(config.domain().to_string()),
            path::DOMAIN.to_string(),
        ));
    }
    for (i, alias) in config.aliases().iter().enumerate() {
        if !is_valid_hostname(&normalize_hostname(alias)) {
            findings.push(from_edit(
                EditError::InvalidDomainSyntax(alias.clone()),
                path::alias(i),
            ));
        }
    }
    findings
}

fn check_aliases(config: &DomainConfig) -> Vec<Finding> {
    let primary = normalize_hostname(config.domain());
    let mut seen = HashSet::new();
    let mut findings = Vec::new();
    for (i, alias) in config.aliases().iter().enumerate() {
        let alias = normalize_hostname(alias);
        if alias == primary || !seen.insert(alias.clone()) {
            findings.push(from_edit(EditError::AliasCollision(alias), path::alias(i)));
        }
    }
    findings
}

fn check_pool_presence(config: &DomainConfig) -> Vec<Finding> {
    if !config.pools().is_empty() {
        return Vec::new();
    }
    let mut findings = Vec::new();
    if let Target::Pool(name) = config.default_target() {
        findings.push(Finding::error(
            FindingCode::MissingPool,
            path::DEFAULT_TARGET,
            format!("default target '{}' needs a pool but none are defined", name),
        ));
    }
    for rule in config.rules() {
        if let Target::Pool(name) = &rule.target {
            findings.push(Finding::error(
                FindingCode::MissingPool,
                path::rule_field(&rule.name, "target"),
                format!(
                    "rule '{}' targets '{}' but no pools are defined",
                    rule.name, name
                ),
            ));
        }
    }
    findings
}

fn check_pools(config: &DomainConfig) -> Vec<Finding> {
    let mut findings = Vec::new();
    let mut names = HashSet::new();

    for pool in config.pools() {
        if let Err(err) = check_name("pool", &pool.name) {
            findings.push(from_edit(err, path::pool(&pool.name)));
        }
        if !names.insert(pool.name.as_str()) {
            findings.push(from_edit(
                EditError::DuplicateName {
                    kind: "pool",
                    name: pool.name.clone(),
                },
                path::pool(&pool.name),
            ));
        }
        for (i, option) in pool.options.iter().enumerate() {
            if let Err(err) = check_option(option) {
                findings.push(from_edit(err, path::pool_option(&pool.name, i)));
            }
        }
        if pool.servers.is_empty() {
            findings.push(Finding::error(
                FindingCode::EmptyPool,
                path::pool(&pool.name),
                format!("pool '{}' has no servers", pool.name),
            ));
            continue;
        }

        let mut server_names = HashSet::new();
        let mut addresses = HashSet::new();
        for (i, server) in pool.servers.iter().enumerate() {
            let name = server.effective_name(i);
            if let Err(err) = check_name("server", &name) {
                findings.push(from_edit(err, path::server_field(&pool.name, i, "name")));
            }
            if !server_names.insert(name.clone()) {
                findings.push(from_edit(
                    EditError::DuplicateName { kind: "server", name },
                    path::server_field(&pool.name, i, "name"),
                ));
            }
            match server.address() {
                Ok(address) => {
                    if !addresses.insert(address.clone()) {
                        findings.push(from_edit(
                            EditError::DuplicateAddress {
                                pool: pool.name.clone(),
                                address,
                            },
                            path::server(&pool.name, i),
                        ));
                    }
                }
                Err(err) => {
                    let field = err.field();
                    findings.push(from_edit(
                        err.into(),
                        path::server_field(&pool.name, i, field),
                    ));
                }
            }
        }
    }
    findings
}

fn check_rules(config: &DomainConfig) -> Vec<Finding> {
    let mut findings = Vec::new();

    if let Target::Pool(name) = config.default_target() {
        if !config.pools().contains(name) {
            findings.push(Finding::error(
                FindingCode::DanglingReference,
                path::DEFAULT_TARGET,
                format!("default target names unknown pool '{}'", name),
            ));
        }
    }

    let mut names = HashSet::new();
    for (i, rule) in config.rules().iter().enumerate() {
        let rule_path = if rule.name.is_empty() {
            format!("rules[{}]", i)
        } else {
            path::rule(&rule.name)
        };
        if let Err(err) = check_name("rule", &rule.name) {
            findings.push(from_edit(err, rule_path.clone()));
        } else if !names.insert(rule.name.as_str()) {
            findings.push(from_edit(
                EditError::DuplicateName {
                    kind: "rule",
                    name: rule.name.clone(),
                },
                rule_path.clone(),
            ));
        }
        if let Err(err) = check_pattern(rule.kind, &rule.pattern) {
            findings.push(from_edit(err, format!("{}.pattern", rule_path)));
        }
        if let Target::Pool(name) = &rule.target {
            if !config.pools().contains(name) {
                findings.push(Finding::error(
                    FindingCode::DanglingReference,
                    format!("{}.target", rule_path),
                    format!("rule '{}' targets unknown pool '{}'", rule.name, name),
                ));
            }
        }
    }
    findings
}

fn check_ssl(config: &DomainConfig, certs: Option<&dyn CertificateStore>) -> Vec<Finding> {
    let mut findings = Vec::new();
    match config.ssl_mode() {
        SslMode::Terminate => {
            if let Some(certs) = certs {
                if !certs.has_certificate(config.domain()) {
                    findings.push(Finding::error(
                        FindingCode::SslModeConflict,
                        path::SSL_MODE,
                        format!(
                            "SSL termination needs a certificate for '{}' but none is available",
                            config.domain()
                        ),
                    ));
                }
            }
            for pool in config.pools().iter().filter(|p| p.mode == ProtocolMode::Tcp) {
                findings.push(Finding::error(
                    FindingCode::SslModeConflict,
                    path::pool_field(&pool.name, "mode"),
                    format!(
                        "pool '{}' runs in tcp mode but SSL termination requires http",
                        pool.name
                    ),
                ));
            }
        }
        SslMode::Passthrough if config.routing_mode() == RoutingMode::RuleBased => {
            for rule in config.rules() {
                findings.push(Finding::warning(
                    FindingCode::InertRule,
                    path::rule(&rule.name),
                    format!(
                        "rule '{}' cannot match under SSL passthrough; request paths are encrypted",
                        rule.name
                    ),
                ));
            }
        }
        _ => {}
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::certs::StaticCertificates;
    use crate::model::{BackendPool, Endpoint, MatchKind, RuleSpec, ServerEndpoint};

    fn base() -> DomainConfig {
        let mut config = DomainConfig::new("app.example.com").unwrap();
        config.set_routing_mode(RoutingMode::RuleBased);
        config
            .add_pool(
                BackendPool::new("api_pool")
                    .with_server(ServerEndpoint::new(Endpoint::ipv4("127.0.0.1", 3000))),
            )
            .unwrap();
        config
            .add_rule(RuleSpec::new(MatchKind::Prefix, "/api", Target::pool("api_pool")))
            .unwrap();
        config
    }

    fn from_json(json: &str) -> DomainConfig {
        let mut config: DomainConfig = serde_json::from_str(json).unwrap();
        config.normalize();
        config
    }

    #[test]
    fn test_multiline_pool_option() {
        let config = from_json(
            r#"{"domain":"app.example.com","pools":[{"name":"p",
                "options":["http-reuse safe","timeout server 5s\nserver x 10.0.0.9:80"],
                "servers":[{"kind":"ipv4","host":"10.0.0.1","port":80}]}]}"#,
        );
        let report = validate(&config, &StaticCertificates::none());
        assert!(!report.ok);
        let errors: Vec<_> = report.errors().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, FindingCode::InvalidOption);
        assert_eq!(errors[0].path, "pools[p].options[1]");
    }

    #[test]
    fn test_valid_config() {
        let report = validate(&base(), &StaticCertificates::none());
        assert!(report.ok);
        assert!(report.findings.is_empty());
    }

    #[test]
    fn test_all_findings_in_first_failing_class() {
        let config = from_json(
            r#"{
                "domain": "app.example.com",
                "aliases": ["bad_alias.example.com", "-x.example.com"],
                "pools": [{"name": "p", "servers": []}]
            }"#,
        );
        let report = validate_structure(&config);
        assert!(!report.ok);
        assert_eq!(report.findings.len(), 2);
        assert!(report
            .findings
            .iter()
            .all(|f| f.code == FindingCode::InvalidDomainSyntax));
    }

    #[test]
    fn test_alias_collisions() {
        let config = from_json(
            r#"{
                "domain": "app.example.com",
                "aliases": ["www.example.com", "WWW.example.com", "app.example.com"]
            }"#,
        );
        let report = validate_structure(&config);
        let paths: Vec<&str> = report.findings.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["aliases[1]", "aliases[2]"]);
        assert!(report
            .findings
            .iter()
            .all(|f| f.code == FindingCode::AliasCollision));
    }

    #[test]
    fn test_missing_pool() {
        let config = from_json(
            r#"{
                "domain": "app.example.com",
                "routing_mode": "rule-based",
                "default_target": "web"
            }"#,
        );
        let report = validate_structure(&config);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].code, FindingCode::MissingPool);
    }

    #[test]
    fn test_pool_findings() {
        let config = from_json(
            r#"{
                "domain": "app.example.com",
                "pools": [
                    {"name": "empty", "servers": []},
                    {"name": "web", "servers": [
                        {"kind": "ipv4", "host": "10.0.0.1", "port": 80},
                        {"kind": "ipv4", "host": "10.0.0.1", "port": 80},
                        {"kind": "ipv6", "host": "", "port": 80}
                    ]}
                ]
            }"#,
        );
        let report = validate_structure(&config);
        let codes: Vec<FindingCode> = report.findings.iter().map(|f| f.code).collect();
        assert_eq!(
            codes,
            vec![
                FindingCode::EmptyPool,
                FindingCode::DuplicateAddress,
                FindingCode::MalformedEndpoint
            ]
        );
        assert_eq!(report.findings[2].path, "pools[web].servers[2].host");
    }

    #[test]
    fn test_dangling_rule_target() {
        let config = from_json(
            r#"{
                "domain": "app.example.com",
                "routing_mode": "rule-based",
                "pools": [{"name": "api_pool", "servers": [{"kind": "ipv4", "host": "127.0.0.1", "port": 3000}]}],
                "rules": [{"kind": "prefix", "pattern": "/api", "target": "apii_pool"}]
            }"#,
        );
        let report = validate_structure(&config);
        assert_eq!(report.findings.len(), 1);
        let finding = &report.findings[0];
        assert_eq!(finding.code, FindingCode::DanglingReference);
        assert_eq!(finding.path, "rules[path_api].target");
        assert!(finding.message.contains("apii_pool"));
    }

    #[test]
    fn test_invalid_regex_pattern() {
        let config = from_json(
            r#"{
                "domain": "app.example.com",
                "routing_mode": "rule-based",
                "rules": [{"name": "bad", "kind": "regex", "pattern": "(open", "target": "__system__"}]
            }"#,
        );
        let report = validate_structure(&config);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].code, FindingCode::InvalidPattern);
        assert_eq!(report.findings[0].path, "rules[bad].pattern");
    }

    #[test]
    fn test_terminate_needs_certificate() {
        let mut config = base();
        config.set_ssl_mode(SslMode::Terminate);
        let report = validate(&config, &StaticCertificates::none());
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].code, FindingCode::SslModeConflict);
        assert_eq!(report.findings[0].path, "ssl_mode");

        let report = validate(&config, &StaticCertificates::new(["app.example.com"]));
        assert!(report.ok);
    }

    #[test]
    fn test_passthrough_rules_are_warnings() {
        let mut config = base();
        config.set_ssl_mode(SslMode::Passthrough);
        let report = validate(&config, &StaticCertificates::none());
        assert!(report.ok);
        assert_eq!(report.warnings().count(), 1);
        assert_eq!(report.findings[0].code, FindingCode::InertRule);

        config.set_routing_mode(RoutingMode::Single);
        assert!(validate_structure(&config).findings.is_empty());
    }
}
