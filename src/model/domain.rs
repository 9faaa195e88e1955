//! Domain configuration: the owned model every edit goes through.
//!
//! # Responsibilities
//! - Aggregate domain names, routing mode, pools, rules, default target and
//!   SSL mode
//! - Refuse edits that would break a referential invariant
//! - Cascade pool renames atomically across rules and the default target
//! - Return the live findings list after every accepted edit
//!
//! # Design Decisions
//! - Every check happens before the first write, so a refused edit leaves
//!   the configuration exactly as it was
//! - Names are case-folded to lowercase on the way in

use serde::{Deserialize, Serialize};

use crate::compiler::findings::Finding;
use crate::compiler::validate;
use crate::model::error::EditError;
use crate::model::pool::{
    check_name, check_option, Algorithm, BackendPool, PoolFeatures, PoolStore, ProtocolMode, ServerEndpoint,
};
use crate::model::rules::{RoutingRule, RuleSet, RuleSpec, Target};

/// Whether the domain routes everything to one target or evaluates rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RoutingMode {
    #[default]
    #[serde(alias = "simple")]
    Single,
    #[serde(alias = "advanced", alias = "rule_based")]
    RuleBased,
}

/// How the gateway treats TLS for this domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SslMode {
    /// Encrypted bytes are forwarded untouched; paths are not visible.
    Passthrough,
    /// The gateway decrypts and routes on HTTP data.
    #[serde(alias = "termination")]
    Terminate,
    #[default]
    None,
}

impl SslMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SslMode::Passthrough => "passthrough",
            SslMode::Terminate => "terminate",
            SslMode::None => "none",
        }
    }
}

/// Partial update of a pool's settings; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolUpdate {
    pub name: Option<String>,
    pub mode: Option<ProtocolMode>,
    pub algorithm: Option<Algorithm>,
    pub features: Option<PoolFeatures>,
    pub options: Option<Vec<String>>,
}

/// Root entity: one public domain attached to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainConfig {
    domain: String,

    #[serde(default)]
    aliases: Vec<String>,

    #[serde(default)]
    routing_mode: RoutingMode,

    #[serde(default, alias = "default_backend")]
    default_target: Target,

    #[serde(default)]
    ssl_mode: SslMode,

    #[serde(default = "default_enabled")]
    enabled: bool,

    #[serde(default, alias = "backends")]
    pools: PoolStore,

    #[serde(default, alias = "acl_rules")]
    rules: RuleSet,
}

fn default_enabled() -> bool {
    true
}

/// Result type of every accepted edit: the findings after the edit.
pub type EditResult = Result<Vec<Finding>, EditError>;

impl DomainConfig {
    /// Create an empty configuration routing to the system web server.
    pub fn new(domain: &str) -> Result<Self, EditError> {
        let domain = normalize_hostname(domain);
        if !is_valid_hostname(&domain) {
            return Err(EditError::InvalidDomainSyntax(domain));
        }
        Ok(Self {
            domain,
            aliases: Vec::new(),
            routing_mode: RoutingMode::default(),
            default_target: Target::System,
            ssl_mode: SslMode::default(),
            enabled: true,
            pools: PoolStore::new(),
            rules: RuleSet::new(),
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn routing_mode(&self) -> RoutingMode {
        self.routing_mode
    }

    pub fn default_target(&self) -> &Target {
        &self.default_target
    }

    pub fn ssl_mode(&self) -> SslMode {
        self.ssl_mode
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn pools(&self) -> &PoolStore {
        &self.pools
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Current findings without consulting the certificate collaborator.
    pub fn findings(&self) -> Vec<Finding> {
        validate::validate_structure(self).findings
    }

    /// Bring a configuration read from a file into canonical form: lowercase
    /// names, derived rule names, positional server names.
    pub fn normalize(&mut self) {
        self.domain = normalize_hostname(&self.domain);
        for alias in &mut self.aliases {
            *alias = normalize_hostname(alias);
        }

        let mut named = RuleSet::new();
        for rule in self.rules.iter() {
            let spec = RuleSpec {
                name: Some(rule.name.clone()).filter(|n| !n.trim().is_empty()),
                kind: rule.kind,
                pattern: rule.pattern.clone(),
                target: rule.target.clone(),
            };
            // Rules the set refuses keep their raw form so the validator can
            // report them.
            let rule = named.materialize(spec, None).unwrap_or_else(|_| rule.clone());
            named.push(rule);
        }
        self.rules = named;

        let names: Vec<String> = self.pools.names().iter().map(|s| s.to_string()).collect();
        for name in names {
            if let Some(pool) = self.pools.get_mut(&name) {
                for (i, server) in pool.servers.iter_mut().enumerate() {
                    if server.name.trim().is_empty() {
                        server.name = server.effective_name(i);
                    }
                }
                for option in &mut pool.options {
                    *option = option.trim().to_string();
                }
            }
        }
    }

    // ----- domain names -----

    pub fn add_alias(&mut self, alias: &str) -> EditResult {
        let alias = normalize_hostname(alias);
        if !is_valid_hostname(&alias) {
            return Err(EditError::InvalidDomainSyntax(alias));
        }
        if alias == self.domain || self.aliases.contains(&alias) {
            return Err(EditError::AliasCollision(alias));
        }
        tracing::debug!(domain = %self.domain, alias = %alias, "Alias added");
        self.aliases.push(alias);
        Ok(self.findings())
    }

    pub fn remove_alias(&mut self, alias: &str) -> EditResult {
        let alias = normalize_hostname(alias);
        let index = self
            .aliases
            .iter()
            .position(|a| *a == alias)
            .ok_or_else(|| EditError::NotFound {
                kind: "alias",
                name: alias.clone(),
            })?;
        self.aliases.remove(index);
        Ok(self.findings())
    }

    // ----- top-level settings -----

    pub fn set_routing_mode(&mut self, mode: RoutingMode) -> Vec<Finding> {
        self.routing_mode = mode;
        self.findings()
    }

    pub fn set_ssl_mode(&mut self, mode: SslMode) -> Vec<Finding> {
        self.ssl_mode = mode;
        self.findings()
    }

    pub fn set_enabled(&mut self, enabled: bool) -> Vec<Finding> {
        self.enabled = enabled;
        self.findings()
    }

    pub fn set_default_target(&mut self, target: Target) -> EditResult {
        self.check_target(&target)?;
        self.default_target = target;
        Ok(self.findings())
    }

    // ----- pools -----

    pub fn add_pool(&mut self, pool: BackendPool) -> EditResult {
        for option in &pool.options {
            check_option(option)?;
        }
        // Servers are re-added one by one so each passes the same checks as
        // add_endpoint.
        let mut checked = BackendPool {
            servers: Vec::with_capacity(pool.servers.len()),
            options: pool.options.iter().map(|o| o.trim().to_string()).collect(),
            ..pool.clone()
        };
        for server in pool.servers {
            let mut server = server;
            if server.name.trim().is_empty() {
                server.name = checked.next_server_name();
            }
            checked.check_server(&server, None)?;
            checked.servers.push(server);
        }
        let pool = checked;
        let name = pool.name.clone();
        self.pools.insert(pool)?;
        tracing::debug!(domain = %self.domain, pool = %name, "Pool added");
        Ok(self.findings())
    }

    /// Update a pool's settings. A new name cascades to every reference.
    pub fn update_pool(&mut self, name: &str, update: PoolUpdate) -> EditResult {
        if !self.pools.contains(name) {
            return Err(self.unknown_pool(name));
        }
        if let Some(new_name) = update.name.as_deref().filter(|n| *n != name) {
            self.check_rename(new_name)?;
        }
        for option in update.options.iter().flatten() {
            check_option(option)?;
        }

        let pool = self.pools.get_mut(name).ok_or_else(|| EditError::NotFound {
            kind: "pool",
            name: name.to_string(),
        })?;
        if let Some(mode) = update.mode {
            pool.mode = mode;
        }
        if let Some(algorithm) = update.algorithm {
            pool.algorithm = algorithm;
        }
        if let Some(features) = update.features {
            pool.features = features;
        }
        if let Some(options) = update.options {
            pool.options = options.into_iter().map(|o| o.trim().to_string()).collect();
        }
        if let Some(new_name) = update.name.filter(|n| n != name) {
            self.apply_rename(name, &new_name);
        }
        Ok(self.findings())
    }

    /// Rename a pool, rewriting every rule target and the default target
    /// that pointed at the old name.
    pub fn rename_pool(&mut self, from: &str, to: &str) -> EditResult {
        if !self.pools.contains(from) {
            return Err(self.unknown_pool(from));
        }
        if from != to {
            self.check_rename(to)?;
            self.apply_rename(from, to);
        }
        Ok(self.findings())
    }

    /// Remove a pool. Refused while any rule or the default target uses it.
    pub fn remove_pool(&mut self, name: &str) -> EditResult {
        if !self.pools.contains(name) {
            return Err(self.unknown_pool(name));
        }
        let referents = self.referents(name);
        if !referents.is_empty() {
            tracing::debug!(
                domain = %self.domain,
                pool = %name,
                referents = ?referents,
                "Pool removal blocked"
            );
            return Err(EditError::BlockedRemoval {
                pool: name.to_string(),
                referents,
            });
        }
        self.pools.remove(name);
        tracing::debug!(domain = %self.domain, pool = %name, "Pool removed");
        Ok(self.findings())
    }

    /// Everything that points at `pool`: `default_target` and `rules[<name>]`.
    pub fn referents(&self, pool: &str) -> Vec<String> {
        let mut referents = Vec::new();
        if self.default_target.points_to(pool) {
            referents.push("default_target".to_string());
        }
        referents.extend(
            self.rules
                .referencing(pool)
                .into_iter()
                .map(|r| format!("rules[{}]", r)),
        );
        referents
    }

    fn check_rename(&self, to: &str) -> Result<(), EditError> {
        check_name("pool", to)?;
        if self.pools.contains(to) {
            return Err(EditError::DuplicateName {
                kind: "pool",
                name: to.to_string(),
            });
        }
        Ok(())
    }

    // Infallible once check_rename passed: pool, rules and default move together.
    fn apply_rename(&mut self, from: &str, to: &str) {
        if let Some(pool) = self.pools.get_mut(from) {
            pool.name = to.to_string();
        }
        self.rules.retarget(from, to);
        if self.default_target.points_to(from) {
            self.default_target = Target::pool(to);
        }
        tracing::info!(domain = %self.domain, from = %from, to = %to, "Pool renamed");
    }

    // ----- endpoints -----

    pub fn add_endpoint(&mut self, pool: &str, server: ServerEndpoint) -> EditResult {
        let target = self.pools.get_mut(pool).ok_or_else(|| EditError::NotFound {
            kind: "pool",
            name: pool.to_string(),
        })?;
        let mut server = server;
        if server.name.trim().is_empty() {
            server.name = target.next_server_name();
        }
        target.check_server(&server, None)?;
        target.servers.push(server);
        Ok(self.findings())
    }

    pub fn update_endpoint(&mut self, pool: &str, index: usize, server: ServerEndpoint) -> EditResult {
        let target = self.pools.get_mut(pool).ok_or_else(|| EditError::NotFound {
            kind: "pool",
            name: pool.to_string(),
        })?;
        if index >= target.servers.len() {
            return Err(EditError::IndexOutOfRange {
                index,
                len: target.servers.len(),
            });
        }
        let mut server = server;
        if server.name.trim().is_empty() {
            server.name = target.servers[index].effective_name(index);
        }
        target.check_server(&server, Some(index))?;
        target.servers[index] = server;
        Ok(self.findings())
    }

    /// Remove a server. Emptying a pool is allowed while editing; the
    /// validator reports it.
    pub fn remove_endpoint(&mut self, pool: &str, index: usize) -> EditResult {
        let target = self.pools.get_mut(pool).ok_or_else(|| EditError::NotFound {
            kind: "pool",
            name: pool.to_string(),
        })?;
        if index >= target.servers.len() {
            return Err(EditError::IndexOutOfRange {
                index,
                len: target.servers.len(),
            });
        }
        target.servers.remove(index);
        Ok(self.findings())
    }

    // ----- rules -----

    pub fn add_rule(&mut self, spec: RuleSpec) -> EditResult {
        let end = self.rules.len();
        self.insert_rule_at(end, spec)
    }

    pub fn insert_rule_at(&mut self, index: usize, spec: RuleSpec) -> EditResult {
        self.check_target(&spec.target)?;
        if index > self.rules.len() {
            return Err(EditError::IndexOutOfRange {
                index,
                len: self.rules.len(),
            });
        }
        let rule = self.rules.materialize(spec, None)?;
        tracing::debug!(domain = %self.domain, rule = %rule.name, index, "Rule inserted");
        self.rules.insert(index, rule)?;
        Ok(self.findings())
    }

    /// Replace the named rule in place, keeping its position.
    pub fn update_rule(&mut self, name: &str, spec: RuleSpec) -> EditResult {
        let index = self.rule_index(name)?;
        self.check_target(&spec.target)?;
        let spec = RuleSpec {
            name: spec.name.or_else(|| Some(name.to_string())),
            ..spec
        };
        let rule: RoutingRule = self.rules.materialize(spec, Some(index))?;
        self.rules.replace(index, rule);
        Ok(self.findings())
    }

    pub fn remove_rule(&mut self, name: &str) -> EditResult {
        self.rules.remove(name).ok_or_else(|| EditError::NotFound {
            kind: "rule",
            name: name.to_string(),
        })?;
        Ok(self.findings())
    }

    pub fn move_rule(&mut self, name: &str, to: usize) -> EditResult {
        self.rules.move_to(name, to)?;
        Ok(self.findings())
    }

    /// Move a rule one slot earlier; a no-op at the top.
    pub fn move_rule_up(&mut self, name: &str) -> EditResult {
        let index = self.rule_index(name)?;
        self.move_rule(name, index.saturating_sub(1))
    }

    /// Move a rule one slot later; a no-op at the bottom.
    pub fn move_rule_down(&mut self, name: &str) -> EditResult {
        let index = self.rule_index(name)?;
        let last = self.rules.len().saturating_sub(1);
        self.move_rule(name, (index + 1).min(last))
    }

    fn rule_index(&self, name: &str) -> Result<usize, EditError> {
        self.rules.position(name).ok_or_else(|| EditError::NotFound {
            kind: "rule",
            name: name.to_string(),
        })
    }

    fn check_target(&self, target: &Target) -> Result<(), EditError> {
        match target {
            Target::Pool(name) if !self.pools.contains(name) => Err(EditError::DanglingReference {
                name: name.clone(),
            }),
            _ => Ok(()),
        }
    }

    fn unknown_pool(&self, name: &str) -> EditError {
        EditError::NotFound {
            kind: "pool",
            name: name.to_string(),
        }
    }
}

/// Lowercase and strip surrounding whitespace and a trailing dot.
pub fn normalize_hostname(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// RFC 1123 host syntax: 1-63 character labels of letters, digits and
/// hyphens, no leading or trailing hyphen, at most 253 characters, at least
/// two labels and an alphabetic top-level label.
pub fn is_valid_hostname(name: &str) -> bool {
    if name.is_empty() || name.len() > 253 {
        return false;
    }
    let labels: Vec<&str> = name.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    let label_ok = |label: &&str| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    };
    if !labels.iter().all(label_ok) {
        return false;
    }
    labels
        .last()
        .is_some_and(|tld| tld.chars().all(|c| c.is_ascii_alphabetic()))
}
