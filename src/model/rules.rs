//! Routing targets and the ordered rule set.
//!
//! # Responsibilities
//! - Represent a route target as a tagged variant (system fallback or pool)
//! - Keep path rules in evaluation order with unique names
//! - Support explicit reordering (insert at index, move up/down, move to)
//!
//! # Design Decisions
//! - Order is semantic: the first matching rule wins
//! - Omitted rule names are derived from the pattern
//! - Target resolution is checked by the owning `DomainConfig`, which knows
//!   the pools

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::error::EditError;
use crate::model::pool::check_name;

/// Serialized form of [`Target::System`].
pub const SYSTEM_SENTINEL: &str = "__system__";

/// Where a rule or the default route sends traffic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "String", into = "String")]
pub enum Target {
    /// The box's own web server.
    #[default]
    System,
    /// A pool defined in the same domain configuration.
    Pool(String),
}

impl Target {
    pub fn pool(name: impl Into<String>) -> Self {
        Target::Pool(name.into())
    }

    pub fn pool_name(&self) -> Option<&str> {
        match self {
            Target::System => None,
            Target::Pool(name) => Some(name),
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Target::System)
    }

    /// True when this target names `pool`.
    pub fn points_to(&self, pool: &str) -> bool {
        self.pool_name() == Some(pool)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::System => f.write_str("system"),
            Target::Pool(name) => f.write_str(name),
        }
    }
}

impl TryFrom<String> for Target {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let value = value.trim();
        if value.is_empty() {
            return Err("route target must not be empty".to_string());
        }
        if value == SYSTEM_SENTINEL {
            Ok(Target::System)
        } else {
            Ok(Target::Pool(value.to_string()))
        }
    }
}

impl From<Target> for String {
    fn from(target: Target) -> Self {
        match target {
            Target::System => SYSTEM_SENTINEL.to_string(),
            Target::Pool(name) => name,
        }
    }
}

/// How a rule's pattern is compared to the request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Prefix,
    Suffix,
    Exact,
    Regex,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::Prefix => "prefix",
            MatchKind::Suffix => "suffix",
            MatchKind::Exact => "exact",
            MatchKind::Regex => "regex",
        }
    }
}

/// A single path rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRule {
    #[serde(default)]
    pub name: String,
    #[serde(alias = "condition")]
    pub kind: MatchKind,
    pub pattern: String,
    #[serde(alias = "backend")]
    pub target: Target,
}

/// Input for adding or replacing a rule; `name` may be omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    #[serde(default)]
    pub name: Option<String>,
    pub kind: MatchKind,
    pub pattern: String,
    pub target: Target,
}

impl RuleSpec {
    pub fn new(kind: MatchKind, pattern: impl Into<String>, target: Target) -> Self {
        Self {
            name: None,
            kind,
            pattern: pattern.into(),
            target,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Check that a pattern is usable for its match kind.
pub fn check_pattern(kind: MatchKind, pattern: &str) -> Result<(), EditError> {
    if pattern.is_empty() {
        return Err(EditError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: "pattern must not be empty".to_string(),
        });
    }
    if kind == MatchKind::Regex {
        regex::Regex::new(pattern).map_err(|e| EditError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
    }
    Ok(())
}

/// Derive a rule name from its pattern, e.g. `/api/v1` becomes `path_api_v1`.
pub fn derive_rule_name(pattern: &str) -> String {
    let mut slug = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    let slug = slug.trim_matches('_');
    if slug.is_empty() {
        "path_root".to_string()
    } else {
        format!("path_{}", slug)
    }
}

/// Ordered list of routing rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: Vec<RoutingRule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoutingRule> {
        self.rules.iter()
    }

    pub fn get(&self, name: &str) -> Option<&RoutingRule> {
        self.rules.iter().find(|r| r.name == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.rules.iter().position(|r| r.name == name)
    }

    /// Names of rules that target `pool`, in order.
    pub fn referencing(&self, pool: &str) -> Vec<&str> {
        self.rules
            .iter()
            .filter(|r| r.target.points_to(pool))
            .map(|r| r.name.as_str())
            .collect()
    }

    /// Turn a spec into a rule, deriving the name when omitted. `skip` is the
    /// index of a rule being replaced, which may keep its own name.
    pub(crate) fn materialize(
        &self,
        spec: RuleSpec,
        skip: Option<usize>,
    ) -> Result<RoutingRule, EditError> {
        check_pattern(spec.kind, &spec.pattern)?;
        let taken = |candidate: &str| {
            self.rules
                .iter()
                .enumerate()
                .any(|(i, r)| Some(i) != skip && r.name == candidate)
        };

        let name = match spec.name.map(|n| n.trim().to_string()) {
            Some(name) if !name.is_empty() => {
                check_name("rule", &name)?;
                if taken(&name) {
                    return Err(EditError::DuplicateName { kind: "rule", name });
                }
                name
            }
            _ => {
                let base = derive_rule_name(&spec.pattern);
                let mut candidate = base.clone();
                let mut n = 2;
                while taken(&candidate) {
                    candidate = format!("{}_{}", base, n);
                    n += 1;
                }
                candidate
            }
        };

        Ok(RoutingRule {
            name,
            kind: spec.kind,
            pattern: spec.pattern,
            target: spec.target,
        })
    }

    pub(crate) fn insert(&mut self, index: usize, rule: RoutingRule) -> Result<(), EditError> {
        if index > self.rules.len() {
            return Err(EditError::IndexOutOfRange {
                index,
                len: self.rules.len(),
            });
        }
        self.rules.insert(index, rule);
        Ok(())
    }

    pub(crate) fn push(&mut self, rule: RoutingRule) {
        self.rules.push(rule);
    }

    pub(crate) fn replace(&mut self, index: usize, rule: RoutingRule) {
        self.rules[index] = rule;
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<RoutingRule> {
        let index = self.position(name)?;
        Some(self.rules.remove(index))
    }

    /// Move the named rule to `to`, shifting the others.
    pub(crate) fn move_to(&mut self, name: &str, to: usize) -> Result<(), EditError> {
        let from = self.position(name).ok_or_else(|| EditError::NotFound {
            kind: "rule",
            name: name.to_string(),
        })?;
        if to >= self.rules.len() {
            return Err(EditError::IndexOutOfRange {
                index: to,
                len: self.rules.len(),
            });
        }
        let rule = self.rules.remove(from);
        self.rules.insert(to, rule);
        Ok(())
    }

    pub(crate) fn retarget(&mut self, from: &str, to: &str) {
        for rule in self.rules.iter_mut().filter(|r| r.target.points_to(from)) {
            rule.target = Target::pool(to);
        }
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a RoutingRule;
    type IntoIter = std::slice::Iter<'a, RoutingRule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_serde() {
        let t: Target = serde_json::from_str("\"__system__\"").unwrap();
        assert_eq!(t, Target::System);
        let t: Target = serde_json::from_str("\"api_pool\"").unwrap();
        assert_eq!(t, Target::pool("api_pool"));
        assert_eq!(serde_json::to_string(&Target::System).unwrap(), "\"__system__\"");
        assert!(serde_json::from_str::<Target>("\"\"").is_err());
    }

    #[test]
    fn test_derive_rule_name() {
        assert_eq!(derive_rule_name("/api"), "path_api");
        assert_eq!(derive_rule_name("/API/v1/"), "path_api_v1");
        assert_eq!(derive_rule_name("/"), "path_root");
        assert_eq!(derive_rule_name(".php"), "path_php");
    }

    #[test]
    fn test_materialize_derives_unique_names() {
        let mut set = RuleSet::new();
        let first = set
            .materialize(RuleSpec::new(MatchKind::Prefix, "/api", Target::System), None)
            .unwrap();
        set.insert(0, first).unwrap();
        let second = set
            .materialize(RuleSpec::new(MatchKind::Exact, "/api", Target::System), None)
            .unwrap();
        assert_eq!(second.name, "path_api_2");
    }

    #[test]
    fn test_materialize_rejects_duplicate_explicit_name() {
        let mut set = RuleSet::new();
        let rule = set
            .materialize(
                RuleSpec::new(MatchKind::Prefix, "/a", Target::System).named("r"),
                None,
            )
            .unwrap();
        set.insert(0, rule).unwrap();
        let err = set
            .materialize(
                RuleSpec::new(MatchKind::Prefix, "/b", Target::System).named("r"),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, EditError::DuplicateName { kind: "rule", .. }));
        // Replacing the rule at index 0 may keep its own name.
        assert!(set
            .materialize(
                RuleSpec::new(MatchKind::Prefix, "/b", Target::System).named("r"),
                Some(0),
            )
            .is_ok());
    }

    #[test]
    fn test_check_pattern() {
        assert!(check_pattern(MatchKind::Prefix, "").is_err());
        assert!(check_pattern(MatchKind::Regex, "^/v[0-9]+/").is_ok());
        assert!(check_pattern(MatchKind::Regex, "(unclosed").is_err());
    }

    #[test]
    fn test_move_to() {
        let mut set = RuleSet::new();
        for p in ["/a", "/b", "/c"] {
            let rule = set
                .materialize(RuleSpec::new(MatchKind::Prefix, p, Target::System), None)
                .unwrap();
            let end = set.len();
            set.insert(end, rule).unwrap();
        }
        set.move_to("path_c", 0).unwrap();
        let order: Vec<&str> = set.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(order, vec!["path_c", "path_a", "path_b"]);
        assert!(set.move_to("path_a", 3).is_err());
    }
}
