//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled matchers in rule order
//! - Look up the target for a request path
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan in rule order; the first match wins
//! - Always answers: the default target ends every table

use crate::compiler::plan::{EmissionPlan, RouteEntry};
use crate::model::Target;
use crate::routing::matcher::{build_matcher, Matcher, NeverMatcher};

#[derive(Debug)]
struct CompiledRoute {
    name: String,
    matcher: Box<dyn Matcher>,
    target: Target,
}

/// Evaluates a domain's routing rules the way the gateway does.
#[derive(Debug)]
pub struct RouteTable {
    domain: String,
    routes: Vec<CompiledRoute>,
    default: Target,
}

impl RouteTable {
    /// Compile the route table of an emission plan. Inert rules are kept
    /// but never match; a pattern that fails to compile behaves the same.
    pub fn from_plan(plan: &EmissionPlan) -> Self {
        let mut routes = Vec::new();
        for entry in &plan.routes {
            if let RouteEntry::Rule {
                name,
                kind,
                pattern,
                target,
                inert,
            } = entry
            {
                let matcher: Box<dyn Matcher> = if *inert {
                    Box::new(NeverMatcher)
                } else {
                    build_matcher(*kind, pattern).unwrap_or_else(|e| {
                        tracing::warn!(rule = %name, error = %e, "Unusable rule pattern");
                        Box::new(NeverMatcher)
                    })
                };
                routes.push(CompiledRoute {
                    name: name.clone(),
                    matcher,
                    target: target.clone(),
                });
            }
        }

        Self {
            domain: plan.domain.clone(),
            routes,
            default: plan.default_target().clone(),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Target for `path`: the first matching rule, else the default.
    pub fn route(&self, path: &str) -> &Target {
        self.matching_rule(path)
            .map(|route| &route.target)
            .unwrap_or(&self.default)
    }

    /// Name of the rule that would handle `path`, or `None` for the default.
    pub fn matched_rule(&self, path: &str) -> Option<&str> {
        self.matching_rule(path).map(|route| route.name.as_str())
    }

    fn matching_rule(&self, path: &str) -> Option<&CompiledRoute> {
        self.routes.iter().find(|route| route.matcher.matches(path))
    }
}
