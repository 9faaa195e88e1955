//! Node/edge graph of the gateway, built from compiled plans or from the
//! raw gateway configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::compiler::plan::{EmissionPlan, RouteEntry};
use crate::gateway::{GatewayConfig, Section};
use crate::model::Target;
use crate::render::{backend_name, safe_name};

/// Listen sections with this name are the gateway's own stats page.
const STATS_LISTEN: &str = "stats";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// External entry point: a domain or a frontend.
    Entry,
    Pool,
    Server,
    /// Raw listen section not tied to any domain.
    Listen,
    /// Gateway-wide user domain attached to a pool.
    UserDomain,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub label: String,
    /// Display-only attributes (mode, address, balance, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeKind, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
            details: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.is_empty() {
            self.details.insert(key.to_string(), value);
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Fallback route of an entry point.
    Default,
    /// Rule-selected route.
    Conditional,
    /// User domain hanging off a pool.
    Attachment,
    /// Pool or listen section to one of its servers.
    Member,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>, kind: EdgeKind) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            kind,
            label: None,
        }
    }

    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A domain hosted on the gateway outside this engine's plans, shown in
/// the fourth column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDomain {
    pub domain: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

pub const SYSTEM_POOL_ID: &str = "pool_system";

fn entry_id(name: &str) -> String {
    format!("entry_{}", name)
}

fn pool_id(name: &str) -> String {
    format!("pool_{}", name)
}

fn server_id(owner: &str, index: usize) -> String {
    format!("server_{}_{}", owner, index)
}

impl Graph {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn nodes_of(&self, kind: NodeKind) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(move |n| n.kind == kind)
    }

    /// Graph of compiled domains: one entry per domain, its pools and their
    /// servers, and a single shared `system` pool when any route uses it.
    pub fn from_plans(plans: &[EmissionPlan]) -> Self {
        let mut graph = Graph::default();

        for plan in plans {
            let entry = entry_id(&plan.domain);
            graph.nodes.push(
                Node::new(&entry, NodeKind::Entry, &plan.domain)
                    .with_detail("aliases", plan.aliases.join(" "))
                    .with_detail("ssl_mode", plan.ssl_mode.as_str())
                    .with_detail("enabled", if plan.enabled { "" } else { "false" }),
            );

            for pool in &plan.pools {
                let backend = backend_name(&plan.domain, &pool.name);
                let id = pool_id(&backend);
                graph.nodes.push(
                    Node::new(&id, NodeKind::Pool, &pool.name)
                        .with_detail("mode", pool.mode.as_str())
                        .with_detail("balance", pool.algorithm.keyword()),
                );
                for (i, server) in pool.servers.iter().enumerate() {
                    let sid = server_id(&backend, i);
                    graph.nodes.push(
                        Node::new(&sid, NodeKind::Server, &server.name)
                            .with_detail("address", &server.address)
                            .with_detail("options", &server.extra),
                    );
                    graph.edges.push(Edge::new(&id, sid, EdgeKind::Member));
                }
            }

            for route in &plan.routes {
                let to = match route.target() {
                    Target::System => SYSTEM_POOL_ID.to_string(),
                    Target::Pool(pool) => pool_id(&backend_name(&plan.domain, pool)),
                };
                let edge = match route {
                    RouteEntry::Rule {
                        kind,
                        pattern,
                        inert,
                        ..
                    } => {
                        let mut label = format!("{} {}", kind.as_str(), pattern);
                        if *inert {
                            label.push_str(" (inert)");
                        }
                        Edge::new(&entry, to, EdgeKind::Conditional).labelled(label)
                    }
                    RouteEntry::Default { .. } => {
                        Edge::new(&entry, to, EdgeKind::Default).labelled("default")
                    }
                };
                graph.edges.push(edge);
            }
        }

        if plans.iter().any(EmissionPlan::targets_system) {
            graph
                .nodes
                .push(Node::new(SYSTEM_POOL_ID, NodeKind::Pool, "system"));
        }
        graph
    }

    /// Graph of the whole gateway from its raw configuration, with user
    /// domains attached to the first backend whose name contains the
    /// domain's safe form.
    pub fn from_gateway(config: &GatewayConfig, user_domains: &[UserDomain]) -> Self {
        let mut graph = Graph::default();

        for front in config.frontends() {
            let entry = entry_id(&front.name);
            graph.nodes.push(
                Node::new(&entry, NodeKind::Entry, &front.name)
                    .with_detail("bind", front.binds.join(", "))
                    .with_detail("mode", front.mode.clone().unwrap_or_default()),
            );
            if let Some(default) = &front.default_backend {
                graph.edges.push(
                    Edge::new(&entry, pool_id(default), EdgeKind::Default).labelled("default"),
                );
            }
            for switch in &front.use_backends {
                let edge = Edge::new(&entry, pool_id(&switch.backend), EdgeKind::Conditional);
                graph.edges.push(match &switch.condition {
                    Some(condition) => edge.labelled(condition_label(front, condition)),
                    None => edge,
                });
            }
        }

        for backend in config.backends() {
            let id = pool_id(&backend.name);
            graph.nodes.push(
                Node::new(&id, NodeKind::Pool, &backend.name)
                    .with_detail("mode", backend.mode.clone().unwrap_or_default())
                    .with_detail("balance", backend.balance.clone().unwrap_or_default()),
            );
            push_servers(&mut graph, backend, &id);
        }

        for listen in config.listens().filter(|l| l.name != STATS_LISTEN) {
            let id = format!("listen_{}", listen.name);
            graph.nodes.push(
                Node::new(&id, NodeKind::Listen, &listen.name)
                    .with_detail("bind", listen.binds.join(", "))
                    .with_detail("mode", listen.mode.clone().unwrap_or_default()),
            );
            push_servers(&mut graph, listen, &id);
        }

        for (i, user) in user_domains.iter().enumerate() {
            let id = format!("user_domain_{}", i);
            let mut node = Node::new(&id, NodeKind::UserDomain, &user.domain)
                .with_detail("user", user.user.clone().unwrap_or_default())
                .with_detail("host", user.host.clone().unwrap_or_default())
                .with_detail("kind", user.kind.clone().unwrap_or_default());
            if let Some(port) = user.port {
                node = node.with_detail("port", port.to_string());
            }
            graph.nodes.push(node);

            let safe = safe_name(&user.domain);
            let owner = graph
                .nodes_of(NodeKind::Pool)
                .find(|n| n.label.contains(&safe))
                .map(|n| n.id.clone());
            if let Some(owner) = owner {
                graph.edges.push(Edge::new(owner, id, EdgeKind::Attachment));
            }
        }

        graph
    }
}

fn push_servers(graph: &mut Graph, section: &Section, owner_id: &str) {
    for (i, server) in section.servers.iter().enumerate() {
        let sid = server_id(&section.name, i);
        graph.nodes.push(
            Node::new(&sid, NodeKind::Server, &server.name)
                .with_detail("address", &server.address)
                .with_detail("options", &server.options),
        );
        graph.edges.push(Edge::new(owner_id, sid, EdgeKind::Member));
    }
}

/// Host ACL definition `hdr(host) -i a.com b.com` gives `a.com b.com`.
fn host_acl_domains(definition: &str) -> Option<String> {
    let mut words = definition.split_whitespace();
    let fetch = words.next()?;
    if !fetch.eq_ignore_ascii_case("hdr(host)") && !fetch.eq_ignore_ascii_case("req.ssl_sni") {
        return None;
    }
    if words.next()? != "-i" {
        return None;
    }
    let domains: Vec<&str> = words.collect();
    if domains.is_empty() {
        None
    } else {
        Some(domains.join(" "))
    }
}

/// Expand host ACL names in a condition to `acl: domains`.
fn condition_label(section: &Section, condition: &str) -> String {
    condition
        .split_whitespace()
        .map(|word| {
            match section.acl(word).and_then(host_acl_domains) {
                Some(domains) => format!("{}: {}", word, domains),
                None => word.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
