//! Gateway configuration text rendering.
//!
//! # Responsibilities
//! - Turn emission plans into the gateway's native configuration syntax
//! - Keep output deterministic: same plans, same text, byte for byte
//!
//! # Design Decisions
//! - Rendering never re-validates; a plan is trusted as compiled
//! - Backend names are prefixed with the domain's safe form so pools of
//!   different domains never collide
//! - Inert rules are rendered as comments, so the operator still sees them
//! - Passthrough domains route on SNI, which only a `mode tcp` frontend can
//!   read; they get their own frontend and their pools render as `mode tcp`

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::compiler::plan::{EmissionPlan, PoolStanza, RouteEntry};
use crate::model::{MatchKind, ProtocolMode, SslMode, Target};

/// Settings owned by the gateway installation rather than by any domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Backend the system sentinel maps to.
    pub system_backend: String,
    /// Name of the frontend carrying the domain routing blocks.
    pub frontend: String,
    pub binds: Vec<String>,
    /// System backend for passthrough domains. Must be a `mode tcp` backend.
    pub system_tls_backend: String,
    /// Name of the `mode tcp` frontend carrying passthrough domains.
    pub tls_frontend: String,
    pub tls_binds: Vec<String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            system_backend: "web_backend".to_string(),
            frontend: "domains".to_string(),
            binds: vec![":80".to_string()],
            system_tls_backend: "web_backend_tls".to_string(),
            tls_frontend: "domains_tls".to_string(),
            tls_binds: vec![":443".to_string()],
        }
    }
}

impl RenderOptions {
    pub fn with_system_backend(mut self, name: impl Into<String>) -> Self {
        self.system_backend = name.into();
        self
    }

    pub fn with_system_tls_backend(mut self, name: impl Into<String>) -> Self {
        self.system_tls_backend = name.into();
        self
    }
}

/// Separator between a domain's safe form and a pool or rule name.
///
/// Hostnames never contain `_`, so a safe form never contains `__` and the
/// first `__` of a generated name always ends the domain part.
pub const NAME_SEPARATOR: &str = "__";

/// `app.example-site.com` becomes `app_example-site_com`.
///
/// Only dots are rewritten: hostnames carry no underscores, so distinct
/// domains keep distinct safe forms.
pub fn safe_name(domain: &str) -> String {
    domain.replace('.', "_")
}

/// Backend name a pool renders as: `app_example_com__api_pool`.
pub fn backend_name(domain: &str, pool: &str) -> String {
    format!("{}{}{}", safe_name(domain), NAME_SEPARATOR, pool)
}

fn is_passthrough(plan: &EmissionPlan) -> bool {
    plan.ssl_mode == SslMode::Passthrough
}

fn target_backend(plan: &EmissionPlan, target: &Target, opts: &RenderOptions) -> String {
    match target {
        Target::System if is_passthrough(plan) => opts.system_tls_backend.clone(),
        Target::System => opts.system_backend.clone(),
        Target::Pool(pool) => backend_name(&plan.domain, pool),
    }
}

fn acl_fetch(kind: MatchKind) -> &'static str {
    match kind {
        MatchKind::Prefix => "path_beg",
        MatchKind::Suffix => "path_end",
        MatchKind::Exact => "path",
        MatchKind::Regex => "path_reg",
    }
}

/// Render one pool as a `backend` stanza.
pub fn render_backend(domain: &str, pool: &PoolStanza) -> String {
    write_backend(domain, pool, pool.mode)
}

/// A backend behind the passthrough frontend sees raw TLS, whatever the
/// pool's declared mode.
fn plan_backend(plan: &EmissionPlan, pool: &PoolStanza) -> String {
    let mode = if is_passthrough(plan) {
        ProtocolMode::Tcp
    } else {
        pool.mode
    };
    write_backend(&plan.domain, pool, mode)
}

fn write_backend(domain: &str, pool: &PoolStanza, mode: ProtocolMode) -> String {
    let mut out = String::new();
    let features = pool.features;
    let _ = writeln!(out, "backend {}", backend_name(domain, &pool.name));
    let _ = writeln!(out, "    mode {}", mode.as_str());
    let _ = writeln!(out, "    balance {}", pool.algorithm.keyword());

    if features.health_check {
        match mode {
            ProtocolMode::Http => {
                out.push_str("    option httpchk GET /\n");
                out.push_str("    http-check expect status 200-499\n");
            }
            ProtocolMode::Tcp => out.push_str("    option tcp-check\n"),
        }
    }
    if features.sticky_session && mode == ProtocolMode::Http {
        out.push_str("    cookie SERVERID insert indirect nocache\n");
    }
    if features.websocket {
        out.push_str("    timeout tunnel 1h\n");
    }
    if features.forward_headers && mode == ProtocolMode::Http {
        out.push_str("    option forwardfor\n");
    }
    for option in &pool.options {
        let _ = writeln!(out, "    {}", option);
    }

    for server in &pool.servers {
        let _ = write!(out, "    server {} {}", server.name, server.address);
        if features.health_check {
            out.push_str(" check inter 5s fall 3 rise 2");
        }
        if features.sticky_session && mode == ProtocolMode::Http {
            let _ = write!(out, " cookie {}", server.name);
        }
        if !server.extra.is_empty() {
            let _ = write!(out, " {}", server.extra);
        }
        out.push('\n');
    }
    out
}

/// Render the routing block of one domain, meant to sit inside a frontend.
pub fn render_routes(plan: &EmissionPlan, opts: &RenderOptions) -> String {
    let mut out = String::new();
    let safe = safe_name(&plan.domain);
    let host_acl = format!("host_{}", safe);

    let mut hosts = vec![plan.domain.as_str()];
    hosts.extend(plan.aliases.iter().map(String::as_str));
    let fetch = if is_passthrough(plan) {
        "req.ssl_sni"
    } else {
        "hdr(host)"
    };

    let _ = writeln!(out, "    # domain {}", plan.domain);
    let _ = writeln!(out, "    acl {} {} -i {}", host_acl, fetch, hosts.join(" "));

    for entry in &plan.routes {
        match entry {
            RouteEntry::Rule {
                name,
                kind,
                pattern,
                target,
                inert,
            } => {
                let acl = format!("{}{}{}", safe, NAME_SEPARATOR, name);
                let backend = target_backend(plan, target, opts);
                if *inert {
                    let _ = writeln!(
                        out,
                        "    # inert under ssl passthrough: {} {} {} -> {}",
                        name,
                        acl_fetch(*kind),
                        pattern,
                        backend
                    );
                    continue;
                }
                let _ = writeln!(out, "    acl {} {} {}", acl, acl_fetch(*kind), pattern);
                let _ = writeln!(out, "    use_backend {} if {} {}", backend, host_acl, acl);
            }
            RouteEntry::Default { target } => {
                let backend = target_backend(plan, target, opts);
                let _ = writeln!(out, "    use_backend {} if {}", backend, host_acl);
            }
        }
    }
    out
}

/// Render one domain: its routing block followed by its backends.
pub fn render_plan(plan: &EmissionPlan, opts: &RenderOptions) -> String {
    let mut out = render_routes(plan, opts);
    for pool in &plan.pools {
        out.push('\n');
        out.push_str(&plan_backend(plan, pool));
    }
    out
}

/// Render the full file for every enabled domain, then every backend stanza.
///
/// Host-routed domains share the `mode http` frontend. Passthrough domains
/// share a `mode tcp` frontend that waits for the TLS ClientHello so
/// `req.ssl_sni` is populated; it is only written when such a domain exists.
pub fn render_gateway(plans: &[EmissionPlan], opts: &RenderOptions) -> String {
    let enabled: Vec<&EmissionPlan> = plans.iter().filter(|p| p.enabled).collect();
    let (tls, http): (Vec<&EmissionPlan>, Vec<&EmissionPlan>) =
        enabled.iter().copied().partition(|p| is_passthrough(p));

    let mut out = String::new();
    out.push_str("# Generated by gateway-config. Manual edits are overwritten.\n\n");
    let _ = writeln!(out, "frontend {}", opts.frontend);
    for bind in &opts.binds {
        let _ = writeln!(out, "    bind {}", bind);
    }
    out.push_str("    mode http\n");
    for plan in &http {
        out.push_str(&render_routes(plan, opts));
    }
    let _ = writeln!(out, "    default_backend {}", opts.system_backend);

    if !tls.is_empty() {
        let _ = writeln!(out, "\nfrontend {}", opts.tls_frontend);
        for bind in &opts.tls_binds {
            let _ = writeln!(out, "    bind {}", bind);
        }
        out.push_str("    mode tcp\n");
        out.push_str("    tcp-request inspect-delay 5s\n");
        out.push_str("    tcp-request content accept if { req.ssl_hello_type 1 }\n");
        for plan in &tls {
            out.push_str(&render_routes(plan, opts));
        }
        let _ = writeln!(out, "    default_backend {}", opts.system_tls_backend);
    }

    for plan in &enabled {
        for pool in &plan.pools {
            out.push('\n');
            out.push_str(&plan_backend(plan, pool));
        }
    }
    out
}
