//! Shared fixtures for integration tests.

#![allow(dead_code)]

use gateway_config::model::{
    BackendPool, DomainConfig, Endpoint, MatchKind, ProtocolMode, RoutingMode, RuleSpec,
    ServerEndpoint, SslMode, Target,
};

/// `app.example.com` with alias `www.example.com`, one http pool `api_pool`
/// at 127.0.0.1:3000 and one prefix rule `/api -> api_pool`, defaulting to
/// the system backend under SSL passthrough.
pub fn app_config() -> DomainConfig {
    let mut config = DomainConfig::new("app.example.com").unwrap();
    config.add_alias("www.example.com").unwrap();
    config.set_routing_mode(RoutingMode::RuleBased);
    config.set_ssl_mode(SslMode::Passthrough);
    config
        .add_pool(
            BackendPool::new("api_pool")
                .with_mode(ProtocolMode::Http)
                .with_server(ServerEndpoint::new(Endpoint::ipv4("127.0.0.1", 3000))),
        )
        .unwrap();
    config
        .add_rule(RuleSpec::new(MatchKind::Prefix, "/api", Target::pool("api_pool")))
        .unwrap();
    config
}

/// The same configuration as JSON, the way a hand-edited domain file
/// reaches the engine.
pub fn app_config_json() -> serde_json::Value {
    serde_json::json!({
        "domain": "app.example.com",
        "aliases": ["www.example.com"],
        "routing_mode": "rule-based",
        "ssl_mode": "passthrough",
        "default_target": "__system__",
        "pools": [{
            "name": "api_pool",
            "mode": "http",
            "algorithm": "round_robin",
            "servers": [{ "kind": "ipv4", "host": "127.0.0.1", "port": 3000 }]
        }],
        "rules": [{ "kind": "prefix", "pattern": "/api", "target": "api_pool" }]
    })
}

/// Deserialize and normalize a domain config, as the loader does.
pub fn from_json(value: serde_json::Value) -> DomainConfig {
    let mut config: DomainConfig = serde_json::from_value(value).unwrap();
    config.normalize();
    config
}

/// A tcp pool with one server at `127.0.0.1:<port>`.
pub fn tcp_pool(name: &str, port: u16) -> BackendPool {
    BackendPool::new(name)
        .with_mode(ProtocolMode::Tcp)
        .with_server(ServerEndpoint::new(Endpoint::ipv4("127.0.0.1", port)))
}
