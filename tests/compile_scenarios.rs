//! End-to-end compile scenarios over the public API.

mod common;

use gateway_config::apply::StaticCertificates;
use gateway_config::compiler::{compile, validate, FindingCode, RouteEntry};
use gateway_config::gateway::parse;
use gateway_config::layout::Graph;
use gateway_config::model::{
    DomainConfig, EditError, MatchKind, PoolUpdate, RoutingMode, RuleSpec, SslMode, Target,
};
use gateway_config::render::{render_gateway, render_plan, RenderOptions};
use gateway_config::routing::RouteTable;

#[test]
fn test_example_domain_compiles_to_two_routes() {
    let config = common::app_config();
    let plan = compile(&config, &StaticCertificates::none()).unwrap();

    assert_eq!(plan.pools.len(), 1);
    let pool = plan.pool("api_pool").unwrap();
    assert_eq!(pool.servers.len(), 1);
    assert_eq!(pool.servers[0].address, "127.0.0.1:3000");

    assert_eq!(plan.routes.len(), 2);
    match &plan.routes[0] {
        RouteEntry::Rule {
            kind,
            pattern,
            target,
            ..
        } => {
            assert_eq!(*kind, MatchKind::Prefix);
            assert_eq!(pattern, "/api");
            assert_eq!(*target, Target::pool("api_pool"));
        }
        other => panic!("expected rule first, got {:?}", other),
    }
    assert_eq!(
        plan.routes[1],
        RouteEntry::Default {
            target: Target::System
        }
    );
}

#[test]
fn test_json_and_builder_configs_agree() {
    let built = common::app_config();
    let loaded = common::from_json(common::app_config_json());
    let certs = StaticCertificates::none();
    assert_eq!(compile(&built, &certs), compile(&loaded, &certs));
}

#[test]
fn test_typo_target_is_one_dangling_reference() {
    let mut json = common::app_config_json();
    json["rules"][0]["target"] = "apii_pool".into();
    let config = common::from_json(json);

    let report = validate(&config, &StaticCertificates::none());
    assert!(!report.ok);
    let errors: Vec<_> = report.errors().collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, FindingCode::DanglingReference);
    assert!(errors[0].path.starts_with("rules[path_api]"));
    assert!(errors[0].message.contains("apii_pool"));
}

#[test]
fn test_insert_at_front_becomes_first_route() {
    let mut config = common::app_config();
    config
        .add_rule(RuleSpec::new(MatchKind::Suffix, ".png", Target::System).named("images"))
        .unwrap();
    config
        .add_rule(RuleSpec::new(MatchKind::Exact, "/health", Target::System).named("health"))
        .unwrap();
    config
        .insert_rule_at(
            0,
            RuleSpec::new(MatchKind::Prefix, "/admin", Target::System).named("admin"),
        )
        .unwrap();

    let plan = compile(&config, &StaticCertificates::none()).unwrap();
    let names: Vec<&str> = plan
        .routes
        .iter()
        .filter_map(|r| match r {
            RouteEntry::Rule { name, .. } => Some(name.as_str()),
            RouteEntry::Default { .. } => None,
        })
        .collect();
    assert_eq!(names, vec!["admin", "path_api", "images", "health"]);
}

#[test]
fn test_system_fallback_alone_is_valid() {
    let mut config = DomainConfig::new("bare.example.com").unwrap();
    config.set_routing_mode(RoutingMode::RuleBased);

    let report = validate(&config, &StaticCertificates::none());
    assert!(report.ok, "{:?}", report.findings);

    let plan = compile(&config, &StaticCertificates::none()).unwrap();
    assert!(plan.pools.is_empty());
    assert_eq!(plan.routes.len(), 1);
    assert!(plan.targets_system());
}

#[test]
fn test_terminate_with_tcp_pool_is_one_conflict() {
    let mut config = common::app_config();
    config.add_pool(common::tcp_pool("db_pool", 5432)).unwrap();
    config.set_ssl_mode(SslMode::Terminate);

    let certs = StaticCertificates::new(["app.example.com"]);
    let report = validate(&config, &certs);
    let conflicts: Vec<_> = report
        .findings
        .iter()
        .filter(|f| f.code == FindingCode::SslModeConflict)
        .collect();
    assert_eq!(conflicts.len(), 1);
    assert!(conflicts[0].path.contains("db_pool"));
}

#[test]
fn test_terminate_without_certificate_is_rejected() {
    let mut config = common::app_config();
    config.set_ssl_mode(SslMode::Terminate);

    let findings = compile(&config, &StaticCertificates::none()).unwrap_err();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].code, FindingCode::SslModeConflict);
    assert_eq!(findings[0].path, "ssl_mode");
}

#[test]
fn test_rename_updates_every_reference() {
    let mut config = common::app_config();
    config
        .add_rule(RuleSpec::new(MatchKind::Prefix, "/v2", Target::pool("api_pool")).named("v2"))
        .unwrap();
    config.set_default_target(Target::pool("api_pool")).unwrap();

    let findings = config.rename_pool("api_pool", "backend_pool").unwrap();
    assert!(findings
        .iter()
        .all(|f| f.code != FindingCode::DanglingReference));

    assert_eq!(config.default_target(), &Target::pool("backend_pool"));
    assert!(config
        .rules()
        .iter()
        .all(|r| r.target == Target::pool("backend_pool")));

    let text = serde_json::to_string(&config).unwrap();
    assert!(!text.contains("api_pool"));
}

#[test]
fn test_update_pool_rename_goes_through_references() {
    let mut config = common::app_config();
    config
        .update_pool(
            "api_pool",
            PoolUpdate {
                name: Some("svc".into()),
                ..PoolUpdate::default()
            },
        )
        .unwrap();
    assert_eq!(
        config.rules().iter().next().unwrap().target,
        Target::pool("svc")
    );
}

#[test]
fn test_referenced_pool_removal_is_blocked() {
    let mut config = common::app_config();
    let before = config.clone();

    let err = config.remove_pool("api_pool").unwrap_err();
    assert!(matches!(err, EditError::BlockedRemoval { .. }));
    assert_eq!(config, before);
}

#[test]
fn test_compiled_plan_routes_and_renders() {
    let mut config = common::app_config();
    config.set_ssl_mode(SslMode::None);
    let plan = compile(&config, &StaticCertificates::none()).unwrap();

    let table = RouteTable::from_plan(&plan);
    assert_eq!(table.route("/api/users"), &Target::pool("api_pool"));
    assert_eq!(table.route("/"), &Target::System);

    let text = render_plan(&plan, &RenderOptions::default());
    assert!(text.contains("acl host_app_example_com hdr(host) -i app.example.com www.example.com"));
    assert!(text.contains("use_backend app_example_com__api_pool if host_app_example_com app_example_com__path_api"));
    assert!(text.contains("use_backend web_backend if host_app_example_com"));
    assert!(text.contains("server server1 127.0.0.1:3000"));
}

#[test]
fn test_passthrough_rules_are_inert() {
    let config = common::app_config();
    let plan = compile(&config, &StaticCertificates::none()).unwrap();

    assert!(plan
        .warnings
        .iter()
        .any(|w| w.code == FindingCode::InertRule));
    let table = RouteTable::from_plan(&plan);
    assert_eq!(table.route("/api/users"), &Target::System);
}

#[test]
fn test_lookalike_domains_render_distinct_names() {
    let plans: Vec<_> = ["a-b.example.com", "a.b.example.com"]
        .into_iter()
        .map(|domain| {
            let mut json = common::app_config_json();
            json["domain"] = domain.into();
            json["aliases"] = serde_json::json!([]);
            json["ssl_mode"] = "none".into();
            compile(&common::from_json(json), &StaticCertificates::none()).unwrap()
        })
        .collect();

    let text = render_gateway(&plans, &RenderOptions::default());
    for line in [
        "backend a-b_example_com__api_pool\n",
        "backend a_b_example_com__api_pool\n",
        "acl host_a-b_example_com hdr(host) -i a-b.example.com\n",
        "acl host_a_b_example_com hdr(host) -i a.b.example.com\n",
        "acl a-b_example_com__path_api path_beg /api\n",
        "acl a_b_example_com__path_api path_beg /api\n",
    ] {
        assert_eq!(text.matches(line).count(), 1, "{}", line.trim());
    }
    // The gateway refuses duplicate sections; so does the parser.
    assert_eq!(parse(&text).unwrap().backends().count(), 2);

    let graph = Graph::from_plans(&plans);
    let mut ids: Vec<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
    let total = ids.len();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), total);
}
