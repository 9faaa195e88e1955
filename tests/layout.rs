//! Rendered gateway text read back into a graph and laid out.

mod common;

use gateway_config::apply::StaticCertificates;
use gateway_config::compiler::compile;
use gateway_config::gateway::parse;
use gateway_config::layout::{layout, EdgeKind, EdgeStyle, Graph, LayoutOptions, UserDomain};
use gateway_config::model::SslMode;
use gateway_config::render::{render_gateway, RenderOptions};

const EXTRA: &str = r#"
backend web_backend
    mode http
    server local 127.0.0.1:8080

listen mysql
    bind :3306
    mode tcp
    server db1 10.0.0.5:3306 check
"#;

fn gateway_text() -> String {
    let mut config = common::app_config();
    config.set_ssl_mode(SslMode::None);
    let plan = compile(&config, &StaticCertificates::none()).unwrap();
    let mut text = render_gateway(&[plan], &RenderOptions::default());
    text.push_str(EXTRA);
    text
}

#[test]
fn test_rendered_gateway_round_trips_into_graph() {
    let parsed = parse(&gateway_text()).unwrap();
    let graph = Graph::from_gateway(&parsed, &[]);

    assert!(graph.node("entry_domains").is_some());
    assert!(graph.node("pool_app_example_com__api_pool").is_some());
    assert!(graph.node("pool_web_backend").is_some());
    assert!(graph.node("listen_mysql").is_some());

    let conditional: Vec<_> = graph
        .edges
        .iter()
        .filter(|e| e.kind == EdgeKind::Conditional)
        .collect();
    assert!(conditional
        .iter()
        .any(|e| e.to == "pool_app_example_com__api_pool"));
    assert!(graph
        .edges
        .iter()
        .any(|e| e.kind == EdgeKind::Default && e.to == "pool_web_backend"));
}

#[test]
fn test_gateway_layout_places_every_node() {
    let parsed = parse(&gateway_text()).unwrap();
    let users = vec![UserDomain {
        domain: "app.example.com".into(),
        user: Some("alice".into()),
        host: Some("127.0.0.1".into()),
        port: Some(3000),
        kind: Some("node".into()),
    }];
    let graph = Graph::from_gateway(&parsed, &users);
    let out = layout(&graph, &LayoutOptions::default());

    assert_eq!(out.nodes.len(), graph.nodes.len());
    let entry = out.position("entry_domains").unwrap();
    assert_eq!((entry.x, entry.y), (80.0, 80.0));

    let user = out.position("user_domain_0").unwrap();
    assert_eq!(user.x, 680.0);

    // Listen sections sit below every column.
    let listen = out.position("listen_mysql").unwrap();
    assert_eq!(listen.x, 80.0);
    assert!(out
        .nodes
        .iter()
        .filter(|n| n.node.id != "listen_mysql" && !n.node.id.starts_with("server_mysql_"))
        .all(|n| n.y < listen.y));

    let attachment = out
        .edges
        .iter()
        .find(|e| e.edge.kind == EdgeKind::Attachment)
        .unwrap();
    assert_eq!(attachment.style, EdgeStyle::Dotted);
    assert_eq!(attachment.edge.from, "pool_app_example_com__api_pool");
}

#[test]
fn test_layout_is_deterministic() {
    let parsed = parse(&gateway_text()).unwrap();
    let graph = Graph::from_gateway(&parsed, &[]);
    let first = layout(&graph, &LayoutOptions::default());
    let second = layout(&graph, &LayoutOptions::default());
    assert_eq!(first, second);
}
