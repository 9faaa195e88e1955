//! Admin API tests, driven in-process through the router.

mod common;

use std::sync::{Arc, Mutex};
use std::thread::ThreadId;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use gateway_config::admin::{setup_admin_router, AdminState, GatewayState};
use gateway_config::apply::{CertificateStore, StaticCertificates};
use gateway_config::config::GatewayFileConfig;
use gateway_config::layout::UserDomain;

const KEY: &str = "test-key";

fn router(domains: Vec<gateway_config::DomainConfig>, key: &str) -> Router {
    let certs = Arc::new(StaticCertificates::none());
    let state = GatewayState::build(domains, &*certs);
    let admin = AdminState::new(Arc::new(ArcSwap::from_pointee(state)), certs, key);
    setup_admin_router(admin, Duration::from_secs(5))
}

fn empty_state(certs: Arc<dyn CertificateStore>) -> AdminState {
    AdminState::new(
        Arc::new(ArcSwap::from_pointee(GatewayState::default())),
        certs,
        KEY,
    )
}

fn node_ids(layout: &Value) -> Vec<String> {
    layout["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["id"].as_str().unwrap().to_string())
        .collect()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", KEY))
        .body(Body::empty())
        .unwrap()
}

fn post(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", KEY))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_status_requires_key() {
    let app = router(vec![common::app_config()], KEY);

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/admin/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.oneshot(get("/admin/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body = json(response).await;
    assert_eq!(body["domains"], 1);
    assert_eq!(body["compiled"], 1);
}

#[tokio::test]
async fn test_empty_key_disables_auth() {
    let app = router(Vec::new(), "");
    let response = app
        .oneshot(Request::builder().uri("/admin/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_domains_lists_compile_status() {
    let mut broken = common::app_config_json();
    broken["domain"] = "broken.example.com".into();
    broken["aliases"] = serde_json::json!([]);
    broken["rules"][0]["target"] = "apii_pool".into();

    let app = router(vec![common::app_config(), common::from_json(broken)], KEY);
    let body = json(app.oneshot(get("/admin/domains")).await.unwrap()).await;

    let domains = body.as_array().unwrap();
    assert_eq!(domains.len(), 2);
    assert_eq!(domains[0]["domain"], "app.example.com");
    assert_eq!(domains[0]["compiled"], true);
    assert_eq!(domains[1]["compiled"], false);
    assert_eq!(domains[1]["findings"][0]["code"], "DanglingReference");
}

#[tokio::test]
async fn test_validate_reports_findings() {
    let mut draft = common::app_config_json();
    draft["rules"][0]["target"] = "apii_pool".into();

    let app = router(Vec::new(), KEY);
    let response = app.oneshot(post("/admin/validate", &draft)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json(response).await;
    assert_eq!(body["ok"], false);
    assert_eq!(body["findings"].as_array().unwrap().len(), 1);
    assert_eq!(body["findings"][0]["path"], "rules[path_api].target");
}

#[tokio::test]
async fn test_compile_returns_plan_or_findings() {
    let app = router(Vec::new(), KEY);

    let response = app
        .clone()
        .oneshot(post("/admin/compile", &common::app_config_json()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["plan"]["routes"].as_array().unwrap().len(), 2);

    let mut draft = common::app_config_json();
    draft["pools"][0]["servers"] = serde_json::json!([]);
    let response = app.oneshot(post("/admin/compile", &draft)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json(response).await;
    assert_eq!(body["ok"], false);
    assert_eq!(body["findings"][0]["code"], "EmptyPool");
}

#[tokio::test]
async fn test_layout_of_drafts_and_loaded_state() {
    let app = router(vec![common::app_config()], KEY);

    let loaded = json(app.clone().oneshot(get("/admin/layout")).await.unwrap()).await;
    let ids: Vec<&str> = loaded["layout"]["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"entry_app.example.com"));
    assert!(ids.contains(&"pool_system"));

    let mut other = common::app_config_json();
    other["domain"] = "shop.example.com".into();
    other["aliases"] = serde_json::json!([]);
    let drafts = serde_json::json!([common::app_config_json(), other]);
    let response = app.oneshot(post("/admin/layout", &drafts)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    let entries = body["layout"]["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|n| n["kind"] == "entry")
        .count();
    assert_eq!(entries, 2);
    assert!(body["rejected"].as_object().unwrap().is_empty());
}

const LIVE_GATEWAY: &str = r#"
global
    maxconn 4096

frontend http_front
    bind *:80
    mode http
    acl is_blog hdr(host) -i blog.example.com
    use_backend blog_backend if is_blog
    default_backend web_backend

backend blog_backend
    mode http
    server blog1 127.0.0.1:8080 check

backend web_backend
    mode http
    server local 127.0.0.1:8000

listen mysql
    bind :3306
    mode tcp
    server db1 10.0.0.5:3306 check
"#;

#[tokio::test]
async fn test_gateway_file_layout() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("haproxy.cfg");
    std::fs::write(&path, LIVE_GATEWAY).unwrap();

    let file = GatewayFileConfig {
        path: path.clone(),
        user_domains: vec![UserDomain {
            domain: "blog.example.com".into(),
            user: Some("alice".into()),
            host: Some("127.0.0.1".into()),
            port: Some(8080),
            kind: None,
        }],
    };
    let state = empty_state(Arc::new(StaticCertificates::none())).with_gateway_file(file);
    let app = setup_admin_router(state, Duration::from_secs(5));

    let response = app
        .clone()
        .oneshot(get("/admin/layout/gateway"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let ids = node_ids(&json(response).await);
    for id in [
        "entry_http_front",
        "pool_blog_backend",
        "pool_web_backend",
        "listen_mysql",
        "user_domain_0",
    ] {
        assert!(ids.iter().any(|i| i == id), "missing {} in {:?}", id, ids);
    }

    // The file is read per request, so a broken edit shows up at once.
    std::fs::write(&path, "backend\n").unwrap();
    let response = app.oneshot(get("/admin/layout/gateway")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_gateway_layout_needs_a_file() {
    let app = router(Vec::new(), KEY);
    let response = app.oneshot(get("/admin/layout/gateway")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let state = empty_state(Arc::new(StaticCertificates::none())).with_gateway_file(
        GatewayFileConfig {
            path: "/nonexistent/haproxy.cfg".into(),
            user_domains: Vec::new(),
        },
    );
    let app = setup_admin_router(state, Duration::from_secs(5));
    let response = app.oneshot(get("/admin/layout/gateway")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// Records which thread each lookup ran on.
#[derive(Default)]
struct ThreadRecordingCerts {
    threads: Mutex<Vec<ThreadId>>,
}

impl CertificateStore for ThreadRecordingCerts {
    fn has_certificate(&self, _domain: &str) -> bool {
        self.threads.lock().unwrap().push(std::thread::current().id());
        true
    }
}

#[tokio::test]
async fn test_certificate_lookups_run_off_the_request_thread() {
    let certs = Arc::new(ThreadRecordingCerts::default());
    let app = setup_admin_router(empty_state(certs.clone()), Duration::from_secs(5));

    let mut draft = common::app_config_json();
    draft["ssl_mode"] = "terminate".into();
    let drafts = serde_json::json!([draft.clone()]);

    let response = app
        .clone()
        .oneshot(post("/admin/validate", &draft))
        .await
        .unwrap();
    assert_eq!(json(response).await["ok"], true);
    let response = app
        .clone()
        .oneshot(post("/admin/compile", &draft))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let response = app.oneshot(post("/admin/layout", &drafts)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The test runtime is single-threaded, so the request thread is this one.
    let request_thread = std::thread::current().id();
    let threads = certs.threads.lock().unwrap();
    assert!(threads.len() >= 3);
    assert!(threads.iter().all(|t| *t != request_thread));
}
