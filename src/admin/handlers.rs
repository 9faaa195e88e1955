use std::collections::BTreeMap;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::admin::state::{AdminState, GatewayState};
use crate::apply::CertificateStore;
use crate::compiler::{compile, validate, CompileResponse, Finding};
use crate::gateway::parse;
use crate::layout::{layout, Graph, Layout, LayoutOptions};
use crate::model::{DomainConfig, RoutingMode, SslMode};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub domains: usize,
    pub compiled: usize,
    pub rejected: usize,
}

#[derive(Serialize)]
pub struct DomainSummary {
    pub domain: String,
    pub aliases: Vec<String>,
    pub enabled: bool,
    pub routing_mode: RoutingMode,
    pub ssl_mode: SslMode,
    pub pools: usize,
    pub rules: usize,
    pub compiled: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<Finding>,
}

#[derive(Serialize)]
pub struct LayoutResponse {
    pub layout: Layout,
    /// Domains left out of the drawing because they did not compile.
    pub rejected: BTreeMap<String, Vec<Finding>>,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let gateway = state.gateway.load();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        domains: gateway.domains.len(),
        compiled: gateway.plans.len(),
        rejected: gateway.rejected.len(),
    })
}

pub async fn get_domains(State(state): State<AdminState>) -> Json<Vec<DomainSummary>> {
    let gateway = state.gateway.load();
    let summaries = gateway
        .domains
        .iter()
        .map(|config| {
            let findings = gateway
                .rejected
                .get(config.domain())
                .cloned()
                .unwrap_or_default();
            DomainSummary {
                domain: config.domain().to_string(),
                aliases: config.aliases().to_vec(),
                enabled: config.enabled(),
                routing_mode: config.routing_mode(),
                ssl_mode: config.ssl_mode(),
                pools: config.pools().len(),
                rules: config.rules().len(),
                compiled: findings.is_empty(),
                findings,
            }
        })
        .collect();
    Json(summaries)
}

/// Run `f` against the certificate store on the blocking pool.
async fn with_certs<T, F>(state: &AdminState, f: F) -> Result<T, Response>
where
    F: FnOnce(&dyn CertificateStore) -> T + Send + 'static,
    T: Send + 'static,
{
    let certs = state.certs.clone();
    tokio::task::spawn_blocking(move || f(&*certs))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Certificate-bound task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })
}

pub async fn post_validate(
    State(state): State<AdminState>,
    Json(mut config): Json<DomainConfig>,
) -> Response {
    config.normalize();
    let domain = config.domain().to_string();
    match with_certs(&state, move |certs| validate(&config, certs)).await {
        Ok(report) => {
            tracing::debug!(domain = %domain, ok = report.ok, "Validated draft");
            Json(report).into_response()
        }
        Err(response) => response,
    }
}

pub async fn post_compile(
    State(state): State<AdminState>,
    Json(mut config): Json<DomainConfig>,
) -> Response {
    config.normalize();
    let compiled = with_certs(&state, move |certs| {
        CompileResponse::from(compile(&config, certs))
    })
    .await;
    match compiled {
        Ok(response) if response.ok => (StatusCode::OK, Json(response)).into_response(),
        Ok(response) => (StatusCode::UNPROCESSABLE_ENTITY, Json(response)).into_response(),
        Err(response) => response,
    }
}

/// Lay out a set of draft domains without touching the loaded state.
pub async fn post_layout(
    State(state): State<AdminState>,
    Json(mut configs): Json<Vec<DomainConfig>>,
) -> Response {
    configs.iter_mut().for_each(DomainConfig::normalize);
    match with_certs(&state, move |certs| GatewayState::build(configs, certs)).await {
        Ok(drafts) => Json(layout_of(&drafts)).into_response(),
        Err(response) => response,
    }
}

/// Lay out the currently loaded domains.
pub async fn get_layout(State(state): State<AdminState>) -> Json<LayoutResponse> {
    let gateway = state.gateway.load();
    Json(layout_of(&gateway))
}

/// Lay out the live gateway file, sections this daemon does not manage
/// included.
pub async fn get_gateway_layout(State(state): State<AdminState>) -> Response {
    let Some(file) = state.gateway_file.clone() else {
        return (StatusCode::NOT_FOUND, "No gateway configuration file configured").into_response();
    };

    let text = match tokio::fs::read_to_string(&file.path).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(path = ?file.path, error = %e, "Failed to read gateway configuration");
            return (
                StatusCode::NOT_FOUND,
                format!("Cannot read {}: {}", file.path.display(), e),
            )
                .into_response();
        }
    };

    match parse(&text) {
        Ok(parsed) => {
            let graph = Graph::from_gateway(&parsed, &file.user_domains);
            Json(layout(&graph, &LayoutOptions::default())).into_response()
        }
        Err(e) => {
            tracing::warn!(path = ?file.path, error = %e, "Gateway configuration did not parse");
            (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response()
        }
    }
}

fn layout_of(gateway: &GatewayState) -> LayoutResponse {
    let graph = Graph::from_plans(&gateway.plans);
    LayoutResponse {
        layout: layout(&graph, &LayoutOptions::default()),
        rejected: gateway.rejected.clone(),
    }
}
