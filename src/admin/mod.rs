//! Admin API.
//!
//! # Responsibilities
//! - Report the loaded domains and their compile status
//! - Validate and compile drafts posted by editors without applying them
//! - Serve layouts of drafts, of the loaded state and of the live gateway
//!   file
//!
//! # Design Decisions
//! - Handlers read one `ArcSwap` snapshot per request; the daemon swaps in a
//!   new `GatewayState` after every reload
//! - Draft endpoints never mutate the loaded state
//! - Certificate lookups touch the filesystem, so validation and compilation
//!   run on the blocking pool

pub mod auth;
pub mod handlers;
pub mod state;

use std::time::Duration;

use axum::{
    http::HeaderName,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

pub use state::{AdminState, GatewayState};

use self::auth::admin_auth_middleware;
use self::handlers::*;

const REQUEST_ID_HEADER: &str = "x-request-id";

#[allow(deprecated)]
pub fn setup_admin_router(state: AdminState, request_timeout: Duration) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/domains", get(get_domains))
        .route("/admin/validate", post(post_validate))
        .route("/admin/compile", post(post_compile))
        .route("/admin/layout", get(get_layout).post(post_layout))
        .route("/admin/layout/gateway", get(get_gateway_layout))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
}
