//! Gateway configuration daemon.
//!
//! Loads one configuration file per domain, validates and compiles each into
//! an emission plan, writes the rendered gateway configuration and reloads
//! the gateway. An admin API serves drafts and layouts to editors.
//!
//! # Architecture Overview
//!
//! ```text
//!   domains/*.toml ──▶ loader ──▶ DomainConfig[] ──▶ compiler ──▶ EmissionPlan[]
//!         ▲                                              │              │
//!         │                                          findings           ▼
//!      watcher                                           │        CommandApplier
//!    (reload loop)                                       ▼       (write + reload)
//!                                                 GatewayState ◀────────┘
//!                                                   (ArcSwap)
//!                                                       │
//!                              gatewayctl ──HTTP──▶  admin API ──▶ layout engine
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::net::TcpListener;

use gateway_config::admin::{setup_admin_router, AdminState, GatewayState};
use gateway_config::apply::{CertificateStore, CommandApplier, DirCertificateStore};
use gateway_config::config::{load_config, load_domains, DomainWatcher, ServiceConfig};
use gateway_config::lifecycle::{wait_for_shutdown_signal, Shutdown};
use gateway_config::model::DomainConfig;
use gateway_config::observability::{logging, metrics};
use gateway_config::render::RenderOptions;

const DEFAULT_CONFIG_PATH: &str = "gateway.toml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let config = if config_path.exists() {
        load_config(&config_path)?
    } else {
        ServiceConfig::default()
    };

    logging::init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?config_path,
        found = config_path.exists(),
        "gateway-config starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let certs: Arc<dyn CertificateStore> =
        Arc::new(DirCertificateStore::new(&config.certificates.dir));

    let applier = config.apply.enabled.then(|| {
        Arc::new(
            CommandApplier::new(&config.apply.output_path, config.apply.reload_command.clone())
                .with_options(
                    RenderOptions::default()
                        .with_system_backend(&config.apply.system_backend)
                        .with_system_tls_backend(&config.apply.system_tls_backend),
                ),
        )
    });

    let gateway = Arc::new(ArcSwap::from_pointee(GatewayState::default()));
    publish(
        &gateway,
        initial_domains(&config.domains.dir),
        &certs,
        applier.as_deref(),
    )
    .await;

    let shutdown = Shutdown::new();
    let mut tasks = Vec::new();

    // Reload loop. The notify handle must outlive the loop.
    let _watcher = if config.domains.watch {
        let (watcher, mut updates) = DomainWatcher::new(&config.domains.dir);
        match watcher.run() {
            Ok(handle) => {
                let gateway = gateway.clone();
                let certs = certs.clone();
                let applier = applier.clone();
                let mut stop = shutdown.subscribe();
                tasks.push(tokio::spawn(async move {
                    loop {
                        tokio::select! {
                            Some(domains) = updates.recv() => {
                                publish(&gateway, domains, &certs, applier.as_deref()).await;
                            }
                            _ = stop.recv() => break,
                        }
                    }
                    tracing::debug!("Reload loop stopped");
                }));
                Some(handle)
            }
            Err(e) => {
                tracing::error!(
                    dir = ?config.domains.dir,
                    error = %e,
                    "Failed to watch domains directory. Hot reload disabled."
                );
                None
            }
        }
    } else {
        None
    };

    if config.admin.enabled {
        if config.admin.api_key.is_empty() {
            tracing::warn!("Admin API key is empty; admin routes are unauthenticated");
        }
        let state = AdminState::new(gateway.clone(), certs.clone(), &config.admin.api_key)
            .with_gateway_file(config.gateway.clone());
        let router = setup_admin_router(
            state,
            Duration::from_secs(config.admin.request_timeout_secs),
        );
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Admin API listening");

        let mut stop = shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = stop.recv().await;
                })
                .await;
            if let Err(e) = served {
                tracing::error!(error = %e, "Admin API stopped with error");
            }
        }));
    }

    wait_for_shutdown_signal().await;
    tracing::info!("Shutting down");
    shutdown.trigger();

    for task in tasks {
        let _ = task.await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

fn initial_domains(dir: &Path) -> Vec<DomainConfig> {
    match load_domains(dir) {
        Ok(domains) => domains,
        Err(e) => {
            tracing::warn!(error = %e, "No domains loaded at startup");
            Vec::new()
        }
    }
}

/// Compile `domains`, apply the plans that compiled, and swap the state in.
async fn publish(
    gateway: &ArcSwap<GatewayState>,
    domains: Vec<DomainConfig>,
    certs: &Arc<dyn CertificateStore>,
    applier: Option<&CommandApplier>,
) {
    // Certificate lookups touch the filesystem.
    let certs = certs.clone();
    let built = tokio::task::spawn_blocking(move || GatewayState::build(domains, &*certs)).await;
    let state = match built {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "Compile task failed. Keeping previous state.");
            return;
        }
    };
    metrics::set_domains_loaded(state.domains.len());

    if let Some(applier) = applier {
        match applier.replace_all(&state.plans).await {
            Ok(()) => metrics::record_apply("applied"),
            Err(e) => {
                metrics::record_apply("failed");
                tracing::error!(error = %e, "Apply failed. Gateway keeps its previous configuration.");
            }
        }
    }

    tracing::info!(
        compiled = state.plans.len(),
        rejected = state.rejected.len(),
        "Domain state published"
    );
    gateway.store(Arc::new(state));
}
