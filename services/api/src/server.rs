use crate::cli::ServeArgs;
use crate::infra::{build_collaborators, AppState};
use crate::routes::with_claim_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use drawback_claims::config::AppConfig;
use drawback_claims::error::AppError;
use drawback_claims::telemetry;
use drawback_claims::workflows::claim::ClaimRegistry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(args: ServeArgs) -> Result<(), AppError> {
    let config = apply_overrides(AppConfig::load()?, args);
    telemetry::init(&config.telemetry)?;

    let settings = config.claims.session_settings();
    let (collaborators, backend) =
        build_collaborators(&config.backend, settings.collaborator_timeout)?;
    info!(
        backend = backend.label(),
        timeout_secs = settings.collaborator_timeout.as_secs(),
        "claim collaborators configured"
    );
    let registry = Arc::new(ClaimRegistry::bootstrap(collaborators, settings).await);

    let (metrics_layer, metrics_handle) = PrometheusMetricLayer::pair();
    let state = AppState {
        readiness: Arc::new(AtomicBool::new(false)),
        metrics: Arc::new(metrics_handle),
    };
    let app = with_claim_routes(registry)
        .layer(Extension(state.clone()))
        .layer(metrics_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    state.readiness.store(true, Ordering::Release);
    info!(environment = ?config.environment, %addr, "drawback claim service listening");

    axum::serve(listener, app).await?;
    Ok(())
}

fn apply_overrides(mut config: AppConfig, args: ServeArgs) -> AppConfig {
    let ServeArgs {
        host,
        port,
        backend_url,
    } = args;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if backend_url.is_some() {
        config.backend.base_url = backend_url;
    }
    config
}
