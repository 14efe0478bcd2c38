//! Project Identity Authority
//!
//! Entry point for the PIA service. Loads the project registry, wires the
//! authorization pipeline and serves the upload API.

use pia_service::auth::ReqwestFetcher;
use pia_service::config::Config;
use pia_service::observability::metrics::init_metrics_recorder;
use pia_service::registry::{load_projects_file, reload_projects_file, RegistryHandle};
use pia_service::routes::{self, AppState};
use pia_service::services::DependencyTrackClient;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration before tracing so the log format can follow it
    let config = Config::from_env().map_err(|e| {
        eprintln!("Failed to load configuration: {e}");
        e
    })?;

    let (json_layer, text_layer) = if config.log_json {
        (Some(tracing_subscriber::fmt::layer().json()), None)
    } else {
        (None, Some(tracing_subscriber::fmt::layer()))
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pia_service=info,pia=info,tower_http=info".into()),
        )
        .with(json_layer)
        .with(text_layer)
        .init();

    info!("Starting Project Identity Authority");

    info!(
        projects_path = %config.projects_path.display(),
        expected_audience = %config.expected_audience,
        dependency_track_url = %config.dependency_track_url,
        bind_address = %config.bind_address,
        jwt_clock_skew_seconds = config.jwt_clock_skew.as_secs(),
        oidc_fetch_timeout_seconds = config.oidc_fetch_timeout.as_secs(),
        "Configuration loaded successfully"
    );

    // Initialize Prometheus metrics recorder
    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    // A bad registry at startup is fatal; a bad reload is not
    let registry = load_projects_file(&config.projects_path).map_err(|e| {
        error!("Failed to load project registry: {}", e);
        e
    })?;
    let registry = Arc::new(RegistryHandle::new(registry));

    let fetcher = Arc::new(ReqwestFetcher::new(config.oidc_fetch_timeout));

    let dt_client = DependencyTrackClient::new(
        config.dependency_track_url.clone(),
        config.dependency_track_api_key.clone(),
    )
    .map_err(|e| {
        error!("Failed to create DependencyTrack client: {}", e);
        e
    })?;

    let bind_address = config.bind_address.clone();
    let drain_period = config.drain_period;
    let projects_path = config.projects_path.clone();

    let state = Arc::new(AppState::new(
        config,
        registry.clone(),
        fetcher,
        Arc::new(dt_client),
    ));

    tokio::spawn(reload_on_sighup(registry, projects_path));

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("PIA listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(drain_period))
        .await?;

    info!("PIA shutdown complete");

    Ok(())
}

/// Reloads the project registry on every SIGHUP.
///
/// A failed reload keeps the previous registry in service.
#[cfg(unix)]
async fn reload_on_sighup(registry: Arc<RegistryHandle>, path: PathBuf) {
    let mut stream = match signal::unix::signal(signal::unix::SignalKind::hangup()) {
        Ok(stream) => stream,
        Err(e) => {
            error!("Failed to listen for SIGHUP, registry reload disabled: {}", e);
            return;
        }
    };

    while stream.recv().await.is_some() {
        info!("Received SIGHUP, reloading project registry");
        if let Ok(count) = reload_projects_file(&registry, &path) {
            info!(projects = count, "Project registry reloaded");
        }
    }
}

#[cfg(not(unix))]
async fn reload_on_sighup(_registry: Arc<RegistryHandle>, _path: PathBuf) {}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and drain period is complete.
async fn shutdown_signal(drain_period: Duration) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    if drain_period.is_zero() {
        info!("Skipping drain period (PIA_DRAIN_SECONDS=0)");
    } else {
        warn!(
            "Draining connections for {} seconds...",
            drain_period.as_secs()
        );
        tokio::time::sleep(drain_period).await;
        info!("Drain period complete");
    }
}
