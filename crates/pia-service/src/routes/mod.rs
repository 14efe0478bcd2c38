//! HTTP routes for PIA.
//!
//! Defines the Axum router and application state.

use crate::auth::{HttpFetcher, OidcResolver, TokenAuthenticator};
use crate::config::Config;
use crate::handlers;
use crate::middleware::http_metrics_middleware;
use crate::registry::RegistryHandle;
use crate::services::{DependencyTrackClientTrait, UploadAuthorizer};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Current project registry; swapped on reload.
    pub registry: Arc<RegistryHandle>,

    /// Authorization pipeline.
    pub authorizer: Arc<UploadAuthorizer>,

    /// DependencyTrack relay client.
    pub dt_client: Arc<dyn DependencyTrackClientTrait>,
}

impl AppState {
    /// Wire the authorization pipeline from configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - Service configuration (audience, skew, fetch timeout)
    /// * `registry` - Registry handle shared with the reload task
    /// * `fetcher` - Network capability for OIDC discovery
    /// * `dt_client` - DependencyTrack relay client
    pub fn new(
        config: Config,
        registry: Arc<RegistryHandle>,
        fetcher: Arc<dyn HttpFetcher>,
        dt_client: Arc<dyn DependencyTrackClientTrait>,
    ) -> Self {
        let resolver = Arc::new(OidcResolver::new(fetcher, config.oidc_fetch_timeout));
        let authenticator = TokenAuthenticator::new(resolver, config.jwt_clock_skew);
        let authorizer = Arc::new(UploadAuthorizer::new(
            registry.clone(),
            authenticator,
            config.expected_audience.clone(),
        ));

        Self {
            config,
            registry,
            authorizer,
            dt_client,
        }
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe (simple "OK")
/// - `/ready` - Readiness probe (registry has at least one project)
/// - `/metrics` - Prometheus metrics endpoint
/// - `/v1/upload/sbom` - Authorized SBOM upload relayed to DependencyTrack
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let app_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/v1/upload/sbom", post(handlers::upload_sbom))
        .with_state(state);

    // Metrics route with its own state
    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    app_routes
        .merge(metrics_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}
