//! Test server harness for E2E testing
//!
//! Provides `TestPiaServer` for spawning real PIA server instances in tests.

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use pia_service::auth::HttpFetcher;
use pia_service::config::Config;
use pia_service::registry::{load_projects_file, RegistryHandle};
use pia_service::routes::{self, AppState};
use pia_service::services::DependencyTrackClientTrait;
use std::collections::HashMap;
use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::task::JoinHandle;

/// Test harness for spawning the PIA server in E2E tests.
///
/// The projects YAML is written to a temporary file that lives as long as
/// the server, so reload tests can rewrite it in place.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health_flow_e2e() -> Result<(), anyhow::Error> {
///     let server = TestPiaServer::spawn(
///         PROJECTS_YAML,
///         Arc::new(StaticOidcFetcher::new()),
///         Arc::new(MockDependencyTrackClient::accepting()),
///     )
///     .await?;
///
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestPiaServer {
    addr: SocketAddr,
    config: Config,
    registry: Arc<RegistryHandle>,
    projects_file: NamedTempFile,
    _handle: JoinHandle<()>,
}

impl TestPiaServer {
    /// Spawn a new test server instance.
    ///
    /// The server will:
    /// - Load the registry from `projects_yaml`
    /// - Resolve issuers through `fetcher`
    /// - Relay uploads to `dt_client`
    /// - Bind to a random available port (127.0.0.1:0)
    ///
    /// # Errors
    ///
    /// Fails if the projects YAML is invalid or the server cannot bind.
    pub async fn spawn(
        projects_yaml: &str,
        fetcher: Arc<dyn HttpFetcher>,
        dt_client: Arc<dyn DependencyTrackClientTrait>,
    ) -> Result<Self, anyhow::Error> {
        let mut projects_file =
            NamedTempFile::new().context("Failed to create projects file")?;
        projects_file
            .write_all(projects_yaml.as_bytes())
            .context("Failed to write projects file")?;

        let vars = HashMap::from([
            (
                "PIA_DEPENDENCY_TRACK_API_KEY".to_string(),
                "test-api-key".to_string(),
            ),
            (
                "PIA_PROJECTS_PATH".to_string(),
                projects_file.path().display().to_string(),
            ),
            ("PIA_BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
        ]);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let registry = load_projects_file(projects_file.path())
            .map_err(|e| anyhow::anyhow!("Failed to load projects: {}", e))?;
        let registry = Arc::new(RegistryHandle::new(registry));

        let state = Arc::new(AppState::new(
            config.clone(),
            registry.clone(),
            fetcher,
            dt_client,
        ));

        // A local recorder handle; tests never install a global recorder
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

        // Build routes using pia-service's real route builder
        let app = routes::build_routes(state, metrics_handle);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        // Spawn server in background
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            registry,
            projects_file,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Registry handle the server reads from.
    pub fn registry(&self) -> &Arc<RegistryHandle> {
        &self.registry
    }

    /// Path of the projects file backing the registry.
    pub fn projects_path(&self) -> &Path {
        self.projects_file.path()
    }

    /// Replace the projects file contents (does not reload).
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be written.
    pub fn rewrite_projects(&self, projects_yaml: &str) -> Result<(), anyhow::Error> {
        std::fs::write(self.projects_file.path(), projects_yaml)
            .context("Failed to rewrite projects file")
    }
}

impl Drop for TestPiaServer {
    fn drop(&mut self) {
        // Abort the HTTP server task so each test cleans up its listener
        self._handle.abort();
    }
}
