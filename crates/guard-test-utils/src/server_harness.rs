//! Test server harness for E2E testing
//!
//! Provides `TestGuardServer` for spawning a real Identity Guard service
//! in tests, backed by a wiremock discovery endpoint.

use crate::crypto_fixtures::{jwks_json, TestKeypair};
use identity_guard::auth::{AuthGuard, KeyDiscoveryClient};
use identity_guard::config::Config;
use identity_guard::routes::{self, AppState};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Tenant id the harness configures the guard with.
pub const TEST_TENANT_ID: &str = "9188040d-6c67-4c5b-b112-36a304b66dad";

/// Client id the harness configures the guard with.
pub const TEST_CLIENT_ID: &str = "6e74172b-be56-4843-9ff4-e66a39bb12e3";

/// Options for [`TestGuardServer::spawn_with`].
#[derive(Debug, Clone)]
pub struct HarnessOptions {
    /// Keys published on the discovery endpoint. When empty, no discovery
    /// mock is mounted and the endpoint answers 404.
    pub keys: Vec<TestKeypair>,

    /// Sets `REQUIRED_SCOPE` on the service.
    pub required_scope: Option<String>,

    /// Sets `JWKS_CACHE_TTL_SECONDS` on the service.
    pub jwks_cache_ttl_seconds: Option<u64>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            keys: vec![TestKeypair::primary()],
            required_scope: None,
            jwks_cache_ttl_seconds: None,
        }
    }
}

impl HarnessOptions {
    pub fn with_keys(mut self, keys: Vec<TestKeypair>) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_required_scope(mut self, scope: &str) -> Self {
        self.required_scope = Some(scope.to_string());
        self
    }

    pub fn with_cache_ttl(mut self, seconds: u64) -> Self {
        self.jwks_cache_ttl_seconds = Some(seconds);
        self
    }
}

/// Test harness for spawning the Identity Guard service in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_me_requires_token() -> Result<()> {
///     let server = TestGuardServer::spawn().await?;
///     let client = reqwest::Client::new();
///
///     let response = client
///         .get(format!("{}/api/v1/me", server.url()))
///         .send()
///         .await?;
///
///     assert_eq!(response.status(), 401);
///     Ok(())
/// }
/// ```
pub struct TestGuardServer {
    addr: SocketAddr,
    config: Config,
    discovery: MockServer,
    _handle: JoinHandle<()>,
}

impl TestGuardServer {
    /// Spawn a server publishing the primary fixture key, with no scope
    /// requirement.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with(HarnessOptions::default()).await
    }

    /// Spawn a new test server instance.
    ///
    /// The server will:
    /// - Start a mock discovery endpoint for [`TEST_TENANT_ID`]
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Start the HTTP server in the background
    pub async fn spawn_with(options: HarnessOptions) -> Result<Self, anyhow::Error> {
        let discovery = MockServer::start().await;

        if !options.keys.is_empty() {
            let keys: Vec<&TestKeypair> = options.keys.iter().collect();
            Mock::given(method("GET"))
                .and(path(format!("/{}/discovery/v2.0/keys", TEST_TENANT_ID)))
                .respond_with(ResponseTemplate::new(200).set_body_json(jwks_json(&keys)))
                .mount(&discovery)
                .await;
        }

        let mut vars = HashMap::from([
            ("AZURE_TENANT_ID".to_string(), TEST_TENANT_ID.to_string()),
            ("AZURE_CLIENT_ID".to_string(), TEST_CLIENT_ID.to_string()),
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("AUTHORITY_URL".to_string(), discovery.uri()),
        ]);
        if let Some(scope) = &options.required_scope {
            vars.insert("REQUIRED_SCOPE".to_string(), scope.clone());
        }
        if let Some(ttl) = options.jwks_cache_ttl_seconds {
            vars.insert("JWKS_CACHE_TTL_SECONDS".to_string(), ttl.to_string());
        }

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let discovery_client = Arc::new(
            KeyDiscoveryClient::from_config(&config)
                .map_err(|e| anyhow::anyhow!("Failed to create discovery client: {}", e))?,
        );
        let guard = Arc::new(AuthGuard::new(config.guard_config(), discovery_client));
        let state = Arc::new(AppState {
            config: config.clone(),
            guard,
        });

        // Recorder is not installed globally; each server renders its own handle
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

        let app = routes::build_routes(state, metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            discovery,
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

    /// Mock discovery endpoint, for mounting extra responses or
    /// inspecting received requests.
    pub fn discovery(&self) -> &MockServer {
        &self.discovery
    }
}

impl Drop for TestGuardServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}
