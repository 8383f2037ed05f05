//! Signing key discovery client.
//!
//! Fetches the tenant's published signing keys from
//! `{authority}/{tenant}/discovery/v2.0/keys` and optionally caches them
//! per tenant with a TTL.
//!
//! # Concurrency
//!
//! - The HTTP fetch runs without holding the cache lock; the write lock is
//!   only taken to swap in a finished [`KeySet`]
//! - Concurrent refreshes for the same tenant may both fetch; last writer wins
//! - Failed fetches are not retried and never replace a cached set

use crate::auth::keyset::{JwksResponse, KeySet};
use crate::config::{Config, DEFAULT_JWKS_CACHE_TTL_SECONDS, DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS};
use crate::errors::AuthError;
use crate::observability::metrics::{record_jwks_cache, record_jwks_fetch};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::instrument;

/// Default minimum age of a cached key set before an unknown `kid` may
/// trigger a refresh.
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Failure to construct a [`KeyDiscoveryClient`].
#[derive(Debug, Error)]
pub enum DiscoveryClientError {
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Tunables for [`KeyDiscoveryClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoverySettings {
    /// How long a fetched key set is served from cache. Zero disables caching.
    pub cache_ttl: Duration,

    /// Timeout for one discovery request.
    pub fetch_timeout: Duration,

    /// A cached set younger than this is not refreshed on an unknown `kid`.
    pub min_refresh_interval: Duration,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(DEFAULT_JWKS_CACHE_TTL_SECONDS),
            fetch_timeout: Duration::from_secs(DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS),
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
        }
    }
}

/// Client for fetching and caching a tenant's signing keys.
pub struct KeyDiscoveryClient {
    /// Identity provider authority, without trailing slash.
    authority_url: String,

    http_client: reqwest::Client,

    /// Cached key sets by tenant id.
    cache: RwLock<HashMap<String, Arc<KeySet>>>,

    settings: DiscoverySettings,
}

impl KeyDiscoveryClient {
    /// Create a client with default settings.
    pub fn new(authority_url: impl Into<String>) -> Result<Self, DiscoveryClientError> {
        Self::with_settings(authority_url, DiscoverySettings::default())
    }

    /// Create a client with custom cache and timeout settings.
    ///
    /// # Errors
    ///
    /// `HttpClient` when the HTTP client cannot be built; there is no
    /// fallback client without the fetch timeout.
    pub fn with_settings(
        authority_url: impl Into<String>,
        settings: DiscoverySettings,
    ) -> Result<Self, DiscoveryClientError> {
        let http_client = reqwest::Client::builder()
            .timeout(settings.fetch_timeout)
            .build()
            .map_err(|e| {
                tracing::error!(target: "guard.auth.jwks", error = %e, "Failed to build HTTP client");
                DiscoveryClientError::HttpClient(e.to_string())
            })?;

        Ok(Self {
            authority_url: authority_url.into().trim_end_matches('/').to_string(),
            http_client,
            cache: RwLock::new(HashMap::new()),
            settings,
        })
    }

    /// Create a client from service configuration.
    pub fn from_config(config: &Config) -> Result<Self, DiscoveryClientError> {
        Self::with_settings(
            config.authority_url.clone(),
            DiscoverySettings {
                cache_ttl: Duration::from_secs(config.jwks_cache_ttl_seconds),
                fetch_timeout: Duration::from_secs(config.jwks_fetch_timeout_seconds),
                ..DiscoverySettings::default()
            },
        )
    }

    /// Discovery URL for a tenant.
    pub fn discovery_url(&self, tenant_id: &str) -> String {
        format!("{}/{}/discovery/v2.0/keys", self.authority_url, tenant_id)
    }

    pub fn caching_enabled(&self) -> bool {
        !self.settings.cache_ttl.is_zero()
    }

    pub fn settings(&self) -> &DiscoverySettings {
        &self.settings
    }

    /// Get the tenant's current key set.
    ///
    /// Served from cache while younger than the TTL; fetched otherwise.
    ///
    /// # Errors
    ///
    /// - `DiscoveryUnavailable` - endpoint returned a non-success status
    /// - `DiscoveryMalformed` - body is not a key set
    /// - `DiscoveryUnreachable` - request failed or timed out
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn key_set(&self, tenant_id: &str) -> Result<Arc<KeySet>, AuthError> {
        if self.caching_enabled() {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(tenant_id) {
                if cached.age() < self.settings.cache_ttl {
                    tracing::debug!(target: "guard.auth.jwks", "Key set cache hit");
                    record_jwks_cache(true);
                    return Ok(Arc::clone(cached));
                }
            }
            record_jwks_cache(false);
        }

        self.refresh(tenant_id).await
    }

    /// Fetch the tenant's key set, bypassing the cache, and store it.
    ///
    /// # Errors
    ///
    /// Same as [`KeyDiscoveryClient::key_set`]. A failed fetch leaves any
    /// cached set in place.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn refresh(&self, tenant_id: &str) -> Result<Arc<KeySet>, AuthError> {
        let key_set = Arc::new(self.fetch(tenant_id).await?);

        if self.caching_enabled() {
            let mut cache = self.cache.write().await;
            cache.insert(tenant_id.to_string(), Arc::clone(&key_set));
        }

        Ok(key_set)
    }

    /// Refresh once for a `kid` missing from `current`.
    ///
    /// Returns `Ok(None)` when a refresh would not help: caching is off (so
    /// `current` was just fetched) or `current` is younger than the minimum
    /// refresh interval.
    pub async fn refresh_for_unknown_key(
        &self,
        tenant_id: &str,
        current: &KeySet,
    ) -> Result<Option<Arc<KeySet>>, AuthError> {
        if !self.caching_enabled() || current.age() < self.settings.min_refresh_interval {
            return Ok(None);
        }

        tracing::debug!(target: "guard.auth.jwks", tenant_id = %tenant_id, "Unknown kid in cached key set, refreshing");
        self.refresh(tenant_id).await.map(Some)
    }

    /// Drop every cached key set.
    pub async fn clear_cache(&self) {
        self.cache.write().await.clear();
    }

    async fn fetch(&self, tenant_id: &str) -> Result<KeySet, AuthError> {
        let url = self.discovery_url(tenant_id);
        let start = Instant::now();

        tracing::debug!(target: "guard.auth.jwks", url = %url, "Fetching signing keys");

        let result = self.fetch_from(&url).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(AuthError::DiscoveryUnavailable) => "unavailable",
            Err(AuthError::DiscoveryMalformed) => "malformed",
            Err(_) => "unreachable",
        };
        record_jwks_fetch(outcome, start.elapsed());

        if let Ok(key_set) = &result {
            tracing::info!(
                target: "guard.auth.jwks",
                key_count = key_set.len(),
                "Signing keys fetched"
            );
        }

        result
    }

    async fn fetch_from(&self, url: &str) -> Result<KeySet, AuthError> {
        let response = self.http_client.get(url).send().await.map_err(|e| {
            tracing::error!(target: "guard.auth.jwks", error = %e, "Failed to fetch signing keys");
            AuthError::DiscoveryUnreachable
        })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "guard.auth.jwks",
                status = %response.status(),
                "Discovery endpoint returned error"
            );
            return Err(AuthError::DiscoveryUnavailable);
        }

        let body = response.bytes().await.map_err(|e| {
            tracing::error!(target: "guard.auth.jwks", error = %e, "Failed to read discovery response");
            AuthError::DiscoveryUnreachable
        })?;

        let jwks: JwksResponse = serde_json::from_slice(&body).map_err(|e| {
            tracing::error!(target: "guard.auth.jwks", error = %e, "Failed to parse discovery response");
            AuthError::DiscoveryMalformed
        })?;

        Ok(KeySet::from(jwks))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TENANT: &str = "contoso-tenant";

    fn jwks_body(kids: &[&str]) -> serde_json::Value {
        let keys: Vec<_> = kids
            .iter()
            .map(|kid| json!({"kty": "RSA", "use": "sig", "kid": kid, "n": "AQAB", "e": "AQAB"}))
            .collect();
        json!({ "keys": keys })
    }

    fn client_with(authority_url: impl Into<String>, cache_ttl: Duration) -> KeyDiscoveryClient {
        KeyDiscoveryClient::with_settings(authority_url, settings(cache_ttl)).unwrap()
    }

    fn settings(cache_ttl: Duration) -> DiscoverySettings {
        DiscoverySettings {
            cache_ttl,
            fetch_timeout: Duration::from_secs(5),
            min_refresh_interval: Duration::ZERO,
        }
    }

    #[test]
    fn test_discovery_url() {
        let client = KeyDiscoveryClient::new("https://login.microsoftonline.com/").unwrap();
        assert_eq!(
            client.discovery_url("my-tenant"),
            "https://login.microsoftonline.com/my-tenant/discovery/v2.0/keys"
        );
    }

    #[test]
    fn test_default_settings() {
        let client = KeyDiscoveryClient::new("https://login.microsoftonline.com").unwrap();
        assert!(client.caching_enabled());
        assert_eq!(client.settings().cache_ttl, Duration::from_secs(300));
        assert_eq!(client.settings().fetch_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_zero_ttl_disables_caching() {
        let client = client_with("http://localhost", Duration::ZERO);
        assert!(!client.caching_enabled());
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/{TENANT}/discovery/v2.0/keys")))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_body(&["k1", "k2"])))
            .mount(&server)
            .await;

        let client = KeyDiscoveryClient::new(server.uri()).unwrap();
        let key_set = client.key_set(TENANT).await.unwrap();

        assert_eq!(key_set.len(), 2);
        assert!(key_set.select("k2").is_some());
    }

    #[tokio::test]
    async fn test_non_success_status_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = KeyDiscoveryClient::new(server.uri()).unwrap();
        let err = client.key_set(TENANT).await.unwrap_err();

        assert_eq!(err, AuthError::DiscoveryUnavailable);
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = KeyDiscoveryClient::new(server.uri()).unwrap();
        assert_eq!(
            client.key_set(TENANT).await.unwrap_err(),
            AuthError::DiscoveryMalformed
        );
    }

    #[tokio::test]
    async fn test_body_without_keys_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"issuer": "x"})))
            .mount(&server)
            .await;

        let client = KeyDiscoveryClient::new(server.uri()).unwrap();
        assert_eq!(
            client.key_set(TENANT).await.unwrap_err(),
            AuthError::DiscoveryMalformed
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        // Port 9 (discard) on localhost is not listening in test environments
        let client = client_with("http://127.0.0.1:9", Duration::ZERO);

        assert_eq!(
            client.key_set(TENANT).await.unwrap_err(),
            AuthError::DiscoveryUnreachable
        );
    }

    #[tokio::test]
    async fn test_slow_endpoint_hits_fetch_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/{TENANT}/discovery/v2.0/keys")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(jwks_body(&["key-1"]))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client = KeyDiscoveryClient::with_settings(
            server.uri(),
            DiscoverySettings {
                fetch_timeout: Duration::from_millis(200),
                ..settings(Duration::ZERO)
            },
        )
        .unwrap();

        let start = Instant::now();
        assert_eq!(
            client.key_set(TENANT).await.unwrap_err(),
            AuthError::DiscoveryUnreachable
        );
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_cache_serves_second_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_body(&["k1"])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_with(server.uri(), Duration::from_secs(300));
        client.key_set(TENANT).await.unwrap();
        client.key_set(TENANT).await.unwrap();
    }

    #[tokio::test]
    async fn test_disabled_cache_fetches_every_time() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_body(&["k1"])))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_with(server.uri(), Duration::ZERO);
        client.key_set(TENANT).await.unwrap();
        client.key_set(TENANT).await.unwrap();
    }

    #[tokio::test]
    async fn test_cache_is_per_tenant() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tenant-a/discovery/v2.0/keys"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_body(&["a"])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tenant-b/discovery/v2.0/keys"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_body(&["b"])))
            .mount(&server)
            .await;

        let client = client_with(server.uri(), Duration::from_secs(300));

        assert!(client.key_set("tenant-a").await.unwrap().select("a").is_some());
        assert!(client.key_set("tenant-b").await.unwrap().select("b").is_some());
        assert!(client.key_set("tenant-a").await.unwrap().select("b").is_none());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_cached_set() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_body(&["k1"])))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = client_with(server.uri(), Duration::from_secs(300));
        client.key_set(TENANT).await.unwrap();

        assert_eq!(
            client.refresh(TENANT).await.unwrap_err(),
            AuthError::DiscoveryUnavailable
        );
        assert!(client.key_set(TENANT).await.unwrap().select("k1").is_some());
    }

    #[tokio::test]
    async fn test_refresh_for_unknown_key_respects_min_interval() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_body(&["k1"])))
            .expect(1)
            .mount(&server)
            .await;

        let client = KeyDiscoveryClient::with_settings(
            server.uri(),
            DiscoverySettings {
                min_refresh_interval: Duration::from_secs(3600),
                ..settings(Duration::from_secs(300))
            },
        )
        .unwrap();
        let current = client.key_set(TENANT).await.unwrap();

        let refreshed = client
            .refresh_for_unknown_key(TENANT, &current)
            .await
            .unwrap();
        assert!(refreshed.is_none());
    }

    #[tokio::test]
    async fn test_refresh_for_unknown_key_fetches_rotated_set() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_body(&["old"])))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_body(&["new"])))
            .mount(&server)
            .await;

        let client = client_with(server.uri(), Duration::from_secs(300));
        let current = client.key_set(TENANT).await.unwrap();
        assert!(current.select("new").is_none());

        let refreshed = client
            .refresh_for_unknown_key(TENANT, &current)
            .await
            .unwrap()
            .unwrap();
        assert!(refreshed.select("new").is_some());

        // Cache now holds the rotated set
        assert!(client.key_set(TENANT).await.unwrap().select("new").is_some());
    }

    #[tokio::test]
    async fn test_clear_cache_forces_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_body(&["k1"])))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_with(server.uri(), Duration::from_secs(300));
        client.key_set(TENANT).await.unwrap();
        client.clear_cache().await;
        client.key_set(TENANT).await.unwrap();
    }
}
