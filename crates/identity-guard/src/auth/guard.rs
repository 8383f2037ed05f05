//! The authorization guard: one decision per inbound request.
//!
//! Pipeline: extract bearer token, get the tenant's key set, read the
//! token's `kid`, select the signing key, pick validation rules from the
//! unverified `ver` claim, verify. Every stage returns
//! `Result<_, AuthError>`; [`AuthGuard::authorize`] folds the result into
//! an [`AuthDecision`] after hiding internal failure detail behind
//! `InvalidHeader`.

use crate::auth::claims::{UnverifiedClaims, VerifiedClaims};
use crate::auth::extractor::{bearer_from_headers, extract_bearer_token};
use crate::auth::jwks::KeyDiscoveryClient;
use crate::auth::jwt::{verify_token, TokenVersion, ValidationRules};
use crate::auth::keyset::{KeySet, SigningKey};
use crate::config::GuardConfig;
use crate::errors::AuthError;
use crate::observability::metrics::record_token_validation;
use axum::http::HeaderMap;
use common::jwt::extract_kid;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Outcome of one authorization attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthDecision {
    /// Token verified; the handler may run with these claims.
    Allow(VerifiedClaims),
    /// Request rejected; the error carries status and message.
    Deny(AuthError),
}

impl AuthDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AuthDecision::Allow(_))
    }

    pub fn into_result(self) -> Result<VerifiedClaims, AuthError> {
        match self {
            AuthDecision::Allow(claims) => Ok(claims),
            AuthDecision::Deny(error) => Err(error),
        }
    }
}

/// Validates bearer tokens issued for one tenant and client.
pub struct AuthGuard {
    config: GuardConfig,
    discovery: Arc<KeyDiscoveryClient>,
}

impl AuthGuard {
    pub fn new(config: GuardConfig, discovery: Arc<KeyDiscoveryClient>) -> Self {
        Self { config, discovery }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn discovery(&self) -> &Arc<KeyDiscoveryClient> {
        &self.discovery
    }

    /// Decide on a raw `Authorization` header value.
    #[instrument(skip_all)]
    pub async fn authorize(&self, authorization: Option<&str>) -> AuthDecision {
        let start = Instant::now();
        let result = self.authenticate(authorization).await;
        self.decide(result, start)
    }

    /// Decide on a request's headers.
    #[instrument(skip_all)]
    pub async fn authorize_headers(&self, headers: &HeaderMap) -> AuthDecision {
        let start = Instant::now();
        let result = match bearer_from_headers(headers) {
            Ok(token) => self.authenticate_token(token).await,
            Err(e) => Err(e),
        };
        self.decide(result, start)
    }

    fn decide(&self, result: Result<VerifiedClaims, AuthError>, start: Instant) -> AuthDecision {
        let result = result.map_err(AuthError::at_guard_boundary);
        let duration = start.elapsed();

        match result {
            Ok(claims) => {
                tracing::debug!(target: "guard.auth.guard", "Token authorized");
                record_token_validation("success", None, duration);
                AuthDecision::Allow(claims)
            }
            Err(error) => {
                tracing::debug!(
                    target: "guard.auth.guard",
                    kind = error.kind(),
                    category = error.category().as_str(),
                    status = error.status_code(),
                    "Token rejected"
                );
                record_token_validation("error", Some(error.category().as_str()), duration);
                AuthDecision::Deny(error)
            }
        }
    }

    async fn authenticate(&self, authorization: Option<&str>) -> Result<VerifiedClaims, AuthError> {
        let token = extract_bearer_token(authorization)?;
        self.authenticate_token(token).await
    }

    async fn authenticate_token(&self, token: &str) -> Result<VerifiedClaims, AuthError> {
        let key_set = self.discovery.key_set(&self.config.tenant_id).await?;

        let kid = extract_kid(token).map_err(|e| {
            tracing::debug!(target: "guard.auth.guard", error = ?e, "Unable to read token kid");
            AuthError::InvalidHeader
        })?;

        let key = self.select_key(&key_set, &kid).await?;

        let claims = UnverifiedClaims::read(token)?;
        let version = TokenVersion::from_claim(claims.version()?);
        let rules = ValidationRules::for_version(version, &self.config);

        verify_token(token, &key, &rules, self.config.clock_skew)
    }

    /// Select the token's key, refreshing a stale cached set once on a miss.
    ///
    /// A failed refresh is reported as `KeyNotFound`, the same as a miss.
    async fn select_key(&self, key_set: &KeySet, kid: &str) -> Result<SigningKey, AuthError> {
        if let Some(key) = key_set.select(kid) {
            return Ok(key.clone());
        }

        match self
            .discovery
            .refresh_for_unknown_key(&self.config.tenant_id, key_set)
            .await
        {
            Ok(Some(refreshed)) => refreshed.select(kid).cloned().ok_or_else(|| {
                tracing::debug!(target: "guard.auth.guard", kid = %kid, "Key not found after refresh");
                AuthError::KeyNotFound
            }),
            Ok(None) => {
                tracing::debug!(target: "guard.auth.guard", kid = %kid, "Key not found in key set");
                Err(AuthError::KeyNotFound)
            }
            Err(e) => {
                tracing::warn!(target: "guard.auth.guard", error = %e, "Key set refresh failed");
                Err(AuthError::KeyNotFound)
            }
        }
    }
}
