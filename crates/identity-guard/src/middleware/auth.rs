//! Authentication middleware for protected routes.
//!
//! `require_auth` runs the guard on the request's `Authorization` header
//! and injects [`VerifiedClaims`] into request extensions. `require_scope`
//! layers a scope check on top for routes that need one.

use crate::auth::{AuthDecision, AuthGuard, VerifiedClaims};
use crate::errors::AuthError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub guard: Arc<AuthGuard>,
}

/// Authentication middleware that validates bearer tokens.
///
/// # Response
///
/// - On deny, returns the error's status with a plain-text message and a
///   `WWW-Authenticate` challenge; the wrapped handler does not run
/// - On allow, continues to the next handler with claims in extensions
#[instrument(skip_all, name = "guard.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Response {
    match state.guard.authorize_headers(req.headers()).await {
        AuthDecision::Allow(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        AuthDecision::Deny(error) => {
            tracing::debug!(
                target: "guard.middleware.auth",
                kind = error.kind(),
                "Request denied"
            );
            error.into_response()
        }
    }
}

/// State for the scope middleware.
#[derive(Debug, Clone)]
pub struct ScopeState {
    /// Delegated scope the route requires.
    pub required: String,
}

impl ScopeState {
    pub fn new(required: impl Into<String>) -> Self {
        Self {
            required: required.into(),
        }
    }
}

/// Scope middleware. Must run inside `require_auth`.
///
/// A request without verified claims is denied with the generic
/// `InvalidHeader` error.
#[instrument(skip_all, name = "guard.middleware.scope")]
pub async fn require_scope(
    State(state): State<Arc<ScopeState>>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let claims = req.claims().ok_or_else(|| {
        tracing::warn!(target: "guard.middleware.auth", "Scope check reached without verified claims");
        AuthError::InvalidHeader
    })?;

    claims.require_scope(&state.required)?;

    Ok(next.run(req).await)
}

/// Extension trait for extracting claims from request.
pub trait ClaimsExt {
    /// Get the verified claims from request extensions.
    ///
    /// Returns `None` if auth middleware was not applied to this request.
    fn claims(&self) -> Option<&VerifiedClaims>;
}

impl<B> ClaimsExt for axum::http::Request<B> {
    fn claims(&self) -> Option<&VerifiedClaims> {
        self.extensions().get::<VerifiedClaims>()
    }
}
