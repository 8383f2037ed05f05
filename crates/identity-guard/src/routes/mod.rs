//! HTTP routes for the Identity Guard demo service.
//!
//! Defines the Axum router and application state.

use crate::auth::AuthGuard;
use crate::config::Config;
use crate::handlers;
use crate::middleware::{
    http_metrics_middleware, require_auth, require_scope, AuthState, ScopeState,
};
use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Token guard shared by the middleware and readiness probe.
    pub guard: Arc<AuthGuard>,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe (simple "OK") - public
/// - `/ready` - Readiness probe (signing keys obtainable) - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - `/api/v1/me` - Current principal - requires a valid bearer token, and
///   `REQUIRED_SCOPE` when configured
/// - TraceLayer for request logging
/// - 30 second request timeout
/// - HTTP metrics middleware (outermost)
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let auth_state = Arc::new(AuthState {
        guard: Arc::clone(&state.guard),
    });

    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .with_state(Arc::clone(&state));

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let mut protected_routes = Router::new().route("/api/v1/me", get(handlers::get_me));

    // Scope layer goes on first so it runs inside require_auth
    if let Some(scope) = &state.config.required_scope {
        protected_routes = protected_routes.route_layer(middleware::from_fn_with_state(
            Arc::new(ScopeState::new(scope.clone())),
            require_scope,
        ));
    }

    let protected_routes = protected_routes
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth))
        .with_state(state);

    // Last layer added runs first: metrics see timeouts and guard denials,
    // the trace span sits inside the timeout.
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}
