//! Liveness and readiness probes.

use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

/// Readiness probe response body.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,

    /// Whether the tenant's signing keys can be obtained.
    pub signing_keys: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Liveness probe handler.
///
/// Returns "OK" without checking any dependency.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness probe handler.
///
/// Ready when the tenant's signing keys can be obtained, from cache or a
/// fresh fetch. Returns 503 otherwise; the failure detail is only logged.
#[tracing::instrument(skip_all, name = "guard.health.readiness")]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let guard = &state.guard;

    match guard.discovery().key_set(&guard.config().tenant_id).await {
        Ok(_) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready",
                signing_keys: "available",
                error: None,
            }),
        ),
        Err(e) => {
            tracing::warn!(target: "guard.availability", error = %e, "Readiness check failed: signing keys unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    status: "not_ready",
                    signing_keys: "unavailable",
                    error: Some("Service dependencies unavailable".to_string()),
                }),
            )
        }
    }
}
