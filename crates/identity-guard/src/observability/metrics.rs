//! Metrics definitions for Identity Guard.
//!
//! All metrics follow Prometheus naming conventions:
//! - `guard_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `method`: 7 values max (GET, POST, PATCH, DELETE, PUT, HEAD, OPTIONS)
//! - `endpoint`: known paths plus `/other`
//! - `status`: 3 values (success, error, timeout)
//! - `outcome`: success/error for validations, 4 values for key fetches
//! - `error_category`: bounded by `ErrorCategory`

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Token validation is CPU-bound unless a key fetch is needed
        .set_buckets_for_metric(
            Matcher::Prefix("guard_token_validation".to_string()),
            &[
                0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set token validation buckets: {e}"))?
        // Key discovery is an outbound HTTPS call
        .set_buckets_for_metric(
            Matcher::Prefix("guard_jwks_fetch".to_string()),
            &[
                0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set key fetch buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("guard_http".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Token Validation Metrics
// ============================================================================

/// Record one guard decision.
///
/// Metric: `guard_token_validations_total`, `guard_token_validation_duration_seconds`
/// Labels: `outcome`, `error_category`
pub fn record_token_validation(outcome: &str, error_category: Option<&str>, duration: Duration) {
    let category = error_category.unwrap_or("none");

    histogram!("guard_token_validation_duration_seconds",
        "outcome" => outcome.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("guard_token_validations_total",
        "outcome" => outcome.to_string(),
        "error_category" => category.to_string()
    )
    .increment(1);
}

// ============================================================================
// Key Discovery Metrics
// ============================================================================

/// Record a signing key fetch.
///
/// Metric: `guard_jwks_fetches_total`, `guard_jwks_fetch_duration_seconds`
/// Labels: `outcome` (success, unavailable, malformed, unreachable)
pub fn record_jwks_fetch(outcome: &str, duration: Duration) {
    histogram!("guard_jwks_fetch_duration_seconds",
        "outcome" => outcome.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("guard_jwks_fetches_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a key set cache lookup.
///
/// Metric: `guard_jwks_cache_total`
/// Labels: `result` (hit, miss)
pub fn record_jwks_cache(hit: bool) {
    let result = if hit { "hit" } else { "miss" };

    counter!("guard_jwks_cache_total",
        "result" => result
    )
    .increment(1);
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `guard_http_requests_total`, `guard_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("guard_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("guard_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Unknown paths collapse to `/other` to bound cardinality.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/" => "/",
        "/health" => "/health",
        "/ready" => "/ready",
        "/metrics" => "/metrics",
        "/api/v1/me" => "/api/v1/me",
        _ => "/other",
    }
}
