//! Middleware for Identity Guard.
//!
//! # Components
//!
//! - `auth` - Bearer token and scope checks for protected routes
//! - `http_metrics` - HTTP request metrics for every response

pub mod auth;
pub mod http_metrics;

pub use auth::{require_auth, require_scope, AuthState, ClaimsExt, ScopeState};
pub use http_metrics::http_metrics_middleware;
