//! Identity Guard Library
//!
//! Inbound bearer-token authentication for HTTP services that accept
//! access tokens issued by the Microsoft identity platform (v1 and v2
//! token formats).
//!
//! # Pipeline
//!
//! ```text
//! Authorization header -> extractor -> jwks (key set) -> keyset (kid)
//!     -> claims (ver) -> jwt (RS256 + aud/iss/exp) -> AuthDecision
//! ```
//!
//! # Modules
//!
//! - `auth` - Token pipeline and `AuthGuard`
//! - `config` - Service configuration from environment
//! - `errors` - `AuthError` with HTTP status code mapping
//! - `middleware` - Axum middleware (`require_auth`, `require_scope`, HTTP metrics)
//! - `handlers` - Demo service handlers
//! - `observability` - Metrics definitions and Prometheus recorder
//! - `routes` - Axum router setup

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;
