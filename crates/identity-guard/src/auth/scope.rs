//! Delegated scope (`scp`) checks.

use crate::auth::claims::UnverifiedClaims;
use crate::auth::extractor::bearer_from_headers;
use crate::errors::AuthError;
use axum::http::HeaderMap;

/// Check a raw `scp` claim for `required`.
///
/// The claim is split on whitespace and must contain `required` exactly.
///
/// # Errors
///
/// - `NoScopeClaim` - no `scp` claim
/// - `ScopeMismatch` - `scp` present (possibly empty) without `required`
pub fn check_scope(scp: Option<&str>, required: &str) -> Result<(), AuthError> {
    let scp = scp.ok_or_else(|| {
        tracing::debug!(target: "guard.auth.scope", "Token has no scp claim");
        AuthError::NoScopeClaim
    })?;

    if scp.split_whitespace().any(|scope| scope == required) {
        Ok(())
    } else {
        tracing::debug!(target: "guard.auth.scope", required = %required, "Required scope not granted");
        Err(AuthError::ScopeMismatch {
            required: required.to_string(),
        })
    }
}

/// Check the request's bearer token for `required` without verifying it.
///
/// The token's signature is NOT checked here. Only call this for requests
/// that already passed the guard, or where an unverified scope read is
/// acceptable.
///
/// # Errors
///
/// Header errors from token extraction, `UnparsableToken` if the payload
/// cannot be decoded, and the scope errors of [`check_scope`].
pub fn validate_scope(required: &str, headers: &HeaderMap) -> Result<(), AuthError> {
    let token = bearer_from_headers(headers)?;
    let claims = UnverifiedClaims::read(token)?;
    check_scope(claims.scope(), required)
}
