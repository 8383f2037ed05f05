//! Bearer token extraction from the `Authorization` header.

use crate::errors::AuthError;
use axum::http::{header::AUTHORIZATION, HeaderMap};

/// Pull the bearer token out of a raw `Authorization` header value.
///
/// The value is split on whitespace. The scheme comparison is
/// case-insensitive; exactly two parts are accepted.
///
/// # Errors
///
/// - `MissingHeader` - no header, or a header with nothing but whitespace
/// - `MalformedScheme` - first part is not `bearer`
/// - `MissingToken` - `Bearer` with no token after it
/// - `MalformedHeader` - more than two parts
pub fn extract_bearer_token(authorization: Option<&str>) -> Result<&str, AuthError> {
    let authorization = authorization.ok_or_else(|| {
        tracing::debug!(target: "guard.auth.extractor", "Missing Authorization header");
        AuthError::MissingHeader
    })?;

    let mut parts = authorization.split_whitespace();

    let scheme = parts.next().ok_or(AuthError::MissingHeader)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        tracing::debug!(target: "guard.auth.extractor", "Authorization scheme is not Bearer");
        return Err(AuthError::MalformedScheme);
    }

    let token = parts.next().ok_or(AuthError::MissingToken)?;

    if parts.next().is_some() {
        tracing::debug!(target: "guard.auth.extractor", "Authorization header has extra parts");
        return Err(AuthError::MalformedHeader);
    }

    Ok(token)
}

/// Pull the bearer token out of a request's headers.
///
/// A header value that is not visible ASCII is reported as `MalformedHeader`.
pub fn bearer_from_headers(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = match headers.get(AUTHORIZATION) {
        Some(value) => Some(value.to_str().map_err(|_| {
            tracing::debug!(target: "guard.auth.extractor", "Authorization header is not valid ASCII");
            AuthError::MalformedHeader
        })?),
        None => None,
    };

    extract_bearer_token(value)
}
