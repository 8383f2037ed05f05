//! JWT utilities shared across Identity Guard crates.
//!
//! This module provides the signature-agnostic parts of token handling:
//! - A size ceiling applied before any decoding
//! - Clock skew constants for time-based claim validation
//! - Key ID extraction from the JWT header
//! - Unverified payload decoding (routing decisions only)
//! - Future `iat` rejection with clock skew
//!
//! # Security
//!
//! Nothing decoded here is trusted until the signature has been verified.
//! Oversized tokens are refused before their segments are touched.
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{decode_unverified_claims, extract_kid, validate_iat};
//!
//! // Selects the signing key in the tenant's key set
//! let kid = extract_kid(token)?;
//!
//! // Routing-only view of the payload
//! let claims = decode_unverified_claims(token)?;
//!
//! // Once the signature checks out
//! validate_iat(iat, clock_skew)?;
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

/// Largest bearer token accepted, in bytes.
///
/// Microsoft identity platform access tokens are usually 1-3 KiB, but a
/// token carrying the full 200 `groups` before overage kicks in is around
/// 11 KiB. Anything longer than this ceiling is refused before base64
/// decoding or signature work.
pub const MAX_JWT_SIZE_BYTES: usize = 64 * 1024;

/// Default JWT clock skew tolerance.
///
/// Expiry is checked against wall-clock time with no tolerance unless the
/// deployment configures one.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(0);

/// Upper bound for a configured clock skew (10 minutes).
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(10 * 60);

/// Failures while inspecting a token without verifying it.
///
/// Display strings stay vague; the specifics go to the `common.jwt` debug log.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    #[error("Bearer token exceeds the size limit")]
    TokenTooLarge,

    /// Not three base64url segments, or a segment is not a JSON object.
    #[error("Bearer token is not a well-formed JWT")]
    MalformedToken,

    /// Header has no non-empty string `kid`.
    #[error("Bearer token header has no key id")]
    MissingKid,

    #[error("Bearer token was issued in the future")]
    IatTooFarInFuture,
}

/// Split a compact JWT into its header, payload and signature segments.
///
/// Enforces [`MAX_JWT_SIZE_BYTES`] before looking at the contents.
fn split_segments(token: &str) -> Result<(&str, &str, &str), JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            limit = MAX_JWT_SIZE_BYTES,
            "Token rejected: too large"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(header), Some(payload), Some(signature), None) => Ok((header, payload, signature)),
        _ => {
            tracing::debug!(target: "common.jwt", "Token rejected: invalid JWT format");
            Err(JwtValidationError::MalformedToken)
        }
    }
}

/// Decode one base64url segment into a JSON object.
///
/// Trailing `=` padding is tolerated; some issuers and test tools emit it.
fn decode_json_segment(segment: &str) -> Result<Map<String, Value>, JwtValidationError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|e| {
            tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT segment base64");
            JwtValidationError::MalformedToken
        })?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => {
            tracing::debug!(target: "common.jwt", "JWT segment is not a JSON object");
            Err(JwtValidationError::MalformedToken)
        }
        Err(e) => {
            tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT segment JSON");
            Err(JwtValidationError::MalformedToken)
        }
    }
}

/// Read the header's `kid` without touching the signature.
///
/// The identity platform publishes several keys at once and rotates them;
/// the `kid` picks one. Use it only as a lookup key into a key set fetched
/// from the issuer.
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds size limit
/// - `MalformedToken` - Wrong segment count, bad base64url, or header is not a JSON object
/// - `MissingKid` - No `kid`, or `kid` is not a non-empty string
pub fn extract_kid(token: &str) -> Result<String, JwtValidationError> {
    let (header_part, _, _) = split_segments(token)?;
    let header = decode_json_segment(header_part)?;

    // Extract kid as string, rejecting empty values
    header
        .get("kid")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(JwtValidationError::MissingKid)
}

/// Decode the JWT payload into a claim map without verifying the signature.
///
/// Expired tokens and tokens with invalid signatures decode successfully;
/// only a malformed encoding fails. The result must only drive routing
/// decisions (token version, scope pre-checks) and never authorization.
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds size limit
/// - `MalformedToken` - Wrong segment count, bad base64url, or payload is not a JSON object
pub fn decode_unverified_claims(token: &str) -> Result<Map<String, Value>, JwtValidationError> {
    let (_, payload_part, _) = split_segments(token)?;
    decode_json_segment(payload_part)
}

/// Reject an `iat` (issued-at) later than now plus `clock_skew`.
///
/// # Errors
///
/// `IatTooFarInFuture` when the token claims to be issued in the future.
pub fn validate_iat(iat: i64, clock_skew: Duration) -> Result<(), JwtValidationError> {
    validate_iat_at(iat, clock_skew, chrono::Utc::now().timestamp())
}

/// [`validate_iat`] against a fixed `now`.
pub(crate) fn validate_iat_at(
    iat: i64,
    clock_skew: Duration,
    now: i64,
) -> Result<(), JwtValidationError> {
    // Configured skew never exceeds MAX_CLOCK_SKEW; saturate for anything else
    let skew = i64::try_from(clock_skew.as_secs()).unwrap_or(i64::MAX);
    let max_iat = now.saturating_add(skew);

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            "Token rejected: issued in the future"
        );
        return Err(JwtValidationError::IatTooFarInFuture);
    }

    Ok(())
}
