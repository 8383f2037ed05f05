//! Token signature and claim verification.
//!
//! Microsoft identity platform issues two token formats with different
//! audience and issuer conventions; the unverified `ver` claim picks which
//! [`ValidationRules`] apply.
//!
//! # Security
//!
//! - Only RS256 is accepted, regardless of what the token header claims
//! - `exp`, `aud` and `iss` are required; `nbf` is checked when present
//! - `iat` may not be further in the future than the clock skew
//! - Caller-facing errors carry fixed messages; detail is logged at debug

use crate::auth::claims::VerifiedClaims;
use crate::auth::keyset::SigningKey;
use crate::config::GuardConfig;
use crate::errors::AuthError;
use common::jwt::validate_iat;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};
use std::time::Duration;

/// Token format version, from the unverified `ver` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenVersion {
    V1,
    V2,
}

impl TokenVersion {
    /// `"1.0"` selects v1; any other value selects v2.
    pub fn from_claim(ver: &str) -> Self {
        if ver == "1.0" {
            TokenVersion::V1
        } else {
            TokenVersion::V2
        }
    }
}

/// Expected audience, issuer and algorithms for one token version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRules {
    pub audience: String,
    pub issuer: String,
    pub algorithms: Vec<Algorithm>,
}

impl ValidationRules {
    /// Rules for v1 tokens: `api://` audience, `sts.windows.net` issuer.
    pub fn v1(config: &GuardConfig) -> Self {
        Self {
            audience: format!("api://{}", config.client_id),
            issuer: format!("https://sts.windows.net/{}/", config.tenant_id),
            algorithms: vec![Algorithm::RS256],
        }
    }

    /// Rules for v2 tokens: bare client id audience, v2.0 issuer.
    pub fn v2(config: &GuardConfig) -> Self {
        Self {
            audience: config.client_id.clone(),
            issuer: format!(
                "https://login.microsoftonline.com/{}/v2.0",
                config.tenant_id
            ),
            algorithms: vec![Algorithm::RS256],
        }
    }

    pub fn for_version(version: TokenVersion, config: &GuardConfig) -> Self {
        match version {
            TokenVersion::V1 => Self::v1(config),
            TokenVersion::V2 => Self::v2(config),
        }
    }
}

/// Verify a token's signature against `key` and its claims against `rules`.
///
/// # Errors
///
/// - `TokenExpired` - signature valid, `exp` in the past
/// - `ClaimsInvalid` - wrong audience or issuer, missing required claim,
///   `nbf` in the future, or `iat` too far in the future
/// - `TokenUnparsable` - bad signature, wrong algorithm, unusable key or
///   malformed encoding
pub fn verify_token(
    token: &str,
    key: &SigningKey,
    rules: &ValidationRules,
    clock_skew: Duration,
) -> Result<VerifiedClaims, AuthError> {
    let decoding_key = decoding_key(key)?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.algorithms = rules.algorithms.clone();
    validation.leeway = clock_skew.as_secs();
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.set_audience(&[rules.audience.as_str()]);
    validation.set_issuer(&[rules.issuer.as_str()]);
    validation.set_required_spec_claims(&["exp", "aud", "iss"]);

    let token_data =
        decode::<Map<String, Value>>(token, &decoding_key, &validation).map_err(|e| {
            tracing::debug!(target: "guard.auth.jwt", error = %e, "Token verification failed");
            map_verification_error(e.kind())
        })?;

    let claims = token_data.claims;

    if let Some(iat) = claims.get("iat").and_then(Value::as_i64) {
        if let Err(e) = validate_iat(iat, clock_skew) {
            tracing::debug!(target: "guard.auth.jwt", error = ?e, "Token iat validation failed");
            return Err(AuthError::ClaimsInvalid);
        }
    }

    Ok(VerifiedClaims::new(claims))
}

/// Build an RS256 decoding key from a discovered signing key.
fn decoding_key(key: &SigningKey) -> Result<DecodingKey, AuthError> {
    if key.kty != "RSA" {
        tracing::warn!(target: "guard.auth.jwt", kid = %key.kid, kty = %key.kty, "Unexpected signing key type");
        return Err(AuthError::TokenUnparsable);
    }
    if let Some(alg) = &key.alg {
        if alg != "RS256" {
            tracing::warn!(target: "guard.auth.jwt", kid = %key.kid, alg = %alg, "Unexpected signing key algorithm");
            return Err(AuthError::TokenUnparsable);
        }
    }

    let (Some(n), Some(e)) = (key.n.as_deref(), key.e.as_deref()) else {
        tracing::warn!(target: "guard.auth.jwt", kid = %key.kid, "Signing key missing modulus or exponent");
        return Err(AuthError::TokenUnparsable);
    };

    DecodingKey::from_rsa_components(n, e).map_err(|e| {
        tracing::warn!(target: "guard.auth.jwt", kid = %key.kid, error = %e, "Invalid signing key encoding");
        AuthError::TokenUnparsable
    })
}

fn map_verification_error(kind: &ErrorKind) -> AuthError {
    match kind {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        ErrorKind::InvalidAudience
        | ErrorKind::InvalidIssuer
        | ErrorKind::InvalidSubject
        | ErrorKind::ImmatureSignature
        | ErrorKind::MissingRequiredClaim(_) => AuthError::ClaimsInvalid,
        _ => AuthError::TokenUnparsable,
    }
}
