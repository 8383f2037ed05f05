//! Token claims: the unverified routing view and the verified result.
//!
//! [`UnverifiedClaims`] decodes the payload without checking the signature
//! and is only used to pick validation rules (`ver`) or pre-check scopes.
//! [`VerifiedClaims`] is produced by signature verification and is what
//! handlers receive. Identifying claims are redacted in Debug output.

use crate::auth::scope::check_scope;
use crate::errors::AuthError;
use common::jwt::decode_unverified_claims;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Claims that identify a person or principal; never printed in Debug output.
const REDACTED_CLAIMS: &[&str] = &[
    "sub",
    "oid",
    "upn",
    "unique_name",
    "email",
    "name",
    "preferred_username",
];

fn string_claim<'a>(claims: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    claims.get(name).and_then(Value::as_str)
}

fn debug_claims(
    name: &str,
    claims: &Map<String, Value>,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    let mut map = f.debug_map();
    for (key, value) in claims {
        if REDACTED_CLAIMS.contains(&key.as_str()) {
            map.entry(key, &"[REDACTED]");
        } else {
            map.entry(key, value);
        }
    }
    map.finish()?;
    write!(f, " ({name})")
}

/// Payload claims decoded without signature verification.
///
/// Never use these for an authorization decision.
#[derive(Clone)]
pub struct UnverifiedClaims {
    claims: Map<String, Value>,
}

impl UnverifiedClaims {
    /// Decode the payload segment of `token`.
    ///
    /// Expired tokens and tokens with bad signatures decode fine; only a
    /// malformed encoding fails.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UnparsableToken` if the token is oversized, does not
    /// have three segments, or the payload is not base64url-encoded JSON.
    pub fn read(token: &str) -> Result<Self, AuthError> {
        let claims = decode_unverified_claims(token).map_err(|e| {
            tracing::debug!(target: "guard.auth.claims", error = ?e, "Unable to decode token payload");
            AuthError::UnparsableToken
        })?;
        Ok(Self { claims })
    }

    /// The `ver` claim.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingVersionClaim` if `ver` is absent, empty or
    /// not a string.
    pub fn version(&self) -> Result<&str, AuthError> {
        string_claim(&self.claims, "ver")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                tracing::debug!(target: "guard.auth.claims", "Token has no version claim");
                AuthError::MissingVersionClaim
            })
    }

    /// The raw `scp` claim, if present as a string.
    pub fn scope(&self) -> Option<&str> {
        string_claim(&self.claims, "scp")
    }

    /// Look up any claim by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }
}

impl fmt::Debug for UnverifiedClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_claims("unverified", &self.claims, f)
    }
}

/// Claims of a token whose signature, audience, issuer and expiry were verified.
///
/// Holds the complete payload so handlers can read any claim the identity
/// provider issued.
#[derive(Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct VerifiedClaims {
    claims: Map<String, Value>,
}

impl VerifiedClaims {
    pub(crate) fn new(claims: Map<String, Value>) -> Self {
        Self { claims }
    }

    /// Look up any claim by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// The complete verified payload.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.claims
    }

    /// Consume and return the complete verified payload.
    pub fn into_map(self) -> Map<String, Value> {
        self.claims
    }

    /// Subject (`sub`).
    pub fn subject(&self) -> Option<&str> {
        string_claim(&self.claims, "sub")
    }

    /// Object id of the principal (`oid`).
    pub fn object_id(&self) -> Option<&str> {
        string_claim(&self.claims, "oid")
    }

    /// Tenant the principal belongs to (`tid`).
    pub fn tenant_id(&self) -> Option<&str> {
        string_claim(&self.claims, "tid")
    }

    /// Token format version (`ver`).
    pub fn version(&self) -> Option<&str> {
        string_claim(&self.claims, "ver")
    }

    /// Expiration timestamp (`exp`, Unix epoch seconds).
    pub fn expires_at(&self) -> Option<i64> {
        self.claims.get("exp").and_then(Value::as_i64)
    }

    /// Issued-at timestamp (`iat`, Unix epoch seconds).
    pub fn issued_at(&self) -> Option<i64> {
        self.claims.get("iat").and_then(Value::as_i64)
    }

    /// The raw `scp` claim.
    pub fn scope(&self) -> Option<&str> {
        string_claim(&self.claims, "scp")
    }

    /// Delegated scopes from `scp`, split on whitespace.
    pub fn scopes(&self) -> Vec<&str> {
        self.scope()
            .map(|s| s.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Application roles from `roles`.
    pub fn roles(&self) -> Vec<&str> {
        self.claims
            .get("roles")
            .and_then(Value::as_array)
            .map(|roles| roles.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Check if the token was granted a specific scope.
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes().iter().any(|s| *s == scope)
    }

    /// Require a delegated scope on these verified claims.
    ///
    /// # Errors
    ///
    /// `NoScopeClaim` if `scp` is absent, `ScopeMismatch` if it does not
    /// contain `required`.
    pub fn require_scope(&self, required: &str) -> Result<(), AuthError> {
        check_scope(self.scope(), required)
    }
}

impl fmt::Debug for VerifiedClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_claims("verified", &self.claims, f)
    }
}
