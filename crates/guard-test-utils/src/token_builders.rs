//! Builder for test token claims.
//!
//! Presets produce claims a guard configured for the same tenant and
//! client accepts; the modifiers break one claim at a time.

use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};

/// Builder for Microsoft identity platform style token claims
///
/// # Example
/// ```rust,ignore
/// let claims = TestTokenBuilder::v2(TENANT, CLIENT)
///     .for_user("alice")
///     .with_scope("User.Read")
///     .expires_in(3600)
///     .build();
/// let token = TestKeypair::primary().sign(&claims)?;
/// ```
#[derive(Debug, Clone)]
pub struct TestTokenBuilder {
    claims: Map<String, Value>,
}

impl TestTokenBuilder {
    /// Claims of a v1 token: `api://` audience, `sts.windows.net` issuer.
    pub fn v1(tenant_id: &str, client_id: &str) -> Self {
        Self::base(
            tenant_id,
            "1.0",
            &format!("api://{client_id}"),
            &format!("https://sts.windows.net/{tenant_id}/"),
        )
    }

    /// Claims of a v2 token: client id audience, v2.0 issuer.
    pub fn v2(tenant_id: &str, client_id: &str) -> Self {
        Self::base(
            tenant_id,
            "2.0",
            client_id,
            &format!("https://login.microsoftonline.com/{tenant_id}/v2.0"),
        )
    }

    fn base(tenant_id: &str, version: &str, audience: &str, issuer: &str) -> Self {
        let now = Utc::now();
        let mut claims = Map::new();
        claims.insert("aud".to_string(), json!(audience));
        claims.insert("iss".to_string(), json!(issuer));
        claims.insert("iat".to_string(), json!(now.timestamp()));
        claims.insert("nbf".to_string(), json!(now.timestamp()));
        claims.insert(
            "exp".to_string(),
            json!((now + Duration::seconds(3600)).timestamp()),
        );
        claims.insert("sub".to_string(), json!("test-subject"));
        claims.insert(
            "oid".to_string(),
            json!("00000000-0000-0000-0000-000000000001"),
        );
        claims.insert("tid".to_string(), json!(tenant_id));
        claims.insert("ver".to_string(), json!(version));

        Self { claims }
    }

    /// Set the subject
    pub fn for_user(self, subject: &str) -> Self {
        self.with_claim("sub", json!(subject))
    }

    /// Set the delegated scopes (space-separated)
    pub fn with_scope(self, scope: &str) -> Self {
        self.with_claim("scp", json!(scope))
    }

    /// Set application roles
    pub fn with_roles(self, roles: &[&str]) -> Self {
        self.with_claim("roles", json!(roles))
    }

    pub fn with_audience(self, audience: &str) -> Self {
        self.with_claim("aud", json!(audience))
    }

    pub fn with_issuer(self, issuer: &str) -> Self {
        self.with_claim("iss", json!(issuer))
    }

    pub fn with_version(self, version: &str) -> Self {
        self.with_claim("ver", json!(version))
    }

    /// Set expiration in seconds from now (negative for an expired token)
    pub fn expires_in(self, seconds: i64) -> Self {
        let exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self.with_claim("exp", json!(exp))
    }

    /// Set issued-at timestamp
    pub fn issued_at(self, timestamp: i64) -> Self {
        self.with_claim("iat", json!(timestamp))
    }

    /// Set not-before timestamp
    pub fn not_before(self, timestamp: i64) -> Self {
        self.with_claim("nbf", json!(timestamp))
    }

    /// Set any claim
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    /// Remove a claim
    pub fn without_claim(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        Value::Object(self.claims)
    }
}
