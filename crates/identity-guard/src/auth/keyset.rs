//! Signing keys published by the identity provider's discovery endpoint.

use serde::Deserialize;
use std::time::{Duration, Instant};

/// JSON Web Key from the discovery endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SigningKey {
    /// Key type (always "RSA" for Microsoft identity platform keys).
    pub kty: String,

    /// Key ID - matched against the token header's `kid`.
    pub kid: String,

    /// Key use (should be "sig").
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// RSA modulus (base64url encoded).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url encoded).
    #[serde(default)]
    pub e: Option<String>,

    /// Algorithm (should be "RS256" when present).
    #[serde(default)]
    pub alg: Option<String>,

    /// X.509 certificate thumbprint.
    #[serde(default)]
    pub x5t: Option<String>,
}

/// Discovery endpoint response body.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    /// Published signing keys, in provider order.
    pub keys: Vec<SigningKey>,
}

/// Keys from one discovery fetch.
///
/// Replaced wholesale on every fetch; never edited in place.
#[derive(Debug, Clone)]
pub struct KeySet {
    keys: Vec<SigningKey>,
    fetched_at: Instant,
}

impl KeySet {
    pub fn new(keys: Vec<SigningKey>) -> Self {
        Self {
            keys,
            fetched_at: Instant::now(),
        }
    }

    /// Find the key whose `kid` equals `kid`. First match wins.
    pub fn select(&self, kid: &str) -> Option<&SigningKey> {
        self.keys.iter().find(|key| key.kid == kid)
    }

    /// Time since the set was fetched.
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    pub fn keys(&self) -> &[SigningKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl From<JwksResponse> for KeySet {
    fn from(response: JwksResponse) -> Self {
        Self::new(response.keys)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn key(kid: &str, n: &str) -> SigningKey {
        SigningKey {
            kty: "RSA".to_string(),
            kid: kid.to_string(),
            key_use: Some("sig".to_string()),
            n: Some(n.to_string()),
            e: Some("AQAB".to_string()),
            alg: None,
            x5t: None,
        }
    }

    #[test]
    fn test_signing_key_deserialization() {
        let json = r#"{
            "kty": "RSA",
            "use": "sig",
            "kid": "nOo3ZDrODXEK1jKWhXslHR_KXEg",
            "x5t": "nOo3ZDrODXEK1jKWhXslHR_KXEg",
            "n": "oaLLT9hkcSj2tGfZsjbu7Xz1Krs0qEicXPmEsJKOBQHauZ_kRM1HdEkgOJbUznUspE6xOuOSXjlzErqBxXAu4SCvcvVOCYG2v9G3-uIrLF5dstD0sYHBo1VomtKxzF90Vslrkn6rNQgUGIWgvuQTxm1uRklYFPEcTIRw0LnYknzJ06GC9ljKR617wABVrZNkBuDgQKj37qcyxoaxIGdxEcmVFZXJyrxDgdXh9owRmZn6LIJlGjZ9m59emfuwnBnsIQG7DirJwe9SXrLXnexRQWqyzCdkYaOqkpKrsjuxUj2-MHX31FqsdpJJsOAvYXGOYBKJRjhGrGdONVrZdUdTBQ",
            "e": "AQAB",
            "x5c": ["MIIDBTCCAe2gAwIBAgIQN33ROaIJ6bJBWDCxtmJEbjANBgkqhkiG9w0BAQsFADAtMSswKQYDVQQDEyJhY2NvdW50cy5hY2Nlc3Njb250cm9sLndpbmRvd3MubmV0MB4XDTIwMTIyMTIwNTAxN1oXDTI1MTIyMDIwNTAxN1owLTErMCkGA1UEAxMiYWNjb3VudHMuYWNjZXNzY29udHJvbC53aW5kb3dzLm5ldDCCASIwDQYJKoZIhvcNAQEBBQADggEPADCCAQoCggEBAKGiy0/YZHEo9rRn2bI27u18"],
            "issuer": "https://login.microsoftonline.com/{tenantid}/v2.0"
        }"#;

        let key: SigningKey = serde_json::from_str(json).unwrap();

        assert_eq!(key.kty, "RSA");
        assert_eq!(key.kid, "nOo3ZDrODXEK1jKWhXslHR_KXEg");
        assert_eq!(key.key_use.as_deref(), Some("sig"));
        assert_eq!(key.e.as_deref(), Some("AQAB"));
        assert!(key.n.is_some());
        assert_eq!(key.x5t.as_deref(), Some("nOo3ZDrODXEK1jKWhXslHR_KXEg"));
        assert!(key.alg.is_none());
    }

    #[test]
    fn test_signing_key_deserialization_minimal() {
        let json = r#"{"kty": "RSA", "kid": "k"}"#;

        let key: SigningKey = serde_json::from_str(json).unwrap();

        assert!(key.n.is_none());
        assert!(key.e.is_none());
        assert!(key.key_use.is_none());
    }

    #[test]
    fn test_signing_key_requires_kid() {
        let json = r#"{"kty": "RSA", "n": "abc", "e": "AQAB"}"#;
        assert!(serde_json::from_str::<SigningKey>(json).is_err());
    }

    #[test]
    fn test_jwks_response_requires_keys() {
        assert!(serde_json::from_str::<JwksResponse>(r#"{"other": []}"#).is_err());

        let jwks: JwksResponse =
            serde_json::from_str(r#"{"keys": [{"kty": "RSA", "kid": "a"}]}"#).unwrap();
        assert_eq!(jwks.keys.len(), 1);
    }

    #[test]
    fn test_select_finds_matching_kid() {
        let set = KeySet::new(vec![key("a", "na"), key("b", "nb")]);

        assert_eq!(set.select("b").unwrap().n.as_deref(), Some("nb"));
        assert!(set.select("c").is_none());
    }

    #[test]
    fn test_select_first_match_wins() {
        let set = KeySet::new(vec![key("dup", "first"), key("dup", "second")]);

        assert_eq!(set.select("dup").unwrap().n.as_deref(), Some("first"));
    }

    #[test]
    fn test_empty_set() {
        let set = KeySet::from(JwksResponse { keys: vec![] });

        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
        assert!(set.select("any").is_none());
    }

    #[test]
    fn test_age_starts_near_zero() {
        let set = KeySet::new(vec![key("a", "na")]);
        assert!(set.age() < Duration::from_secs(5));
    }
}
