//! Current principal handler.
//!
//! Returns selected claims of the verified bearer token.

use crate::auth::VerifiedClaims;
use axum::{Extension, Json};
use serde::Serialize;
use tracing::instrument;

/// Response for `/api/v1/me`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub oid: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tid: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ver: Option<String>,

    /// Delegated scopes from `scp`.
    pub scopes: Vec<String>,

    /// Application roles from `roles`.
    pub roles: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

impl From<&VerifiedClaims> for MeResponse {
    fn from(claims: &VerifiedClaims) -> Self {
        Self {
            sub: claims.subject().map(str::to_string),
            oid: claims.object_id().map(str::to_string),
            tid: claims.tenant_id().map(str::to_string),
            ver: claims.version().map(str::to_string),
            scopes: claims.scopes().into_iter().map(str::to_string).collect(),
            roles: claims.roles().into_iter().map(str::to_string).collect(),
            exp: claims.expires_at(),
        }
    }
}

/// Handler for GET /api/v1/me
///
/// Requires the auth middleware; claims come from request extensions.
///
/// ```json
/// {
///   "sub": "AAAAAAAAAAAAAAAAAAAAAIkzqFVrSaSaFHy782bbtaQ",
///   "oid": "00000000-0000-0000-0000-000000000001",
///   "tid": "9188040d-6c67-4c5b-b112-36a304b66dad",
///   "ver": "2.0",
///   "scopes": ["User.Read"],
///   "roles": [],
///   "exp": 1234567890
/// }
/// ```
#[instrument(skip_all, name = "guard.handlers.me")]
pub async fn get_me(Extension(claims): Extension<VerifiedClaims>) -> Json<MeResponse> {
    tracing::debug!(target: "guard.handlers.me", "Returning principal claims");
    Json(MeResponse::from(&claims))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_me_response_serialization() {
        let response = MeResponse {
            sub: Some("user123".to_string()),
            oid: None,
            tid: Some("tenant".to_string()),
            ver: Some("2.0".to_string()),
            scopes: vec!["read".to_string(), "write".to_string()],
            roles: vec![],
            exp: Some(1234567890),
        };

        let json = serde_json::to_string(&response).unwrap();

        assert!(json.contains("\"sub\":\"user123\""));
        assert!(json.contains("\"scopes\":[\"read\",\"write\"]"));
        assert!(json.contains("\"roles\":[]"));
        assert!(json.contains("\"exp\":1234567890"));
        assert!(!json.contains("oid"), "oid should be omitted when None");
    }
}
