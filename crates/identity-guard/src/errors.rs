//! Identity Guard error types.
//!
//! Every stage of the token pipeline returns [`AuthError`]. Each variant
//! carries a fixed, non-sensitive message and maps to an HTTP status code
//! via [`AuthError::status_code`] and the `IntoResponse` impl. Upstream
//! error detail (reqwest, serde, jsonwebtoken) is logged server-side and
//! never embedded in the variant.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Authentication and authorization failures.
///
/// Maps to HTTP status codes:
/// - Header, key, token and boundary errors: 401 Unauthorized
/// - Scope and version errors: 403 Forbidden
/// - DiscoveryUnavailable: 404 Not Found
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No Authorization header on the request.
    #[error("Authentication error: Authorization header is missing")]
    MissingHeader,

    /// Authorization scheme is not `Bearer`.
    #[error("Authentication error: Authorization header must start with ' Bearer'")]
    MalformedScheme,

    /// `Bearer` with nothing after it.
    #[error("Authentication error: Token not found")]
    MissingToken,

    /// More than two space-separated parts.
    #[error("Authentication error: Authorization header must be 'Bearer <token>'")]
    MalformedHeader,

    /// Generic denial for unexpected failures inside the guard.
    #[error("Invalid_header: Unable to parse authentication")]
    InvalidHeader,

    /// Token segments could not be decoded for an unverified read.
    #[error("Authentication error: Unable to decode token claims")]
    UnparsableToken,

    /// Token has no usable `ver` claim.
    #[error("Missing version claim from token. Unable to validate")]
    MissingVersionClaim,

    /// Discovery endpoint answered with a non-success status.
    #[error("Problem with Azure AD discovery URL")]
    DiscoveryUnavailable,

    /// Discovery endpoint answered with a body that is not a key set.
    #[error("Discovery error: Unable to parse signing keys")]
    DiscoveryMalformed,

    /// Discovery endpoint could not be reached.
    #[error("Discovery error: Signing key endpoint unreachable")]
    DiscoveryUnreachable,

    /// No key in the discovered set matches the token's `kid`.
    #[error("Invalid header error: Unable to find appropriate key")]
    KeyNotFound,

    /// Signature is valid but `exp` is in the past.
    #[error("Token error: The token has expired")]
    TokenExpired,

    /// Audience, issuer or another registered claim failed validation.
    #[error("Token error: Please check the audience and issuer")]
    ClaimsInvalid,

    /// Signature, algorithm or encoding failure.
    #[error("Token error: Unable to parse authentication")]
    TokenUnparsable,

    /// Token carries no `scp` claim at all.
    #[error("IDW10201: Neither scope or roles claim was found in the bearer token")]
    NoScopeClaim,

    /// `scp` is present but does not contain the required scope.
    #[error("IDW10203: The \"scope\" or \"scp\" claim does not contain scopes {required} or was not found")]
    ScopeMismatch {
        /// Scope the endpoint requires.
        required: String,
    },
}

/// Coarse grouping of [`AuthError`] variants.
///
/// Used as a bounded metrics label and for log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Header,
    Discovery,
    Key,
    Token,
    Scope,
    Version,
}

impl ErrorCategory {
    /// Label value for metrics and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Header => "header",
            ErrorCategory::Discovery => "discovery",
            ErrorCategory::Key => "key",
            ErrorCategory::Token => "token",
            ErrorCategory::Scope => "scope",
            ErrorCategory::Version => "version",
        }
    }
}

impl AuthError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::MissingVersionClaim
            | AuthError::NoScopeClaim
            | AuthError::ScopeMismatch { .. } => 403,
            AuthError::DiscoveryUnavailable => 404,
            _ => 401,
        }
    }

    /// Which part of the pipeline produced this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            AuthError::MissingHeader
            | AuthError::MalformedScheme
            | AuthError::MissingToken
            | AuthError::MalformedHeader
            | AuthError::InvalidHeader => ErrorCategory::Header,
            AuthError::DiscoveryUnavailable
            | AuthError::DiscoveryMalformed
            | AuthError::DiscoveryUnreachable => ErrorCategory::Discovery,
            AuthError::KeyNotFound => ErrorCategory::Key,
            AuthError::UnparsableToken
            | AuthError::TokenExpired
            | AuthError::ClaimsInvalid
            | AuthError::TokenUnparsable => ErrorCategory::Token,
            AuthError::NoScopeClaim | AuthError::ScopeMismatch { .. } => ErrorCategory::Scope,
            AuthError::MissingVersionClaim => ErrorCategory::Version,
        }
    }

    /// Stable snake_case name of the variant, for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MissingHeader => "missing_header",
            AuthError::MalformedScheme => "malformed_scheme",
            AuthError::MissingToken => "missing_token",
            AuthError::MalformedHeader => "malformed_header",
            AuthError::InvalidHeader => "invalid_header",
            AuthError::UnparsableToken => "unparsable_token",
            AuthError::MissingVersionClaim => "missing_version_claim",
            AuthError::DiscoveryUnavailable => "discovery_unavailable",
            AuthError::DiscoveryMalformed => "discovery_malformed",
            AuthError::DiscoveryUnreachable => "discovery_unreachable",
            AuthError::KeyNotFound => "key_not_found",
            AuthError::TokenExpired => "token_expired",
            AuthError::ClaimsInvalid => "claims_invalid",
            AuthError::TokenUnparsable => "token_unparsable",
            AuthError::NoScopeClaim => "no_scope_claim",
            AuthError::ScopeMismatch { .. } => "scope_mismatch",
        }
    }

    /// Collapse internal failures into the generic `InvalidHeader` denial.
    ///
    /// Transport errors, malformed discovery bodies and undecodable token
    /// segments are reported to callers without detail. Every other kind
    /// keeps its own status and message.
    pub fn at_guard_boundary(self) -> Self {
        match self {
            AuthError::DiscoveryMalformed
            | AuthError::DiscoveryUnreachable
            | AuthError::UnparsableToken => AuthError::InvalidHeader,
            other => other,
        }
    }

    /// `WWW-Authenticate` challenge for this error, per RFC 6750 Section 3.
    ///
    /// A request with no credentials gets a bare `Bearer` challenge.
    pub fn www_authenticate(&self) -> Option<&'static str> {
        match self {
            AuthError::MissingHeader => Some("Bearer"),
            AuthError::NoScopeClaim | AuthError::ScopeMismatch { .. } => {
                Some("Bearer error=\"insufficient_scope\"")
            }
            AuthError::DiscoveryUnavailable => None,
            _ => Some("Bearer error=\"invalid_token\""),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::UNAUTHORIZED);

        if let AuthError::DiscoveryUnavailable = self {
            tracing::warn!(target: "guard.availability", "Signing key discovery unavailable");
        }

        let challenge = self.www_authenticate();
        let mut response = (status, self.to_string()).into_response();

        if let Some(challenge) = challenge {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(challenge));
        }

        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    async fn read_body_text(body: Body) -> String {
        let bytes = body.collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_display_header_errors() {
        assert_eq!(
            AuthError::MissingHeader.to_string(),
            "Authentication error: Authorization header is missing"
        );
        assert_eq!(
            AuthError::MalformedScheme.to_string(),
            "Authentication error: Authorization header must start with ' Bearer'"
        );
        assert_eq!(
            AuthError::MissingToken.to_string(),
            "Authentication error: Token not found"
        );
        assert_eq!(
            AuthError::MalformedHeader.to_string(),
            "Authentication error: Authorization header must be 'Bearer <token>'"
        );
    }

    #[test]
    fn test_display_token_errors() {
        assert_eq!(
            AuthError::TokenExpired.to_string(),
            "Token error: The token has expired"
        );
        assert_eq!(
            AuthError::ClaimsInvalid.to_string(),
            "Token error: Please check the audience and issuer"
        );
        assert_eq!(
            AuthError::TokenUnparsable.to_string(),
            "Token error: Unable to parse authentication"
        );
        assert_eq!(
            AuthError::KeyNotFound.to_string(),
            "Invalid header error: Unable to find appropriate key"
        );
    }

    #[test]
    fn test_display_scope_mismatch_names_required_scope() {
        let error = AuthError::ScopeMismatch {
            required: "Files.Read".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "IDW10203: The \"scope\" or \"scp\" claim does not contain scopes Files.Read or was not found"
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AuthError::MissingHeader.status_code(), 401);
        assert_eq!(AuthError::MalformedScheme.status_code(), 401);
        assert_eq!(AuthError::MissingToken.status_code(), 401);
        assert_eq!(AuthError::MalformedHeader.status_code(), 401);
        assert_eq!(AuthError::InvalidHeader.status_code(), 401);
        assert_eq!(AuthError::KeyNotFound.status_code(), 401);
        assert_eq!(AuthError::TokenExpired.status_code(), 401);
        assert_eq!(AuthError::ClaimsInvalid.status_code(), 401);
        assert_eq!(AuthError::TokenUnparsable.status_code(), 401);
        assert_eq!(AuthError::DiscoveryUnavailable.status_code(), 404);
        assert_eq!(AuthError::MissingVersionClaim.status_code(), 403);
        assert_eq!(AuthError::NoScopeClaim.status_code(), 403);
        assert_eq!(
            AuthError::ScopeMismatch {
                required: "x".to_string()
            }
            .status_code(),
            403
        );
    }

    #[test]
    fn test_categories() {
        assert_eq!(AuthError::MalformedHeader.category(), ErrorCategory::Header);
        assert_eq!(
            AuthError::DiscoveryMalformed.category(),
            ErrorCategory::Discovery
        );
        assert_eq!(AuthError::KeyNotFound.category(), ErrorCategory::Key);
        assert_eq!(AuthError::TokenExpired.category(), ErrorCategory::Token);
        assert_eq!(AuthError::NoScopeClaim.category(), ErrorCategory::Scope);
        assert_eq!(
            AuthError::MissingVersionClaim.category(),
            ErrorCategory::Version
        );
        assert_eq!(ErrorCategory::Discovery.as_str(), "discovery");
    }

    #[test]
    fn test_guard_boundary_hides_internal_failures() {
        assert_eq!(
            AuthError::DiscoveryMalformed.at_guard_boundary(),
            AuthError::InvalidHeader
        );
        assert_eq!(
            AuthError::DiscoveryUnreachable.at_guard_boundary(),
            AuthError::InvalidHeader
        );
        assert_eq!(
            AuthError::UnparsableToken.at_guard_boundary(),
            AuthError::InvalidHeader
        );
    }

    #[test]
    fn test_guard_boundary_keeps_specific_failures() {
        for error in [
            AuthError::MissingHeader,
            AuthError::MalformedScheme,
            AuthError::DiscoveryUnavailable,
            AuthError::KeyNotFound,
            AuthError::TokenExpired,
            AuthError::ClaimsInvalid,
            AuthError::MissingVersionClaim,
        ] {
            assert_eq!(error.clone().at_guard_boundary(), error);
        }
    }

    #[tokio::test]
    async fn test_into_response_missing_header() {
        let response = AuthError::MissingHeader.into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get("WWW-Authenticate").unwrap(),
            "Bearer"
        );
        assert!(response
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/plain"));

        let body = read_body_text(response.into_body()).await;
        assert_eq!(body, "Authentication error: Authorization header is missing");
    }

    #[tokio::test]
    async fn test_into_response_expired_token() {
        let response = AuthError::TokenExpired.into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let www_auth = response
            .headers()
            .get("WWW-Authenticate")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(www_auth.contains("invalid_token"));

        let body = read_body_text(response.into_body()).await;
        assert_eq!(body, "Token error: The token has expired");
    }

    #[tokio::test]
    async fn test_into_response_scope_mismatch() {
        let response = AuthError::ScopeMismatch {
            required: "write".to_string(),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let www_auth = response
            .headers()
            .get("WWW-Authenticate")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(www_auth.contains("insufficient_scope"));
    }

    #[tokio::test]
    async fn test_into_response_discovery_unavailable() {
        let response = AuthError::DiscoveryUnavailable.into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().get("WWW-Authenticate").is_none());

        let body = read_body_text(response.into_body()).await;
        assert_eq!(body, "Problem with Azure AD discovery URL");
    }
}
