//! Bearer token authentication for Microsoft identity platform tokens.
//!
//! # Components
//!
//! - `extractor` - Bearer token from the `Authorization` header
//! - `claims` - Unverified and verified claim views
//! - `keyset` - Discovered signing keys and key selection
//! - `jwks` - Signing key discovery client with per-tenant cache
//! - `jwt` - Version-specific rules and RS256 verification
//! - `scope` - Delegated scope checks
//! - `guard` - The full pipeline, producing an `AuthDecision`

pub mod claims;
pub mod extractor;
pub mod guard;
pub mod jwks;
pub mod jwt;
pub mod keyset;
pub mod scope;

pub use claims::{UnverifiedClaims, VerifiedClaims};
pub use extractor::{bearer_from_headers, extract_bearer_token};
pub use guard::{AuthDecision, AuthGuard};
pub use jwks::{DiscoveryClientError, DiscoverySettings, KeyDiscoveryClient};
pub use jwt::{verify_token, TokenVersion, ValidationRules};
pub use keyset::{KeySet, SigningKey};
pub use scope::{check_scope, validate_scope};
