//! # Guard Test Utilities
//!
//! Shared test utilities for the Identity Guard service.
//!
//! This crate provides:
//! - Fixed RSA keypairs and discovery bodies (`TestKeypair`, `jwks_json`)
//! - Token claim builders (`TestTokenBuilder`)
//! - Server test harness (`TestGuardServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use guard_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<()> {
//!     let server = TestGuardServer::spawn().await?;
//!     let claims = TestTokenBuilder::v2(TEST_TENANT_ID, TEST_CLIENT_ID).build();
//!     let token = TestKeypair::primary().sign(&claims)?;
//!
//!     let response = reqwest::Client::new()
//!         .get(format!("{}/api/v1/me", server.url()))
//!         .bearer_auth(token)
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use server_harness::*;
pub use token_builders::*;
