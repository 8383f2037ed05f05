//! Common utilities shared across Identity Guard crates.

#![warn(clippy::pedantic)]

/// Module for JWT utilities (size limits, unverified decoding, iat validation)
pub mod jwt;
