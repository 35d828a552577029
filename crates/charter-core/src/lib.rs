//! # charter-core — Foundational Types for Charter
//!
//! The leaf of the workspace crate graph. It owns exactly one concern: turning
//! a schema document into a stable content fingerprint, so that compiled
//! models can be tagged with (and cached by) the content they came from
//! rather than by object identity.
//!
//! ## Key Design Principles
//!
//! 1. **`CanonicalBytes` newtype.** Every fingerprint is computed over bytes
//!    produced by `CanonicalBytes::new()` (RFC 8785 / JCS with number
//!    normalization). There is no other constructor.
//!
//! 2. **`sha256_digest()` accepts only `&CanonicalBytes`.** Two documents that
//!    differ only in key order, whitespace, or in spelling an integral number
//!    as `1` vs `1.0` get the same fingerprint.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `charter-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod digest;
pub mod error;

pub use canonical::CanonicalBytes;
pub use digest::{fingerprint, sha256_digest, ContentDigest, DigestAlgorithm};
pub use error::CanonicalizationError;
