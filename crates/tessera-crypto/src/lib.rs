//! # tessera-crypto
//!
//! Hash functions for Tessera.
//!
//! - Keccak-256 and SHA-256 digests
//! - Script hash derivation
//! - Interop service id derivation

#![warn(missing_docs)]
#![warn(clippy::all)]

mod hash;

pub use hash::{interop_id, keccak256, script_hash, sha256};
