//! # tessera-primitives
//!
//! Primitive types shared by the Tessera crates.
//!
//! This crate provides the fixed-size hash types used to identify scripts
//! and blocks, and the gas unit used by the execution engine.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod hash;

pub use hash::{HashError, H160, H256};

/// Identity of a script: the low 20 bytes of its keccak-256 digest
pub type ScriptHash = H160;

/// Abstract execution cost unit.
///
/// Signed so that a budget can be compared against a charge without
/// wrapping; a charge never takes the remaining amount below zero.
pub type Gas = i64;

/// Block height type
pub type BlockHeight = u32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_hash_alias() {
        let hash: ScriptHash = H160::ZERO;
        assert_eq!(hash.as_bytes().len(), 20);
    }
}
