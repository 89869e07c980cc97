//! Digest helpers

use sha2::Sha256;
use sha3::{Digest, Keccak256};
use tessera_primitives::{ScriptHash, H256};

/// Compute Keccak-256 hash of the input data
pub fn keccak256(data: &[u8]) -> H256 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    H256::from_bytes(hasher.finalize().into())
}

/// Compute SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> H256 {
    let mut hasher = Sha256::new();
    hasher.update(data);
    H256::from_bytes(hasher.finalize().into())
}

/// Derive the identity of a script: the last 20 bytes of `keccak256(code)`.
pub fn script_hash(code: &[u8]) -> ScriptHash {
    let digest = keccak256(code);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest.as_bytes()[12..]);
    ScriptHash::from_bytes(bytes)
}

/// Derive the 32-bit id of an interop service from its name.
///
/// The id is the first four bytes of `sha256(name)` read little-endian, which
/// is also how `SYSCALL` operands are encoded.
pub fn interop_id(name: &str) -> u32 {
    let digest = sha256(name.as_bytes());
    let b = digest.as_bytes();
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Known vectors ====================

    #[test]
    fn test_keccak256_empty() {
        assert_eq!(
            keccak256(&[]).to_hex(),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_keccak256_hello() {
        assert_eq!(
            keccak256(b"hello").to_hex(),
            "0x1c8aff950685c2ed4bc3174f3472287b56d9517b9c948127319a09a7a36deac8"
        );
    }

    #[test]
    fn test_sha256_empty() {
        assert_eq!(
            sha256(&[]).to_hex(),
            "0xe3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_sha256_abc() {
        assert_eq!(
            sha256(b"abc").to_hex(),
            "0xba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    // ==================== Derived identities ====================

    #[test]
    fn test_script_hash_is_keccak_suffix() {
        let hash = script_hash(&[]);
        assert_eq!(
            hash.to_hex(),
            "0xdcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_script_hash_distinguishes_code() {
        assert_ne!(script_hash(&[0x21]), script_hash(&[0x21, 0x21]));
        assert_eq!(script_hash(&[0x21]), script_hash(&[0x21]));
    }

    #[test]
    fn test_interop_id_is_sha256_prefix() {
        let digest = sha256(b"System.Runtime.Log");
        let expected = u32::from_le_bytes(digest.as_bytes()[..4].try_into().unwrap());
        assert_eq!(interop_id("System.Runtime.Log"), expected);
    }

    #[test]
    fn test_interop_id_empty_name() {
        // sha256("") starts with e3 b0 c4 42
        assert_eq!(interop_id(""), u32::from_le_bytes([0xe3, 0xb0, 0xc4, 0x42]));
        assert_eq!(hex::encode(interop_id("").to_le_bytes()), "e3b0c442");
    }
}
