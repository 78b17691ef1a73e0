// patternloop-core/src/core/hashing.rs
// ============================================================================
// Module: PatternLoop Canonical Hashing
// Description: RFC 8785 JSON canonicalization and content hashing utilities.
// Purpose: Provide deterministic hashes for Run idempotency keys and
//          Artifact content hashes.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! The Run/Artifact engine (§4.1) hashes two distinct payloads through the
//! exact same routine: a Run's `inputs_json` (to compute its
//! `idempotency_key`) and an Artifact's `data_json` (to compute its
//! `content_hash`). Both hashes must be stable across processes and
//! restarts, so canonicalization follows RFC 8785 (JCS) — sorted object
//! keys, no insignificant whitespace, consistent number formatting — via
//! `serde_jcs` rather than a hand-rolled serializer.

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

/// Supported hash algorithms for content addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// SHA-256 hashing, the only algorithm the engine currently emits.
    Sha256,
}

/// Default hash algorithm used by the Run/Artifact engine.
pub const DEFAULT_HASH_ALGORITHM: HashAlgorithm = HashAlgorithm::Sha256;

/// Deterministic content hash representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashDigest {
    /// Hash algorithm identifier.
    pub algorithm: HashAlgorithm,
    /// Lowercase hex-encoded digest bytes.
    pub value: String,
}

impl HashDigest {
    /// Creates a new digest from raw bytes.
    #[must_use]
    pub fn new(algorithm: HashAlgorithm, bytes: &[u8]) -> Self {
        Self {
            algorithm,
            value: hex_encode(bytes),
        }
    }
}

/// Errors raised when computing canonical hashes.
#[derive(Debug, Error)]
pub enum HashError {
    /// JSON canonicalization failed.
    #[error("failed to canonicalize json: {0}")]
    Canonicalization(String),
}

/// Returns canonical JSON bytes for a serializable value per RFC 8785.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, HashError> {
    serde_jcs::to_vec(value).map_err(|err| HashError::Canonicalization(err.to_string()))
}

/// Hashes canonical JSON using the provided algorithm.
///
/// This is the single routine behind both a Run's `idempotency_key` and an
/// Artifact's `content_hash` — only the payload being hashed differs.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn hash_canonical_json<T: Serialize + ?Sized>(
    algorithm: HashAlgorithm,
    value: &T,
) -> Result<HashDigest, HashError> {
    let bytes = canonical_json_bytes(value)?;
    Ok(hash_bytes(algorithm, &bytes))
}

/// Convenience wrapper returning just the lowercase hex digest string,
/// matching the shape `idempotency_key` and `content_hash` are stored in.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn hash_canonical_json_hex<T: Serialize + ?Sized>(value: &T) -> Result<String, HashError> {
    hash_canonical_json(DEFAULT_HASH_ALGORITHM, value).map(|digest| digest.value)
}

/// Hashes raw bytes using the provided algorithm.
#[must_use]
pub fn hash_bytes(algorithm: HashAlgorithm, bytes: &[u8]) -> HashDigest {
    match algorithm {
        HashAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            hasher.update(bytes);
            let digest = hasher.finalize();
            HashDigest::new(HashAlgorithm::Sha256, &digest)
        }
    }
}

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, reason = "test-only assertions are permitted")]
mod tests {
    use super::{hash_canonical_json_hex, DEFAULT_HASH_ALGORITHM, hash_canonical_json};
    use serde_json::json;

    #[test]
    fn key_order_does_not_affect_the_hash() {
        let a = json!({"source": "virlo", "limit": 5});
        let b = json!({"limit": 5, "source": "virlo"});
        assert_eq!(
            hash_canonical_json_hex(&a).expect("a hashes"),
            hash_canonical_json_hex(&b).expect("b hashes"),
        );
    }

    #[test]
    fn different_inputs_hash_differently() {
        let a = json!({"source": "virlo", "limit": 5});
        let b = json!({"source": "virlo", "limit": 6});
        assert_ne!(
            hash_canonical_json_hex(&a).expect("a hashes"),
            hash_canonical_json_hex(&b).expect("b hashes"),
        );
    }

    #[test]
    fn digest_is_64_lowercase_hex_chars_for_sha256() {
        let digest =
            hash_canonical_json(DEFAULT_HASH_ALGORITHM, &json!({"k": "v"})).expect("hashes");
        assert_eq!(digest.value.len(), 64);
        assert!(digest.value.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
