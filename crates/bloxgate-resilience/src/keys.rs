// crates/bloxgate-resilience/src/keys.rs
// ============================================================================
// Module: Cache Keys
// Description: Canonical argument fingerprints for the response cache.
// Purpose: Hash defaulted arguments order-insensitively with RFC 8785.
// Dependencies: serde_jcs, sha2
// ============================================================================

//! ## Overview
//! Cache keys must not depend on JSON member order, and absent optional
//! fields must hash identically to their defaults. The registry applies
//! defaults before calling the pipeline; this module canonicalizes the
//! resulting map with JCS and hashes it.

use serde_json::Map;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

/// Errors raised while fingerprinting arguments.
#[derive(Debug, Error)]
pub enum FingerprintError {
    /// JSON canonicalization failed.
    #[error("failed to canonicalize arguments: {0}")]
    Canonicalization(String),
}

/// Returns the lowercase-hex SHA-256 of the canonical argument encoding.
///
/// # Errors
///
/// Returns [`FingerprintError`] when the arguments cannot be canonicalized,
/// which only happens for non-finite numbers.
pub fn argument_fingerprint(arguments: &Map<String, Value>) -> Result<String, FingerprintError> {
    let bytes = serde_jcs::to_vec(arguments)
        .map_err(|err| FingerprintError::Canonicalization(err.to_string()))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    Ok(out)
}
