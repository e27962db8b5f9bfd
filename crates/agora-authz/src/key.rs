//! Cache key derivation.
//!
//! A key is `sha256:{hex}` over the JCS (RFC 8785) encoding of
//! `[subject_id, action, resource]`. JCS sorts object members, so two
//! resources that differ only in field order map to the same key.
//! Request context is not an input.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::types::CheckKey;

/// Derive the cache key for a (subject, action, resource) tuple.
pub fn cache_key(subject_id: &str, action: &str, resource: &Value) -> String {
    let tuple = serde_json::json!([subject_id, action, resource]);
    sha256_prefixed(&canonical_bytes(&tuple))
}

/// Cache key of an already assembled tuple.
pub fn check_cache_key(check: &CheckKey) -> String {
    cache_key(&check.subject_id, &check.action, &check.resource)
}

/// JCS bytes of a JSON value.
///
/// `serde_json::Value` cannot hold non-finite numbers, the only input JCS
/// rejects; the plain encoding is kept as a fallback all the same.
fn canonical_bytes(value: &Value) -> Vec<u8> {
    serde_jcs::to_vec(value).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "JCS encoding failed, falling back to serde_json");
        value.to_string().into_bytes()
    })
}

fn sha256_prefixed(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}
