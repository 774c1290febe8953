use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of bytes, returning lowercase hex string.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Hash a JSON value through its canonical encoding.
///
/// Two values that differ only in object key order hash identically.
pub fn sha256_json(value: &serde_json::Value) -> serde_json::Result<String> {
    let bytes = crate::canon::canonical_json_bytes(value)?;
    Ok(sha256_hex(&bytes))
}
