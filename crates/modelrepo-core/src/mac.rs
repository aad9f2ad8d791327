// HMAC-SHA256 helpers for shared access signatures

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// Computes HMAC-SHA256 of `message` under `key` and returns the standard base64 encoding.
pub fn hmac_sha256_base64(key: &[u8], message: &[u8]) -> Result<String, AuthError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| AuthError::Config(format!("Invalid HMAC key: {}", e)))?;
    mac.update(message);
    Ok(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
}

/// Checks `tag` against HMAC-SHA256 of `message` in constant time.
pub fn verify_hmac_sha256(key: &[u8], message: &[u8], tag: &[u8]) -> Result<(), AuthError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| AuthError::Config(format!("Invalid HMAC key: {}", e)))?;
    mac.update(message);
    mac.verify_slice(tag)
        .map_err(|_| AuthError::Signature("signature does not match".to_string()))
}
