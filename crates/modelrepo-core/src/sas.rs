// Shared access signature generation for the model repository
//
// Every call produces a token with a fresh expiry; nothing is cached.

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};

use crate::connection_string::ConnectionString;
use crate::error::AuthError;
use crate::mac::hmac_sha256_base64;

/// Scheme prefix of the `Authorization` header value.
pub const SAS_PREFIX: &str = "SharedAccessSignature";

/// Lifetime of a generated token in seconds (one day).
pub const TOKEN_VALIDITY_SECS: i64 = 86_400;

/// Key material for signing repository requests.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedAccessKey {
    audience: String,
    key_name: String,
    secret: String,
    repository_id: String,
}

impl SharedAccessKey {
    /// Creates a key, rejecting secrets that are not standard base64.
    pub fn new(
        audience: impl Into<String>,
        key_name: impl Into<String>,
        secret: impl Into<String>,
        repository_id: impl Into<String>,
    ) -> Result<Self, AuthError> {
        let key = Self {
            audience: audience.into(),
            key_name: key_name.into(),
            secret: secret.into(),
            repository_id: repository_id.into(),
        };
        key.secret_bytes()?;
        Ok(key)
    }

    /// Builds a key from a connection string that carries both key fields.
    pub fn from_connection_string(cs: &ConnectionString) -> Result<Self, AuthError> {
        let key_name = cs.shared_access_key_name().ok_or_else(|| {
            AuthError::Config("connection string has no SharedAccessKeyName".to_string())
        })?;
        let secret = cs.shared_access_key().ok_or_else(|| {
            AuthError::Config("connection string has no SharedAccessKey".to_string())
        })?;
        Self::new(cs.host_name(), key_name, secret, cs.repository_id())
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    pub fn repository_id(&self) -> &str {
        &self.repository_id
    }

    /// Expiry for a token issued at `now`: `now + TOKEN_VALIDITY_SECS`.
    pub fn expiry_from(now: DateTime<Utc>) -> i64 {
        now.timestamp() + TOKEN_VALIDITY_SECS
    }

    /// Generates a token that expires one day from now.
    pub fn generate_token(&self) -> Result<String, AuthError> {
        self.generate_token_at(Self::expiry_from(Utc::now()))
    }

    /// Generates a token with an explicit expiry (Unix seconds).
    ///
    /// Token form:
    /// `SharedAccessSignature sr=<audience>&sig=<signature>&se=<expiry>&skn=<key name>&rid=<repository id>`
    pub fn generate_token_at(&self, expiry: i64) -> Result<String, AuthError> {
        let signature = self.sign(expiry)?;
        Ok(format!(
            "{} sr={}&sig={}&se={}&skn={}&rid={}",
            SAS_PREFIX,
            urlencoding::encode(&self.audience),
            urlencoding::encode(&signature),
            expiry,
            self.key_name,
            self.repository_id
        ))
    }

    /// Base64 HMAC-SHA256 over the canonical string for `expiry`.
    pub(crate) fn sign(&self, expiry: i64) -> Result<String, AuthError> {
        let canonical = canonical_string(&self.repository_id, &self.audience, expiry);
        hmac_sha256_base64(&self.secret_bytes()?, canonical.as_bytes())
    }

    pub(crate) fn secret_bytes(&self) -> Result<Vec<u8>, AuthError> {
        BASE64_STANDARD
            .decode(&self.secret)
            .map_err(|e| AuthError::Config(format!("SharedAccessKey is not valid base64: {}", e)))
    }
}

/// String-to-sign: `lowercase(enc(repository_id) \n enc(audience) \n expiry)`.
pub fn canonical_string(repository_id: &str, audience: &str, expiry: i64) -> String {
    format!(
        "{}\n{}\n{}",
        urlencoding::encode(repository_id),
        urlencoding::encode(audience),
        expiry
    )
    .to_lowercase()
}

impl fmt::Debug for SharedAccessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedAccessKey")
            .field("audience", &self.audience)
            .field("key_name", &self.key_name)
            .field("secret", &"<redacted>")
            .field("repository_id", &self.repository_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_key() -> SharedAccessKey {
        SharedAccessKey::new("repo.example.com", "owner", "c2VjcmV0LWtleQ==", "Repo-01")
            .expect("valid key")
    }

    #[test]
    fn test_token_layout() {
        let token = test_key().generate_token_at(1_767_225_600).unwrap();
        assert!(token.starts_with("SharedAccessSignature sr=repo.example.com&sig="));
        assert!(token.ends_with("&se=1767225600&skn=owner&rid=Repo-01"));
    }

    #[test]
    fn test_same_expiry_same_token() {
        let key = test_key();
        let a = key.generate_token_at(1_767_225_600).unwrap();
        let b = key.generate_token_at(1_767_225_600).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_expiry_different_signature() {
        let key = test_key();
        assert_ne!(key.sign(1_000).unwrap(), key.sign(2_000).unwrap());
    }

    #[test]
    fn test_canonical_string_is_lowercased_and_encoded() {
        let canonical = canonical_string("Repo/01", "Repo.Example.com", 42);
        assert_eq!(canonical, "repo%2f01\nrepo.example.com\n42");
    }

    #[test]
    fn test_expiry_is_one_day_across_month_boundary() {
        let now = Utc.with_ymd_and_hms(2026, 1, 31, 23, 30, 0).unwrap();
        assert_eq!(SharedAccessKey::expiry_from(now), now.timestamp() + 86_400);
    }

    #[test]
    fn test_generate_token_expires_in_a_day() {
        let before = Utc::now().timestamp();
        let token = test_key().generate_token().unwrap();
        let se: i64 = token
            .split('&')
            .find_map(|part| part.strip_prefix("se="))
            .and_then(|v| v.parse().ok())
            .expect("se field");
        assert!(se >= before + TOKEN_VALIDITY_SECS);
        assert!(se <= Utc::now().timestamp() + TOKEN_VALIDITY_SECS);
    }

    #[test]
    fn test_invalid_base64_secret_is_config_error() {
        let result = SharedAccessKey::new("h.io", "owner", "not base64!!", "r1");
        assert!(matches!(result, Err(AuthError::Config(_))));
    }

    #[test]
    fn test_from_connection_string_requires_key_fields() {
        let cs = ConnectionString::parse("HostName=h.io;RepositoryId=r1").unwrap();
        let err = SharedAccessKey::from_connection_string(&cs).unwrap_err();
        assert!(err.to_string().contains("SharedAccessKeyName"));

        let cs = ConnectionString::parse(
            "HostName=h.io;RepositoryId=r1;SharedAccessKeyName=owner;SharedAccessKey=c2VjcmV0",
        )
        .unwrap();
        let key = SharedAccessKey::from_connection_string(&cs).unwrap();
        assert_eq!(key.audience(), "h.io");
        assert_eq!(key.repository_id(), "r1");
        assert_eq!(key.key_name(), "owner");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let debug = format!("{:?}", test_key());
        assert!(!debug.contains("c2VjcmV0LWtleQ=="));
    }
}
