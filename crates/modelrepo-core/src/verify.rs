// Shared access signature verification
//
// Server-side counterpart of `sas`: parses an Authorization header value and
// checks it against the key configured for a repository.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;

use crate::error::AuthError;
use crate::mac::verify_hmac_sha256;
use crate::sas::{canonical_string, SharedAccessKey, SAS_PREFIX};

/// Decoded fields of a shared access signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    /// `sr`, the repository host the token was issued for
    pub audience: String,
    /// `sig`, base64 HMAC-SHA256
    pub signature: String,
    /// `se`, Unix seconds
    pub expiry: i64,
    /// `skn`
    pub key_name: String,
    /// `rid`
    pub repository_id: String,
}

impl TokenClaims {
    /// Parses `SharedAccessSignature sr=..&sig=..&se=..&skn=..&rid=..`.
    pub fn parse(header: &str) -> Result<Self, AuthError> {
        let fields = header
            .trim()
            .strip_prefix(SAS_PREFIX)
            .map(str::trim_start)
            .ok_or_else(|| {
                AuthError::Signature(format!("expected '{}' scheme", SAS_PREFIX))
            })?;

        let mut audience = None;
        let mut signature = None;
        let mut expiry = None;
        let mut key_name = None;
        let mut repository_id = None;

        for field in fields.split('&') {
            let (name, raw_value) = field.split_once('=').ok_or_else(|| {
                AuthError::Signature(format!("malformed field '{}'", field))
            })?;
            let value = urlencoding::decode(raw_value)
                .map_err(|e| AuthError::Signature(format!("field '{}': {}", name, e)))?
                .into_owned();

            match name {
                "sr" => audience = Some(value),
                "sig" => signature = Some(value),
                "se" => {
                    let parsed = value.parse::<i64>().map_err(|_| {
                        AuthError::Signature(format!("expiry '{}' is not a number", value))
                    })?;
                    expiry = Some(parsed);
                }
                "skn" => key_name = Some(value),
                "rid" => repository_id = Some(value),
                _ => {}
            }
        }

        Ok(Self {
            audience: audience.ok_or_else(|| missing("sr"))?,
            signature: signature.ok_or_else(|| missing("sig"))?,
            expiry: expiry.ok_or_else(|| missing("se"))?,
            key_name: key_name.ok_or_else(|| missing("skn"))?,
            repository_id: repository_id.ok_or_else(|| missing("rid"))?,
        })
    }
}

fn missing(field: &str) -> AuthError {
    AuthError::Signature(format!("missing field '{}'", field))
}

/// Verifies an Authorization header against `key` at time `now` (Unix seconds).
///
/// Checks, in order: key name, repository id, audience, expiry, then the
/// HMAC in constant time.
pub fn verify_token(
    header: &str,
    key: &SharedAccessKey,
    now: i64,
) -> Result<TokenClaims, AuthError> {
    let claims = TokenClaims::parse(header)?;

    if claims.key_name != key.key_name() {
        return Err(AuthError::Signature(format!(
            "unknown key name '{}'",
            claims.key_name
        )));
    }

    if claims.repository_id != key.repository_id() {
        return Err(AuthError::Signature(format!(
            "token issued for repository '{}'",
            claims.repository_id
        )));
    }

    if !claims.audience.eq_ignore_ascii_case(key.audience()) {
        return Err(AuthError::Signature(format!(
            "token issued for audience '{}'",
            claims.audience
        )));
    }

    if claims.expiry <= now {
        return Err(AuthError::Signature(format!(
            "token expired at {}",
            claims.expiry
        )));
    }

    let signature_bytes = BASE64_STANDARD
        .decode(&claims.signature)
        .map_err(|e| AuthError::Signature(format!("signature is not base64: {}", e)))?;

    let canonical = canonical_string(&claims.repository_id, &claims.audience, claims.expiry);
    verify_hmac_sha256(&key.secret_bytes()?, canonical.as_bytes(), &signature_bytes)?;

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPIRY: i64 = 1_767_225_600;

    fn test_key() -> SharedAccessKey {
        SharedAccessKey::new("repo.example.com", "owner", "c2VjcmV0LWtleQ==", "Repo-01")
            .expect("valid key")
    }

    #[test]
    fn test_verify_valid_token() {
        let key = test_key();
        let token = key.generate_token_at(EXPIRY).unwrap();

        let claims = verify_token(&token, &key, EXPIRY - 10).expect("token should verify");
        assert_eq!(claims.audience, "repo.example.com");
        assert_eq!(claims.key_name, "owner");
        assert_eq!(claims.repository_id, "Repo-01");
        assert_eq!(claims.expiry, EXPIRY);
    }

    #[test]
    fn test_verify_fails_when_expired() {
        let key = test_key();
        let token = key.generate_token_at(EXPIRY).unwrap();

        let err = verify_token(&token, &key, EXPIRY).unwrap_err();
        assert!(err.to_string().contains("expired"));
    }

    #[test]
    fn test_verify_fails_with_other_secret() {
        let key = test_key();
        let token = key.generate_token_at(EXPIRY).unwrap();
        let other =
            SharedAccessKey::new("repo.example.com", "owner", "b3RoZXI=", "Repo-01").unwrap();

        let err = verify_token(&token, &other, EXPIRY - 10).unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn test_verify_fails_on_tampered_expiry() {
        let key = test_key();
        let token = key
            .generate_token_at(EXPIRY)
            .unwrap()
            .replace(&format!("se={}", EXPIRY), &format!("se={}", EXPIRY + 3600));

        assert!(verify_token(&token, &key, EXPIRY - 10).is_err());
    }

    #[test]
    fn test_verify_fails_on_wrong_repository() {
        let key = test_key();
        let token = key.generate_token_at(EXPIRY).unwrap();
        let other =
            SharedAccessKey::new("repo.example.com", "owner", "c2VjcmV0LWtleQ==", "Repo-02")
                .unwrap();

        let err = verify_token(&token, &other, EXPIRY - 10).unwrap_err();
        assert!(err.to_string().contains("Repo-01"));
    }

    #[test]
    fn test_parse_rejects_other_scheme() {
        let err = TokenClaims::parse("Bearer abc").unwrap_err();
        assert!(err.to_string().contains("SharedAccessSignature"));
    }

    #[test]
    fn test_parse_reports_missing_field() {
        let err = TokenClaims::parse("SharedAccessSignature sr=a&sig=b&se=1&skn=c").unwrap_err();
        assert!(err.to_string().contains("rid"));
    }
}
