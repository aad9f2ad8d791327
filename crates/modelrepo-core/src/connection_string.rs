// Connection string parsing for the model repository
//
// Format: HostName=<host>;RepositoryId=<id>;SharedAccessKeyName=<name>;SharedAccessKey=<base64>

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::AuthError;

const HOST_NAME: &str = "HostName";
const REPOSITORY_ID: &str = "RepositoryId";
const SHARED_ACCESS_KEY_NAME: &str = "SharedAccessKeyName";
const SHARED_ACCESS_KEY: &str = "SharedAccessKey";

static HOST_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9\-.]+$").expect("valid host name regex"));
static REPOSITORY_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9\-._]+$").expect("valid repository id regex"));
static KEY_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9\-@.]+$").expect("valid key name regex"));

/// A parsed repository connection string.
///
/// `HostName` and `RepositoryId` are always present. The key fields are only
/// needed for authenticated calls.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString {
    host_name: String,
    repository_id: String,
    shared_access_key_name: Option<String>,
    shared_access_key: Option<String>,
}

impl ConnectionString {
    /// Parses a semicolon-delimited `key=value` connection string.
    ///
    /// Unknown keys are ignored. Validation of the recognized fields runs
    /// after every pair has been split.
    pub fn parse(raw: &str) -> Result<Self, AuthError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AuthError::Format("connection string is empty".to_string()));
        }

        let mut fields: HashMap<&str, &str> = HashMap::new();
        for pair in raw.split(';') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }

            let (key, value) = pair.split_once('=').ok_or_else(|| {
                AuthError::Format(format!("'{}' is not a key=value pair", pair))
            })?;
            let key = key.trim();
            let value = value.trim();

            if key.is_empty() {
                return Err(AuthError::Format(format!("empty key in '{}'", pair)));
            }
            if value.is_empty() {
                return Err(AuthError::Format(format!("empty value for '{}'", key)));
            }

            fields.insert(key, value);
        }

        let host_name = required(&fields, HOST_NAME)?;
        let repository_id = required(&fields, REPOSITORY_ID)?;
        let shared_access_key_name = fields.get(SHARED_ACCESS_KEY_NAME).map(|v| v.to_string());
        let shared_access_key = fields.get(SHARED_ACCESS_KEY).map(|v| v.to_string());

        check(HOST_NAME, &host_name, &HOST_NAME_RE)?;
        check(REPOSITORY_ID, &repository_id, &REPOSITORY_ID_RE)?;
        if let Some(ref name) = shared_access_key_name {
            check(SHARED_ACCESS_KEY_NAME, name, &KEY_NAME_RE)?;
        }

        Ok(Self {
            host_name,
            repository_id,
            shared_access_key_name,
            shared_access_key,
        })
    }

    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    pub fn repository_id(&self) -> &str {
        &self.repository_id
    }

    pub fn shared_access_key_name(&self) -> Option<&str> {
        self.shared_access_key_name.as_deref()
    }

    pub fn shared_access_key(&self) -> Option<&str> {
        self.shared_access_key.as_deref()
    }
}

fn required(fields: &HashMap<&str, &str>, key: &str) -> Result<String, AuthError> {
    fields
        .get(key)
        .map(|v| v.to_string())
        .ok_or_else(|| AuthError::Format(format!("missing required field '{}'", key)))
}

fn check(key: &str, value: &str, pattern: &Regex) -> Result<(), AuthError> {
    if pattern.is_match(value) {
        Ok(())
    } else {
        Err(AuthError::Format(format!(
            "'{}' is not a valid {} value",
            value, key
        )))
    }
}

impl FromStr for ConnectionString {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={};{}={}",
            HOST_NAME, self.host_name, REPOSITORY_ID, self.repository_id
        )?;
        if let Some(ref name) = self.shared_access_key_name {
            write!(f, ";{}={}", SHARED_ACCESS_KEY_NAME, name)?;
        }
        if let Some(ref key) = self.shared_access_key {
            write!(f, ";{}={}", SHARED_ACCESS_KEY, key)?;
        }
        Ok(())
    }
}

// The key value never appears in logs.
impl fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionString")
            .field("host_name", &self.host_name)
            .field("repository_id", &self.repository_id)
            .field("shared_access_key_name", &self.shared_access_key_name)
            .field(
                "shared_access_key",
                &self.shared_access_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = "HostName=repo.example.com;RepositoryId=repo-01;SharedAccessKeyName=owner@team.dev;SharedAccessKey=c2VjcmV0LWtleQ==";

    #[test]
    fn test_parse_full_connection_string() {
        let cs = ConnectionString::parse(FULL).unwrap();
        assert_eq!(cs.host_name(), "repo.example.com");
        assert_eq!(cs.repository_id(), "repo-01");
        assert_eq!(cs.shared_access_key_name(), Some("owner@team.dev"));
        // Padding '=' stays part of the value
        assert_eq!(cs.shared_access_key(), Some("c2VjcmV0LWtleQ=="));
    }

    #[test]
    fn test_round_trip_through_display() {
        let cs = ConnectionString::parse(FULL).unwrap();
        let reparsed = ConnectionString::parse(&cs.to_string()).unwrap();
        assert_eq!(cs, reparsed);
        assert_eq!(cs.to_string(), FULL);
    }

    #[test]
    fn test_key_fields_are_optional() {
        let cs: ConnectionString = "HostName=repo.example.com;RepositoryId=r1".parse().unwrap();
        assert_eq!(cs.shared_access_key_name(), None);
        assert_eq!(cs.shared_access_key(), None);
    }

    #[test]
    fn test_unknown_keys_and_trailing_separator_ignored() {
        let cs = ConnectionString::parse("HostName=h.io;Region=west;RepositoryId=r1;").unwrap();
        assert_eq!(cs.host_name(), "h.io");
        assert_eq!(cs.repository_id(), "r1");
    }

    #[test]
    fn test_empty_string_rejected() {
        assert!(matches!(
            ConnectionString::parse("   "),
            Err(AuthError::Format(_))
        ));
    }

    #[test]
    fn test_pair_without_equals_rejected() {
        let err = ConnectionString::parse("HostName=h.io;RepositoryId").unwrap_err();
        assert!(err.to_string().contains("not a key=value pair"));
    }

    #[test]
    fn test_empty_key_or_value_rejected() {
        let err = ConnectionString::parse("=x;HostName=h.io;RepositoryId=r1").unwrap_err();
        assert!(err.to_string().contains("empty key"));

        let err = ConnectionString::parse("HostName=;RepositoryId=r1").unwrap_err();
        assert!(err.to_string().contains("empty value"));
    }

    #[test]
    fn test_missing_mandatory_fields_rejected() {
        let err = ConnectionString::parse("RepositoryId=r1").unwrap_err();
        assert!(err.to_string().contains("HostName"));

        let err = ConnectionString::parse("HostName=h.io").unwrap_err();
        assert!(err.to_string().contains("RepositoryId"));
    }

    #[test]
    fn test_field_grammar_enforced() {
        let err = ConnectionString::parse("HostName=h_io!;RepositoryId=r1").unwrap_err();
        assert!(err.to_string().contains("HostName"));

        let err =
            ConnectionString::parse("HostName=h.io;RepositoryId=r1;SharedAccessKeyName=a b")
                .unwrap_err();
        assert!(err.to_string().contains("SharedAccessKeyName"));
    }

    #[test]
    fn test_debug_redacts_key() {
        let cs = ConnectionString::parse(FULL).unwrap();
        let debug = format!("{:?}", cs);
        assert!(!debug.contains("c2VjcmV0LWtleQ=="));
        assert!(debug.contains("<redacted>"));
    }
}
