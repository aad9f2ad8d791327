// Model identifier validation
//
// Identifiers are `/`-delimited: <namespace segments>/<name>/<major.minor.patch>

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{AuthError, ModelIdRule};

static MODEL_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9\-._:/]{1,64}$").expect("valid model id regex"));
static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,63}$").expect("valid name regex"));
static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+\.[0-9]+\.[0-9]+$").expect("valid version regex"));

/// A validated model identifier split into its parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelUri {
    id: String,
    namespace: String,
    name: String,
    version: String,
}

impl ModelUri {
    /// Parses and validates a `/`-delimited model identifier.
    ///
    /// The URI well-formedness check runs before the domain grammar.
    pub fn parse(raw: &str) -> Result<Self, AuthError> {
        validate_model_id(raw)?;

        let segments: Vec<&str> = raw.split('/').collect();
        if segments.len() < 3 {
            return Err(AuthError::validation(
                raw,
                ModelIdRule::SegmentCount,
                format!(
                    "expected at least 3 '/'-delimited segments, found {}",
                    segments.len()
                ),
            ));
        }
        if segments.iter().any(|s| s.is_empty()) {
            return Err(AuthError::validation(
                raw,
                ModelIdRule::SegmentCount,
                "empty segment",
            ));
        }

        let version = segments[segments.len() - 1];
        if !VERSION_RE.is_match(version) {
            return Err(AuthError::validation(
                raw,
                ModelIdRule::Version,
                format!("'{}' is not a major.minor.patch version", version),
            ));
        }

        let name = segments[segments.len() - 2];
        if !NAME_RE.is_match(name) {
            return Err(AuthError::validation(
                raw,
                ModelIdRule::Name,
                format!(
                    "'{}' must start with a letter or underscore and contain only letters, digits and underscores",
                    name
                ),
            ));
        }

        Ok(Self {
            id: raw.to_string(),
            namespace: segments[..segments.len() - 2].join("/"),
            name: name.to_string(),
            version: version.to_string(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

/// Runs the URI and overall-grammar checks only.
///
/// Repository ids are often colon-delimited URNs (`urn:contoso:Thermostat:1`),
/// which pass here but not through [`ModelUri::parse`].
pub fn validate_model_id(raw: &str) -> Result<(), AuthError> {
    check_uri_reference(raw)?;
    if !MODEL_ID_RE.is_match(raw) {
        return Err(AuthError::validation(
            raw,
            ModelIdRule::Grammar,
            "must be 1 to 64 characters from [A-Za-z0-9-._:/]",
        ));
    }
    Ok(())
}

/// RFC 3986 URI-reference characters: unreserved, reserved, and `%XX` escapes.
fn check_uri_reference(raw: &str) -> Result<(), AuthError> {
    if raw.is_empty() {
        return Err(AuthError::validation(raw, ModelIdRule::Uri, "empty identifier"));
    }

    let bytes = raw.as_bytes();
    let mut chars = raw.char_indices();
    while let Some((i, c)) = chars.next() {
        if c == '%' {
            let escaped = bytes.get(i + 1..i + 3);
            if !escaped.is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit)) {
                return Err(AuthError::validation(
                    raw,
                    ModelIdRule::Uri,
                    "malformed percent escape",
                ));
            }
            chars.nth(1);
            continue;
        }
        if !(c.is_ascii_alphanumeric() || "-._~:/?#[]@!$&'()*+,;=".contains(c)) {
            return Err(AuthError::validation(
                raw,
                ModelIdRule::Uri,
                format!("character '{}' is not allowed in a URI", c),
            ));
        }
    }
    Ok(())
}

impl FromStr for ModelUri {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ModelUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}
