//! Error types for connection strings, shared access keys and model ids.

use std::fmt;

/// The model identifier rule that rejected an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelIdRule {
    /// Not a well-formed URI reference.
    Uri,
    /// Overall identifier grammar (`[A-Za-z0-9-._:/]`, 1 to 64 characters).
    Grammar,
    /// Fewer than three `/`-delimited segments, or an empty segment.
    SegmentCount,
    /// Last segment is not `major.minor.patch`.
    Version,
    /// Name segment does not start with a letter or underscore.
    Name,
}

impl fmt::Display for ModelIdRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = match self {
            ModelIdRule::Uri => "uri",
            ModelIdRule::Grammar => "grammar",
            ModelIdRule::SegmentCount => "segment count",
            ModelIdRule::Version => "version",
            ModelIdRule::Name => "name",
        };
        f.write_str(rule)
    }
}

/// Errors raised while parsing credentials, signing tokens or validating ids.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid connection string: {0}")]
    Format(String),

    #[error("Authentication configuration error: {0}")]
    Config(String),

    #[error("Invalid model id '{id}' ({rule} rule): {message}")]
    Validation {
        id: String,
        rule: ModelIdRule,
        message: String,
    },

    #[error("Invalid shared access signature: {0}")]
    Signature(String),
}

impl AuthError {
    pub(crate) fn validation(id: &str, rule: ModelIdRule, message: impl Into<String>) -> Self {
        AuthError::Validation {
            id: id.to_string(),
            rule,
            message: message.into(),
        }
    }

    /// Returns the violated rule for validation errors.
    pub fn rule(&self) -> Option<ModelIdRule> {
        match self {
            AuthError::Validation { rule, .. } => Some(*rule),
            _ => None,
        }
    }
}
