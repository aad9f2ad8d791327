//! Error types for repository calls.

use modelrepo_core::AuthError;

/// Errors returned by [`crate::RepositoryClient`].
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Rejected before any request was sent.
    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Non-2xx response; the body is kept verbatim.
    #[error("{method} {url} returned {status}: {body}")]
    Status {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    Response(String),
}

impl RepositoryError {
    /// HTTP status for `Status` errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            RepositoryError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

pub type Result<T> = std::result::Result<T, RepositoryError>;
