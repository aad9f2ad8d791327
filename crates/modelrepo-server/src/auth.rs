//! Shared access signature checks for private repository requests.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use chrono::Utc;
use modelrepo_core::{verify_token, TokenClaims};

use crate::error::AppError;
use crate::store::AppState;

/// Checks the `Authorization` header against the key of `repository_id`.
///
/// Unknown repositories are rejected the same way as bad signatures so that
/// callers cannot probe for repository ids.
pub fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    repository_id: &str,
) -> Result<TokenClaims, AppError> {
    let key = state
        .key(repository_id)
        .ok_or_else(|| AppError::Unauthorized(format!("unknown repository '{}'", repository_id)))?;

    let header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("missing Authorization header".to_string()))?
        .to_str()
        .map_err(|_| AppError::Unauthorized("Authorization header is not ASCII".to_string()))?;

    verify_token(header, key, Utc::now().timestamp())
        .map_err(|e| AppError::Unauthorized(e.to_string()))
}
