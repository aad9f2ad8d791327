//! Model document endpoints.
//!
//! Requests that carry `repositoryId` address a private repository and must
//! be signed with that repository's key. Requests without it address the
//! public repository, which is read-only.

use axum::{
    extract::{Query, State},
    http::{header::ETAG, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use modelrepo_core::types::{HEADER_MODEL_ID, HEADER_PUBLISHED, HEADER_RESOURCE_ID, HEADER_TAGS};
use modelrepo_core::{SearchRequest, SearchResults, UpsertRequest};
use serde::Deserialize;

use crate::auth::authorize;
use crate::error::AppError;
use crate::store::{AppState, StoredModel, UpsertOutcome};

/// Query string of single-model requests.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelQuery {
    pub model_id: String,
    #[serde(default)]
    pub expand: bool,
    pub repository_id: Option<String>,
}

/// Query string of requests that only select a repository.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeQuery {
    pub repository_id: Option<String>,
}

/// Creates the models router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/Models", get(get_model).put(put_model).delete(delete_model))
        .route("/Models/Search", post(search_models))
        .with_state(state)
}

/// Authorizes a private request; public requests pass through.
fn resolve_scope<'a>(
    state: &AppState,
    headers: &HeaderMap,
    repository_id: &'a Option<String>,
) -> Result<Option<&'a str>, AppError> {
    match repository_id.as_deref() {
        Some(id) => {
            authorize(state, headers, id)?;
            Ok(Some(id))
        }
        None => Ok(None),
    }
}

/// Writes need a private repository.
fn writable_scope<'a>(
    state: &AppState,
    headers: &HeaderMap,
    repository_id: &'a Option<String>,
) -> Result<&'a str, AppError> {
    resolve_scope(state, headers, repository_id)?.ok_or_else(|| {
        AppError::Unauthorized("the public repository is read-only".to_string())
    })
}

/// GET /Models?modelId=..&expand=..&repositoryId=..
///
/// Returns the raw document with its metadata in response headers.
async fn get_model(
    State(state): State<AppState>,
    Query(query): Query<ModelQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let scope = resolve_scope(&state, &headers, &query.repository_id)?;
    let store = state.read()?;

    let model = store
        .get(scope, &query.model_id)
        .ok_or_else(|| AppError::NotFound(format!("model '{}' not found", query.model_id)))?;
    let content = if query.expand {
        store.expand(scope, model)?
    } else {
        model.content.clone()
    };

    Ok((StatusCode::OK, metadata_headers(model)?, content).into_response())
}

/// PUT /Models?repositoryId=..
///
/// Creates (201) or updates (200) a model.
async fn put_model(
    State(state): State<AppState>,
    Query(query): Query<ScopeQuery>,
    headers: HeaderMap,
    Json(request): Json<UpsertRequest>,
) -> Result<Response, AppError> {
    let repository_id = writable_scope(&state, &headers, &query.repository_id)?;
    let outcome = state.write()?.upsert(Some(repository_id), request)?;

    let status = match outcome {
        UpsertOutcome::Created(_) => StatusCode::CREATED,
        UpsertOutcome::Updated(_) => StatusCode::OK,
    };
    let model = outcome.model();
    tracing::info!(
        repository_id,
        model_id = %model.model_id,
        status = status.as_u16(),
        "model stored"
    );

    Ok((status, metadata_headers(model)?, Json(model.summary())).into_response())
}

/// DELETE /Models?modelId=..&repositoryId=..
async fn delete_model(
    State(state): State<AppState>,
    Query(query): Query<ModelQuery>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let repository_id = writable_scope(&state, &headers, &query.repository_id)?;
    state.write()?.delete(Some(repository_id), &query.model_id)?;
    tracing::info!(repository_id, model_id = %query.model_id, "model deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /Models/Search?repositoryId=..
async fn search_models(
    State(state): State<AppState>,
    Query(query): Query<ScopeQuery>,
    headers: HeaderMap,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResults>, AppError> {
    let scope = resolve_scope(&state, &headers, &query.repository_id)?;
    let results = state.read()?.search(scope, &request)?;
    Ok(Json(results))
}

fn metadata_headers(model: &StoredModel) -> Result<HeaderMap, AppError> {
    let mut headers = HeaderMap::new();
    let mut set = |name: HeaderName, value: &str| -> Result<(), AppError> {
        let value = HeaderValue::from_str(value).map_err(|_| {
            AppError::Internal(format!("metadata of '{}' is not a valid header", model.model_id))
        })?;
        headers.insert(name, value);
        Ok(())
    };

    set(HeaderName::from_static(HEADER_MODEL_ID), &model.model_id)?;
    set(HeaderName::from_static(HEADER_RESOURCE_ID), &model.resource_id)?;
    set(
        HeaderName::from_static(HEADER_PUBLISHED),
        if model.published { "true" } else { "false" },
    )?;
    set(ETAG, &model.etag)?;
    if !model.tags.is_empty() {
        set(HeaderName::from_static(HEADER_TAGS), &model.tags.join(","))?;
    }

    Ok(headers)
}
