//! In-memory model storage, scoped per repository.
//!
//! Scope `None` is the public repository; `Some(id)` is a private one.
//! Models within a scope are kept ordered by id so search pages are stable.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use modelrepo_core::{
    validate_model_id, ModelKind, ModelSummary, SearchRequest, SearchResults, SharedAccessKey,
    UpsertRequest,
};
use serde_json::Value;
use uuid::Uuid;

use crate::error::AppError;

const TOKEN_PREFIX: &str = "offset:";

/// A model document as held by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredModel {
    pub model_id: String,
    pub kind: ModelKind,
    pub resource_id: String,
    pub content: String,
    pub etag: String,
    pub published: bool,
    pub tags: Vec<String>,
    pub created_on: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl StoredModel {
    /// Search hit for this model.
    pub fn summary(&self) -> ModelSummary {
        let document: Value = serde_json::from_str(&self.content).unwrap_or(Value::Null);
        ModelSummary {
            model_id: self.model_id.clone(),
            resource_id: Some(self.resource_id.clone()),
            display_name: localized(&document, "displayName"),
            description: localized(&document, "description"),
            published: self.published,
            created_on: Some(self.created_on),
            last_updated: Some(self.last_updated),
        }
    }
}

/// DTDL strings may be plain or a language map such as `{"en": "..."}`.
fn localized(document: &Value, field: &str) -> Option<String> {
    match document.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .get("en")
            .or_else(|| map.values().next())
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

/// Result of a create-or-update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created(StoredModel),
    Updated(StoredModel),
}

impl UpsertOutcome {
    pub fn model(&self) -> &StoredModel {
        match self {
            UpsertOutcome::Created(model) | UpsertOutcome::Updated(model) => model,
        }
    }
}

/// All repositories served by one process.
#[derive(Debug, Default)]
pub struct ModelStore {
    scopes: HashMap<Option<String>, BTreeMap<String, StoredModel>>,
}

impl ModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, scope: Option<&str>, model_id: &str) -> Option<&StoredModel> {
        self.scopes
            .get(&scope.map(str::to_string))
            .and_then(|models| models.get(model_id))
    }

    /// Creates or updates a model from its JSON contents.
    ///
    /// Published models are immutable. When `etag` is given it must match
    /// the stored etag.
    pub fn upsert(
        &mut self,
        scope: Option<&str>,
        request: UpsertRequest,
    ) -> Result<UpsertOutcome, AppError> {
        let document: Value = serde_json::from_str(&request.contents)
            .map_err(|e| AppError::BadRequest(format!("contents is not JSON: {}", e)))?;
        let model_id = document
            .get("@id")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::BadRequest("contents has no string '@id'".to_string()))?;
        validate_model_id(model_id).map_err(|e| AppError::BadRequest(e.to_string()))?;
        let kind = ModelKind::from_document(&document).ok_or_else(|| {
            AppError::BadRequest("'@type' must be Interface or CapabilityModel".to_string())
        })?;

        let now = Utc::now();
        let models = self.scopes.entry(scope.map(str::to_string)).or_default();

        if let Some(existing) = models.get_mut(model_id) {
            if existing.published {
                return Err(AppError::Conflict(format!(
                    "model '{}' is published and cannot be updated",
                    model_id
                )));
            }
            if let Some(ref etag) = request.etag {
                if *etag != existing.etag {
                    return Err(AppError::PreconditionFailed(format!(
                        "etag '{}' does not match current etag for '{}'",
                        etag, model_id
                    )));
                }
            }
            if existing.kind != kind {
                return Err(AppError::Conflict(format!(
                    "model '{}' is a {} and cannot become a {}",
                    model_id, existing.kind, kind
                )));
            }

            existing.content = request.contents;
            existing.etag = new_etag();
            existing.tags = request.tags;
            existing.last_updated = now;
            return Ok(UpsertOutcome::Updated(existing.clone()));
        }

        let model = StoredModel {
            model_id: model_id.to_string(),
            kind,
            resource_id: Uuid::new_v4().to_string(),
            content: request.contents,
            etag: new_etag(),
            published: false,
            tags: request.tags,
            created_on: now,
            last_updated: now,
        };
        models.insert(model.model_id.clone(), model.clone());
        Ok(UpsertOutcome::Created(model))
    }

    /// Marks a model published (or not).
    pub fn set_published(
        &mut self,
        scope: Option<&str>,
        model_id: &str,
        published: bool,
    ) -> Result<(), AppError> {
        let model = self
            .scopes
            .get_mut(&scope.map(str::to_string))
            .and_then(|models| models.get_mut(model_id))
            .ok_or_else(|| not_found(model_id))?;
        model.published = published;
        Ok(())
    }

    /// Stores a document directly, bypassing authentication. Used for seeding.
    pub fn insert_document(
        &mut self,
        scope: Option<&str>,
        contents: &str,
        published: bool,
    ) -> Result<StoredModel, AppError> {
        let outcome = self.upsert(
            scope,
            UpsertRequest {
                etag: None,
                contents: contents.to_string(),
                tags: Vec::new(),
            },
        )?;
        let model_id = outcome.model().model_id.clone();
        if published {
            self.set_published(scope, &model_id, true)?;
        }
        self.get(scope, &model_id)
            .cloned()
            .ok_or_else(|| not_found(&model_id))
    }

    pub fn delete(&mut self, scope: Option<&str>, model_id: &str) -> Result<StoredModel, AppError> {
        let models = self
            .scopes
            .get_mut(&scope.map(str::to_string))
            .ok_or_else(|| not_found(model_id))?;

        match models.get(model_id) {
            None => return Err(not_found(model_id)),
            Some(model) if model.published => {
                return Err(AppError::Conflict(format!(
                    "model '{}' is published and cannot be deleted",
                    model_id
                )));
            }
            Some(_) => {}
        }

        models.remove(model_id).ok_or_else(|| not_found(model_id))
    }

    /// One page of models of the requested kind whose id, display name or
    /// description contains the search string (case-insensitive).
    pub fn search(
        &self,
        scope: Option<&str>,
        request: &SearchRequest,
    ) -> Result<SearchResults, AppError> {
        if request.page_size == 0 {
            return Err(AppError::BadRequest(
                "pageSize must be greater than zero".to_string(),
            ));
        }
        let offset = match request.continuation_token {
            Some(ref token) => decode_continuation_token(token)?,
            None => 0,
        };

        let needle = request.search_string.to_lowercase();
        let matches: Vec<&StoredModel> = self
            .scopes
            .get(&scope.map(str::to_string))
            .map(|models| {
                models
                    .values()
                    .filter(|m| m.kind == request.pnp_model_type)
                    .filter(|m| needle.is_empty() || summary_matches(m, &needle))
                    .collect()
            })
            .unwrap_or_default();

        let results: Vec<ModelSummary> = matches
            .iter()
            .skip(offset)
            .take(request.page_size as usize)
            .map(|m| m.summary())
            .collect();

        let next = offset + results.len();
        let continuation_token = if next < matches.len() {
            Some(encode_continuation_token(next))
        } else {
            None
        };

        Ok(SearchResults {
            continuation_token,
            results,
        })
    }

    /// Returns the model content with `implements[].schema` interface ids
    /// replaced by the interface documents, looked up in `scope` first and
    /// then in the public repository. Interfaces are returned unchanged.
    pub fn expand(&self, scope: Option<&str>, model: &StoredModel) -> Result<String, AppError> {
        if model.kind != ModelKind::CapabilityModel {
            return Ok(model.content.clone());
        }

        let mut document: Value = serde_json::from_str(&model.content)
            .map_err(|e| AppError::Internal(format!("stored model is not JSON: {}", e)))?;

        if let Some(Value::Array(entries)) = document.get_mut("implements") {
            for entry in entries.iter_mut() {
                let Some(schema_id) = entry.get("schema").and_then(Value::as_str) else {
                    continue;
                };
                let interface = self
                    .get(scope, schema_id)
                    .or_else(|| self.get(None, schema_id))
                    .filter(|m| m.kind == ModelKind::Interface);

                if let Some(interface) = interface {
                    let inlined: Value = serde_json::from_str(&interface.content).map_err(|e| {
                        AppError::Internal(format!("stored interface is not JSON: {}", e))
                    })?;
                    entry["schema"] = inlined;
                }
            }
        }

        serde_json::to_string(&document)
            .map_err(|e| AppError::Internal(format!("failed to serialize model: {}", e)))
    }

    /// Number of models in a scope.
    pub fn len(&self, scope: Option<&str>) -> usize {
        self.scopes
            .get(&scope.map(str::to_string))
            .map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self, scope: Option<&str>) -> bool {
        self.len(scope) == 0
    }
}

fn summary_matches(model: &StoredModel, needle: &str) -> bool {
    let summary = model.summary();
    let found = [
        Some(summary.model_id.as_str()),
        summary.display_name.as_deref(),
        summary.description.as_deref(),
    ]
    .into_iter()
    .flatten()
    .any(|field| field.to_lowercase().contains(needle));
    found
}

fn new_etag() -> String {
    Uuid::new_v4().simple().to_string()
}

fn not_found(model_id: &str) -> AppError {
    AppError::NotFound(format!("model '{}' not found", model_id))
}

fn encode_continuation_token(offset: usize) -> String {
    URL_SAFE_NO_PAD.encode(format!("{}{}", TOKEN_PREFIX, offset))
}

fn decode_continuation_token(token: &str) -> Result<usize, AppError> {
    let invalid = || AppError::BadRequest(format!("invalid continuation token '{}'", token));
    let bytes = URL_SAFE_NO_PAD.decode(token).map_err(|_| invalid())?;
    let text = String::from_utf8(bytes).map_err(|_| invalid())?;
    text.strip_prefix(TOKEN_PREFIX)
        .and_then(|n| n.parse().ok())
        .ok_or_else(invalid)
}

/// Shared state handed to every handler.
#[derive(Clone, Default)]
pub struct AppState {
    store: Arc<RwLock<ModelStore>>,
    keys: Arc<HashMap<String, SharedAccessKey>>,
}

impl AppState {
    /// State with an empty store and one key per private repository.
    pub fn new(keys: impl IntoIterator<Item = SharedAccessKey>) -> Self {
        let keys = keys
            .into_iter()
            .map(|key| (key.repository_id().to_string(), key))
            .collect();
        AppState {
            store: Arc::new(RwLock::new(ModelStore::new())),
            keys: Arc::new(keys),
        }
    }

    /// Key configured for a private repository.
    pub fn key(&self, repository_id: &str) -> Option<&SharedAccessKey> {
        self.keys.get(repository_id)
    }

    pub fn repository_count(&self) -> usize {
        self.keys.len()
    }

    pub fn read(&self) -> Result<RwLockReadGuard<'_, ModelStore>, AppError> {
        self.store
            .read()
            .map_err(|_| AppError::Internal("model store lock poisoned".to_string()))
    }

    pub fn write(&self) -> Result<RwLockWriteGuard<'_, ModelStore>, AppError> {
        self.store
            .write()
            .map_err(|_| AppError::Internal("model store lock poisoned".to_string()))
    }
}
