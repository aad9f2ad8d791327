//! Repository client operations.

use modelrepo_core::types::{
    parse_tags, HEADER_MODEL_ID, HEADER_PUBLISHED, HEADER_RESOURCE_ID, HEADER_TAGS,
};
use modelrepo_core::{
    validate_model_id, ConnectionString, ModelContext, ModelKind, SearchRequest, SearchResults,
    SharedAccessKey, UpsertRequest,
};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{RepositoryError, Result};
use crate::transport::{HttpRequest, HttpResponse, Method, Transport, UreqTransport};

/// Page size used when the caller has no preference.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

const MODELS_PATH: &str = "/Models";
const SEARCH_PATH: &str = "/Models/Search";

/// Client for one repository endpoint.
///
/// `credentials` is only used for calls that name a private repository id;
/// calls without one go to the public repository unauthenticated.
pub struct RepositoryClient {
    config: ClientConfig,
    credentials: Option<SharedAccessKey>,
    transport: Box<dyn Transport>,
}

impl RepositoryClient {
    /// Create a client that uses the blocking `ureq` transport
    pub fn new(config: ClientConfig, credentials: Option<SharedAccessKey>) -> Self {
        let transport = UreqTransport::new(&config.user_agent);
        Self::with_transport(config, credentials, transport)
    }

    /// Create a client over a custom transport
    pub fn with_transport(
        config: ClientConfig,
        credentials: Option<SharedAccessKey>,
        transport: impl Transport + 'static,
    ) -> Self {
        RepositoryClient {
            config,
            credentials,
            transport: Box::new(transport),
        }
    }

    /// Create a client for the host and key of a connection string
    pub fn from_connection_string(cs: &ConnectionString) -> Result<Self> {
        let credentials = SharedAccessKey::from_connection_string(cs)?;
        Ok(Self::new(ClientConfig::for_host(cs.host_name()), Some(credentials)))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn credentials(&self) -> Option<&SharedAccessKey> {
        self.credentials.as_ref()
    }

    /// Fetches a model by id.
    ///
    /// With `expand`, referenced schemas are inlined by the server.
    pub fn get_model(
        &self,
        kind: ModelKind,
        model_id: &str,
        repository_id: Option<&str>,
        expand: bool,
    ) -> Result<ModelContext> {
        if model_id.trim().is_empty() {
            return Err(RepositoryError::Argument("model id is empty".to_string()));
        }
        let auth = self.credentials_for(repository_id)?;

        let mut query = vec![("modelId".to_string(), model_id.to_string())];
        if expand {
            query.push(("expand".to_string(), "true".to_string()));
        }

        let response = self.send(Method::Get, MODELS_PATH, query, auth, None)?;
        debug!(%kind, model_id, "fetched model");

        Ok(context_from_response(
            kind,
            model_id,
            response.body.clone(),
            auth.map(|k| k.repository_id().to_string()),
            &response,
        ))
    }

    /// Runs one page of a search. Pass back `continuation_token` from the
    /// previous page unchanged to get the next one.
    pub fn search(
        &self,
        kind: ModelKind,
        query: &str,
        continuation_token: Option<&str>,
        repository_id: Option<&str>,
        page_size: u32,
    ) -> Result<SearchResults> {
        if page_size == 0 {
            return Err(RepositoryError::Argument(
                "page size must be greater than zero".to_string(),
            ));
        }
        let auth = self.credentials_for(repository_id)?;

        let request = SearchRequest {
            search_string: query.to_string(),
            pnp_model_type: kind,
            continuation_token: continuation_token.map(str::to_string),
            page_size,
        };
        let body = serde_json::to_value(&request)
            .map_err(|e| RepositoryError::Argument(format!("Unserializable search: {}", e)))?;

        let response = self.send(Method::Post, SEARCH_PATH, Vec::new(), auth, Some(body))?;
        let results: SearchResults = serde_json::from_str(&response.body)
            .map_err(|e| RepositoryError::Response(format!("search results: {}", e)))?;

        debug!(
            %kind,
            hits = results.results.len(),
            more = results.continuation_token.is_some(),
            "search page received"
        );
        Ok(results)
    }

    /// Creates or updates a model document.
    ///
    /// The caller must check that an existing model is not published; the
    /// server arbitrates races through `etag`.
    pub fn create_or_update(
        &self,
        kind: ModelKind,
        content: &str,
        etag: Option<&str>,
        repository_id: Option<&str>,
    ) -> Result<ModelContext> {
        self.create_or_update_with_tags(kind, content, etag, repository_id, &[])
    }

    /// [`create_or_update`](Self::create_or_update) with tags attached to the model.
    pub fn create_or_update_with_tags(
        &self,
        kind: ModelKind,
        content: &str,
        etag: Option<&str>,
        repository_id: Option<&str>,
        tags: &[String],
    ) -> Result<ModelContext> {
        let model_id = document_id(kind, content)?;
        let auth = self.credentials_for(repository_id)?;

        let request = UpsertRequest {
            etag: etag.map(str::to_string),
            contents: content.to_string(),
            tags: tags.to_vec(),
        };
        let body = serde_json::to_value(&request)
            .map_err(|e| RepositoryError::Argument(format!("Unserializable model: {}", e)))?;

        let response = self.send(Method::Put, MODELS_PATH, Vec::new(), auth, Some(body))?;
        debug!(%kind, model_id = %model_id, status = response.status, "model stored");

        let mut context = context_from_response(
            kind,
            &model_id,
            content.to_string(),
            auth.map(|k| k.repository_id().to_string()),
            &response,
        );
        if context.tags.is_empty() {
            context.tags = tags.to_vec();
        }
        Ok(context)
    }

    /// Deletes a model by id.
    pub fn delete(
        &self,
        kind: ModelKind,
        model_id: &str,
        repository_id: Option<&str>,
    ) -> Result<()> {
        validate_model_id(model_id)?;
        let auth = self.credentials_for(repository_id)?;

        let query = vec![("modelId".to_string(), model_id.to_string())];
        self.send(Method::Delete, MODELS_PATH, query, auth, None)?;
        debug!(%kind, model_id, "model deleted");
        Ok(())
    }

    /// Downloads a model, trying the private repository before the public one.
    ///
    /// Any private-repository failure (404, auth, transport) is logged and
    /// the public repository is tried unauthenticated. Public failures are
    /// returned to the caller.
    pub fn download_with_fallback(
        &self,
        kind: ModelKind,
        model_id: &str,
        repository_id: Option<&str>,
        expand: bool,
    ) -> Result<ModelContext> {
        if let Some(repository_id) = repository_id {
            match self.get_model(kind, model_id, Some(repository_id), expand) {
                Ok(context) => return Ok(context),
                Err(e) => warn!(
                    model_id,
                    repository_id,
                    error = %e,
                    "private repository lookup failed, trying public repository"
                ),
            }
        }

        self.get_model(kind, model_id, None, expand)
    }

    /// Resolves the key for a repository id. Public calls carry no key.
    fn credentials_for(&self, repository_id: Option<&str>) -> Result<Option<&SharedAccessKey>> {
        let Some(repository_id) = repository_id else {
            return Ok(None);
        };

        match self.credentials {
            Some(ref key) if key.repository_id() == repository_id => Ok(Some(key)),
            Some(ref key) => Err(RepositoryError::Argument(format!(
                "shared access key belongs to repository '{}', not '{}'",
                key.repository_id(),
                repository_id
            ))),
            None => Err(RepositoryError::Argument(format!(
                "repository '{}' requires a shared access key, but none is configured",
                repository_id
            ))),
        }
    }

    /// Builds and sends one request. With `auth`, the request is scoped to
    /// the key's repository and carries a fresh token.
    fn send(
        &self,
        method: Method,
        path: &str,
        mut query: Vec<(String, String)>,
        auth: Option<&SharedAccessKey>,
        body: Option<serde_json::Value>,
    ) -> Result<HttpResponse> {
        let authorization = match auth {
            Some(key) => {
                query.push(("repositoryId".to_string(), key.repository_id().to_string()));
                Some(key.generate_token()?)
            }
            None => None,
        };

        let request = HttpRequest {
            method,
            url: self.config.url(path),
            query,
            authorization,
            body,
        };

        debug!(
            method = method.as_str(),
            url = %request.url,
            authenticated = request.authorization.is_some(),
            "sending repository request"
        );

        let response = self.transport.send(&request)?;
        if !response.is_success() {
            return Err(RepositoryError::Status {
                method: method.as_str().to_string(),
                url: request.url,
                status: response.status,
                body: response.body,
            });
        }
        Ok(response)
    }
}

/// Extracts and validates the `@id` of a model document, checking that a
/// declared `@type` matches `kind`.
pub fn document_id(kind: ModelKind, content: &str) -> Result<String> {
    let document: serde_json::Value = serde_json::from_str(content)
        .map_err(|e| RepositoryError::Argument(format!("model content is not JSON: {}", e)))?;

    let model_id = document
        .get("@id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| RepositoryError::Argument("model content has no string '@id'".to_string()))?;
    validate_model_id(model_id)?;

    if let Some(declared) = ModelKind::from_document(&document) {
        if declared != kind {
            return Err(RepositoryError::Argument(format!(
                "document '{}' declares @type {}, expected {}",
                model_id, declared, kind
            )));
        }
    }

    Ok(model_id.to_string())
}

fn context_from_response(
    kind: ModelKind,
    requested_id: &str,
    content: String,
    repository_id: Option<String>,
    response: &HttpResponse,
) -> ModelContext {
    ModelContext {
        model_id: response
            .header(HEADER_MODEL_ID)
            .unwrap_or(requested_id)
            .to_string(),
        kind,
        resource_id: response.header(HEADER_RESOURCE_ID).map(str::to_string),
        content,
        published: response
            .header(HEADER_PUBLISHED)
            .map(|v| v.eq_ignore_ascii_case("true")),
        etag: response.header("etag").map(str::to_string),
        tags: response.header(HEADER_TAGS).map(parse_tags).unwrap_or_default(),
        repository_id,
    }
}
