//! HTTP transport seam.
//!
//! The client builds [`HttpRequest`] values and hands them to a [`Transport`].
//! [`UreqTransport`] is the blocking production implementation; tests swap in
//! their own.

use std::collections::BTreeMap;

use crate::error::{RepositoryError, Result};

/// HTTP methods used by the repository API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

/// A fully built request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    /// Query parameters, unencoded
    pub query: Vec<(String, String)>,
    /// `Authorization` header value
    pub authorization: Option<String>,
    /// JSON body
    pub body: Option<serde_json::Value>,
}

impl HttpRequest {
    /// First value of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A response of any status. Header names are lowercase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends a request and returns the response, whatever its status.
///
/// Only failures to complete the exchange (DNS, connect, I/O) are errors.
pub trait Transport: Send + Sync {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

/// Blocking transport backed by a `ureq` agent.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(user_agent: &str) -> Self {
        let agent = ureq::AgentBuilder::new().user_agent(user_agent).build();
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut call = self.agent.request(request.method.as_str(), &request.url);
        for (name, value) in &request.query {
            call = call.query(name, value);
        }
        if let Some(ref authorization) = request.authorization {
            call = call.set("Authorization", authorization);
        }

        let result = match request.body {
            Some(ref body) => call.send_json(body),
            None => call.call(),
        };

        let response = match result {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(transport)) => {
                return Err(RepositoryError::Transport(transport.to_string()));
            }
        };

        let status = response.status();
        let headers = response
            .headers_names()
            .into_iter()
            .filter_map(|name| {
                response
                    .header(&name)
                    .map(|value| (name.to_ascii_lowercase(), value.to_string()))
            })
            .collect();
        let body = response
            .into_string()
            .map_err(|e| {
                RepositoryError::Transport(format!("Failed to read response body: {}", e))
            })?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
