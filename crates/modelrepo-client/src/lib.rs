//! Model repository client.
//!
//! Issues authenticated requests against the model repository REST API:
//! fetch, search, create-or-update and delete for interfaces and capability
//! models, plus a private-then-public download fallback.
//!
//! Each call performs exactly one HTTP request (two for the fallback) and
//! signs it with a freshly generated shared access signature when a private
//! repository is addressed.

pub mod client;
pub mod config;
pub mod error;
pub mod transport;

pub use client::{document_id, RepositoryClient, DEFAULT_PAGE_SIZE};
pub use config::ClientConfig;
pub use error::{RepositoryError, Result};
pub use transport::{HttpRequest, HttpResponse, Method, Transport, UreqTransport};
