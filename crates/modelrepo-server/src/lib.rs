//! Model repository development server.
//!
//! Serves the model repository REST API from memory: SAS-authenticated
//! private repositories, a read-only public repository, etag and published
//! checks on writes, and paginated search.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod store;

pub use config::ServerConfig;
pub use error::AppError;
pub use routes::create_router;
pub use store::{AppState, ModelStore};
