// Model repository core - connection strings, SAS tokens and model identifiers

pub mod connection_string;
pub mod error;
pub mod mac;
pub mod model_uri;
pub mod sas;
pub mod types;
pub mod verify;

pub use connection_string::ConnectionString;
pub use error::{AuthError, ModelIdRule};
pub use model_uri::{validate_model_id, ModelUri};
pub use sas::{SharedAccessKey, SAS_PREFIX, TOKEN_VALIDITY_SECS};
pub use types::{
    ModelContext, ModelKind, ModelSummary, SearchRequest, SearchResults, UpsertRequest,
};
pub use verify::{verify_token, TokenClaims};
