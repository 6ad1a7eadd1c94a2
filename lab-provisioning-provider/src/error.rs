use thiserror::Error;

use crate::models::ResourceKind;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{kind} {name} not found")]
    NotFound { kind: ResourceKind, name: String },
    #[error("{kind} {name} already exists")]
    Conflict { kind: ResourceKind, name: String },
    #[error("too many requests (HTTP 429), lower max_parallelism and retry")]
    RateLimited,
    #[error("transient provider failure: {0}")]
    Transient(String),
    #[error("a {spec} spec cannot create a {kind}")]
    KindMismatch {
        kind: ResourceKind,
        spec: ResourceKind,
    },
    #[error("{kind} {name} has no access keys")]
    NoAccessKeys { kind: ResourceKind, name: String },
    #[error("failed to access provider state file {0}")]
    StateFile(#[from] std::io::Error),
    #[error("provider state file is corrupt {0}")]
    StateFormat(#[from] serde_json::Error),
}
