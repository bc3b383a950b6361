use thiserror::Error;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("Unauthorized trigger request")]
    Unauthorized,

    #[error("Failed to load providers: {0}")]
    StorageRead(String),

    #[error("Failed to update provider {provider_id}: {reason}")]
    StorageWrite { provider_id: String, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, VerifyError>;
