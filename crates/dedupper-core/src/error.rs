use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Cache error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Lock timeout on '{key}' after {attempts} attempts")]
    LockTimeout { key: String, attempts: u32 },

    #[error("Collaborator error: {0}")]
    Collaborator(String),

    #[error("Destination already exists: {0}")]
    DestinationOccupied(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
