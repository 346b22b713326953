use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Intent {0} not found")]
    IntentNotFound(i64),

    #[error("Intent {id} cannot be retried: {reason}")]
    RetryRejected { id: i64, reason: String },

    #[error("{0}")]
    Other(String),
}
