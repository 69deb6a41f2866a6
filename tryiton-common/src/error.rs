//! Error type shared by the TryItOn crates

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data folder could not be created
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file unreadable or malformed, or required settings missing
    #[error("Configuration error: {0}")]
    Config(String),

    /// A stored `created_at` is not RFC 3339
    #[error("Bad timestamp '{value}' in database: {source}")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}
