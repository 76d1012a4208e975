use thiserror::Error;

#[derive(Error, Debug)]
pub enum BookrateError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid selector {selector:?}: {message}")]
    Selector { selector: String, message: String },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Rating service unavailable: {0}")]
    Channel(String),

    #[error("Handler with name \"{0}\" is already registered")]
    DuplicateHandler(String),

    #[error("No handler found for URL: {0}")]
    NoHandler(String),

    #[error("{0}")]
    Other(String),
}

impl BookrateError {
    /// Wrap a poisoned-lock message as a database error
    pub fn lock_poisoned(message: impl Into<String>) -> Self {
        BookrateError::Database(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(1),
            Some(message.into()),
        ))
    }
}

pub type Result<T> = std::result::Result<T, BookrateError>;
