use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Credentials were rejected or the auth response could not be understood
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Timeout, connection failure or an unreadable body
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request to {path} failed with status {status}")]
    Status { path: String, status: StatusCode },

    /// Missing or invalid settings
    #[error("{0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
