use thiserror::Error;

pub type Result<T> = std::result::Result<T, MangaDexError>;

#[derive(Debug, Error)]
pub enum MangaDexError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for MangaDexError {
    fn from(err: reqwest::Error) -> Self {
        MangaDexError::Network(err.to_string())
    }
}
