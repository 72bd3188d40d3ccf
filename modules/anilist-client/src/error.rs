use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnilistError>;

#[derive(Debug, Error)]
pub enum AnilistError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited after retry")]
    RateLimited,

    #[error("Malformed response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for AnilistError {
    fn from(err: reqwest::Error) -> Self {
        AnilistError::Network(err.to_string())
    }
}
