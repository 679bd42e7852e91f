use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LimitsError {
    #[error("limits provider unreachable: {0}")]
    ProviderUnreachable(String),
    #[error("limits fetch timed out")]
    Timeout,
    #[error("limits provider returned status {status}: {message}")]
    ProviderError { status: StatusCode, message: String },
    #[error("invalid limits document: {0}")]
    InvalidDocument(String),
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
}

impl From<reqwest::Error> for LimitsError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LimitsError::Timeout
        } else if err.is_decode() {
            LimitsError::InvalidDocument(err.to_string())
        } else {
            LimitsError::ProviderUnreachable(err.to_string())
        }
    }
}
