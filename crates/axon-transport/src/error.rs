use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("connect timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("connection closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
