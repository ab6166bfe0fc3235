use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum ApiErrorKind {
    RateLimit,
    ServerError,
    Timeout,
    AuthError,
    InvalidRequest,
    NotFound,
    Unknown,
}

impl ApiErrorKind {
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        match status.as_u16() {
            429 => Self::RateLimit,
            401 | 403 => Self::AuthError,
            404 => Self::NotFound,
            400 | 422 => Self::InvalidRequest,
            408 | 504 => Self::Timeout,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimit | Self::ServerError | Self::Timeout)
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// Rejected before dispatch; nothing was sent.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("backend returned {status}: {body}")]
    Http {
        status: reqwest::StatusCode,
        kind: ApiErrorKind,
        body: String,
    },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn kind(&self) -> ApiErrorKind {
        match self {
            ApiError::InvalidPayload(_) => ApiErrorKind::InvalidRequest,
            ApiError::Http { kind, .. } => kind.clone(),
            ApiError::Transport(e) if e.is_timeout() => ApiErrorKind::Timeout,
            ApiError::Transport(_) | ApiError::Decode(_) => ApiErrorKind::Unknown,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn status_classification() {
        assert_eq!(
            ApiErrorKind::from_status(StatusCode::TOO_MANY_REQUESTS),
            ApiErrorKind::RateLimit
        );
        assert_eq!(
            ApiErrorKind::from_status(StatusCode::UNAUTHORIZED),
            ApiErrorKind::AuthError
        );
        assert_eq!(
            ApiErrorKind::from_status(StatusCode::UNPROCESSABLE_ENTITY),
            ApiErrorKind::InvalidRequest
        );
        assert_eq!(
            ApiErrorKind::from_status(StatusCode::BAD_GATEWAY),
            ApiErrorKind::ServerError
        );
        assert_eq!(
            ApiErrorKind::from_status(StatusCode::IM_A_TEAPOT),
            ApiErrorKind::Unknown
        );
    }

    #[test]
    fn retryable_kinds() {
        assert!(ApiErrorKind::RateLimit.is_retryable());
        assert!(ApiErrorKind::ServerError.is_retryable());
        assert!(ApiErrorKind::Timeout.is_retryable());
        assert!(!ApiErrorKind::AuthError.is_retryable());
        assert!(!ApiError::InvalidPayload("x".into()).is_retryable());
    }
}
