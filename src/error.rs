use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

/// Failure at the depth provider boundary. A tick that hits one of these
/// appends nothing to history.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("depth request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("depth request timed out after {0}ms")]
    Timeout(u64),

    #[error("depth endpoint returned HTTP {0}")]
    Status(u16),

    #[error("malformed depth payload: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Poll interval {0}ms is not one of the supported intervals")]
    InvalidInterval(u64),

    #[error("Invalid symbol: {0:?}")]
    InvalidSymbol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::InvalidInterval(_) | AppError::InvalidSymbol(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_input_errors_are_bad_requests() {
        let status = |e: AppError| e.into_response().status();
        assert_eq!(status(AppError::InvalidInterval(4_000)), StatusCode::BAD_REQUEST);
        assert_eq!(status(AppError::InvalidSymbol("BTC/USDT".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(AppError::Config("bad".into())), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn fetch_errors_render_their_cause() {
        assert_eq!(
            FetchError::Timeout(5_000).to_string(),
            "depth request timed out after 5000ms"
        );
        assert_eq!(FetchError::Status(503).to_string(), "depth endpoint returned HTTP 503");
    }
}
