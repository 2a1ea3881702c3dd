//! Error categories surfaced to HTTP callers.

use axum::http::StatusCode;
use thiserror::Error;

use crate::schema::Strategy;

/// Failure of a Document AI call.
#[derive(Debug, Error)]
pub enum DocumentAiError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl DocumentAiError {
    /// Whether another attempt could succeed without changing the request.
    pub fn is_transient(&self) -> bool {
        matches!(self, DocumentAiError::ServiceUnavailable(_))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            DocumentAiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            DocumentAiError::AuthenticationFailed(_) | DocumentAiError::ServiceUnavailable(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Categorize a non-success HTTP status returned by Google.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => DocumentAiError::AuthenticationFailed(format!("HTTP {}: {}", status, body)),
            400 | 404 | 413 | 415 => DocumentAiError::InvalidInput(format!("HTTP {}: {}", status, body)),
            _ => DocumentAiError::ServiceUnavailable(format!("HTTP {}: {}", status, body)),
        }
    }
}

/// Transport failures and unreadable responses are both on Google's side.
impl From<reqwest::Error> for DocumentAiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            DocumentAiError::ServiceUnavailable(format!("unreadable response: {}", e))
        } else {
            DocumentAiError::ServiceUnavailable(e.to_string())
        }
    }
}

/// Failure of an extraction request.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no processor configured for strategy '{0}'")]
    StrategyNotConfigured(Strategy),

    #[error(transparent)]
    DocumentAi(#[from] DocumentAiError),
}

impl ExtractError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ExtractError::StrategyNotConfigured(_) => StatusCode::BAD_REQUEST,
            ExtractError::DocumentAi(e) => e.status_code(),
        }
    }
}
