//! Error types for the browser driver and the HTTP surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Message returned when `POST /extrair` carries no URL.
pub const MISSING_URL: &str = "Você precisa enviar a URL do produto AliExpress!";

/// Errors that can occur while driving the browser for one request.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("navigation failed: {0}")]
    NavigationFailed(String),

    #[error("navigation timeout of {0} ms exceeded")]
    NavigationTimeout(u64),

    #[error("JavaScript evaluation failed: {0}")]
    JsEvalFailed(String),

    #[error("invalid page data: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("browser session already closed")]
    SessionClosed,

    #[error("CDP error: {0}")]
    Cdp(String),
}

impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        BrowserError::Cdp(err.to_string())
    }
}

/// Errors surfaced by the `/extrair` handler.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request body had no usable `url`.
    #[error("request is missing the product url")]
    MissingUrl,

    #[error(transparent)]
    Extraction(#[from] BrowserError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingUrl => StatusCode::BAD_REQUEST,
            ApiError::Extraction(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// `{erro}` body for rejected input.
#[derive(Debug, Serialize)]
struct InputErrorBody<'a> {
    erro: &'a str,
}

/// `{sucesso: false, erro}` body for failed extractions.
#[derive(Debug, Serialize)]
struct FailureBody {
    sucesso: bool,
    erro: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::MissingUrl => {
                (status, Json(InputErrorBody { erro: MISSING_URL })).into_response()
            }
            ApiError::Extraction(err) => (
                status,
                Json(FailureBody {
                    sucesso: false,
                    erro: err.to_string(),
                }),
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::MissingUrl.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::from(BrowserError::NavigationTimeout(60_000)).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_timeout_message() {
        let err = BrowserError::NavigationTimeout(60_000);
        assert_eq!(err.to_string(), "navigation timeout of 60000 ms exceeded");
    }

    #[test]
    fn test_extraction_error_is_transparent() {
        let err = ApiError::from(BrowserError::LaunchFailed("no chrome".into()));
        assert_eq!(err.to_string(), "browser launch failed: no chrome");
    }
}
