#![forbid(unsafe_code)]

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use souk_api::MarketError;

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// JSON error response with its status code.
#[derive(Debug, Clone)]
pub struct ApiErrorResponse {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiErrorResponse {
    pub fn new(status: StatusCode, error: &'static str, message: Option<String>) -> Self {
        Self { status, body: ErrorBody { error, message } }
    }
}

pub fn rate_limited() -> ApiErrorResponse { ApiErrorResponse::new(StatusCode::TOO_MANY_REQUESTS, "rate_limited", None) }

impl From<MarketError> for ApiErrorResponse {
    fn from(e: MarketError) -> Self {
        match e {
            MarketError::Validation(m) => Self::new(StatusCode::BAD_REQUEST, "validation", Some(m)),
            MarketError::NotFound(m) => Self::new(StatusCode::NOT_FOUND, "not_found", Some(m)),
            MarketError::Unavailable(m) => {
                tracing::warn!(error = %m, "upstream unavailable");
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "unavailable", None)
            }
            MarketError::Internal(m) => {
                tracing::error!(error = %m, "request failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", None)
            }
        }
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response { (self.status, Json(self.body)).into_response() }
}
