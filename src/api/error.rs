use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use super::ApiResponse;
use crate::services::ScrapeServiceError;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),

    DatabaseError(String),

    ExternalApiError { service: String, message: String },

    ValidationError {
        message: String,
        example: Option<String>,
    },

    InternalError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(msg) => write!(f, "Not found: {msg}"),
            Self::DatabaseError(msg) => write!(f, "Database error: {msg}"),
            Self::ExternalApiError { service, message } => write!(f, "{service} error: {message}"),
            Self::ValidationError { message, .. } => write!(f, "Validation error: {message}"),
            Self::InternalError(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message, example) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            Self::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A database error occurred".to_string(),
                    None,
                )
            }
            Self::ExternalApiError { service, message } => {
                tracing::warn!("{} error: {}", service, message);
                (
                    StatusCode::BAD_GATEWAY,
                    format!("{service} failed: {message}"),
                    None,
                )
            }
            Self::ValidationError { message, example } => {
                (StatusCode::BAD_REQUEST, message, example)
            }
            Self::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ApiResponse::<()>::error(error_message).with_example(example);
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::DatabaseError(err.to_string())
    }
}

impl From<ScrapeServiceError> for ApiError {
    fn from(err: ScrapeServiceError) -> Self {
        match err {
            ScrapeServiceError::NotFound(msg) => Self::NotFound(msg),
            ScrapeServiceError::Validation(msg) => Self::validation(msg),
            ScrapeServiceError::Database(msg) => Self::DatabaseError(msg),
            ScrapeServiceError::Scrape(message) => Self::ExternalApiError {
                service: "Scraper".to_string(),
                message,
            },
        }
    }
}

impl ApiError {
    pub fn not_found(resource: &str, id: impl fmt::Display) -> Self {
        Self::NotFound(format!("{resource} {id} not found"))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError {
            message: msg.into(),
            example: None,
        }
    }

    /// A 400 that shows the caller a well-formed request.
    pub fn invalid_request(msg: impl Into<String>, example: impl Into<String>) -> Self {
        Self::ValidationError {
            message: msg.into(),
            example: Some(example.into()),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }
}
