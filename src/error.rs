use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::{repository::RepositoryError, validation::FieldErrors};

/// Message returned by the role guard on gated routes.
pub const FORBIDDEN_MESSAGE: &str = "Access denied. Admin privileges required.";

/// ApiError
///
/// Every failure a handler or extractor can surface to the client. Each variant maps to
/// exactly one status code, and the three gate failures (authentication, authorization,
/// validation) stay separate variants so their response shapes are never conflated.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No credential, or a credential that does not resolve to a live user (401).
    #[error("Unauthenticated.")]
    Unauthenticated,

    /// Login attempt with an unknown email or wrong password (401).
    #[error("Invalid credentials.")]
    InvalidCredentials,

    /// Authenticated principal lacking the role a route requires (403).
    #[error("Access denied. Admin privileges required.")]
    Forbidden,

    /// One or more field errors, including contextual checks (422).
    #[error("Validation failed.")]
    Validation(FieldErrors),

    /// Resource or relation absent where one is required (404).
    #[error("{0}")]
    NotFound(&'static str),

    /// Unexpected storage or crypto failure. Details are logged, never returned (500).
    #[error("Server error.")]
    Internal,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Shorthand for a single-field validation failure.
    pub fn field(field: &str, message: &str) -> Self {
        let mut errors = FieldErrors::default();
        errors.add(field, message);
        ApiError::Validation(errors)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            ApiError::Validation(errors) => json!({
                "success": false,
                "message": self.to_string(),
                "errors": errors,
            }),
            _ => json!({
                "success": false,
                "message": self.to_string(),
            }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        tracing::error!(error = %err, "repository failure");
        ApiError::Internal
    }
}
