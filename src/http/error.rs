use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

use crate::CommerceError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Commerce(#[from] CommerceError),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Validation failed: {0}")]
    Invalid(#[from] ValidationErrors),

    #[error("Malformed request: {0}")]
    Malformed(#[from] JsonRejection),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Commerce(CommerceError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Commerce(CommerceError::InvalidState(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Commerce(CommerceError::Conflict(_)) => StatusCode::CONFLICT,
            ApiError::Commerce(CommerceError::Validation(_)) | ApiError::Invalid(_) | ApiError::Malformed(_) => StatusCode::BAD_REQUEST,
            ApiError::Commerce(CommerceError::Payment(_)) => StatusCode::PAYMENT_REQUIRED,
            ApiError::Commerce(CommerceError::Storage(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (CommerceError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (CommerceError::InvalidState("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (CommerceError::Conflict("x".into()), StatusCode::CONFLICT),
            (CommerceError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (CommerceError::Payment("x".into()), StatusCode::PAYMENT_REQUIRED),
            (CommerceError::Storage("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
        assert_eq!(ApiError::Unauthorized("no".into()).status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_storage_details_are_hidden() {
        let response = ApiError::from(CommerceError::Storage("password authentication failed".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
