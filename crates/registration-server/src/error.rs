//! Error types for the registration server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use registration_core::RegistrationError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// API error types.
///
/// Only validation and duplicate errors carry detail to the client.
/// Everything else is reported as a generic server error.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("User already exists")]
    AlreadyExists,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// One client-facing error message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub msg: String,

    /// Request field the message refers to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
}

impl FieldError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            param: None,
        }
    }

    pub fn for_param(param: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            param: Some(param.into()),
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub errors: Vec<FieldError>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, errors) = match self {
            ApiError::Validation(errors) => (StatusCode::BAD_REQUEST, errors),
            ApiError::AlreadyExists => (
                StatusCode::BAD_REQUEST,
                vec![FieldError::new("User already exists")],
            ),
            ApiError::Internal(cause) => {
                error!("Request failed: {}", cause);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    vec![FieldError::new("Server error")],
                )
            }
        };

        (status, Json(ErrorResponse { errors })).into_response()
    }
}

impl From<RegistrationError> for ApiError {
    fn from(e: RegistrationError) -> Self {
        if e.is_duplicate() {
            ApiError::AlreadyExists
        } else {
            ApiError::Internal(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use registration_core::{SecretHasher, StoreError, WorkFactor};

    async fn body_json(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_duplicate_maps_to_bad_request() {
        let response = ApiError::from(RegistrationError::DuplicateIdentity).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert_eq!(
            json,
            serde_json::json!({"errors": [{"msg": "User already exists"}]})
        );
    }

    #[tokio::test]
    async fn test_internal_error_hides_cause() {
        let err = RegistrationError::Storage(StoreError::Backend("disk full at /data".into()));
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json, serde_json::json!({"errors": [{"msg": "Server error"}]}));
    }

    #[tokio::test]
    async fn test_hashing_failure_hides_cause() {
        let cause = SecretHasher::new(WorkFactor {
            memory_cost_kib: 8,
            iterations: 1,
            parallelism: 0,
        })
        .unwrap_err();
        let response = ApiError::from(RegistrationError::Hashing(cause)).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json, serde_json::json!({"errors": [{"msg": "Server error"}]}));
    }

    #[tokio::test]
    async fn test_validation_errors_carry_params() {
        let response = ApiError::Validation(vec![
            FieldError::for_param("name", "Name is required"),
            FieldError::for_param("email", "Please include a valid email"),
        ])
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert_eq!(json["errors"][0]["param"], "name");
        assert_eq!(json["errors"][1]["msg"], "Please include a valid email");
    }
}
