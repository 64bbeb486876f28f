//! HTTP request handlers.

use super::types::{HealthResponse, RegisterRequest, RegisterResponse};
use super::AppState;
use crate::error::ApiError;
use crate::validation::validate_registration;
use axum::{extract::State, Json};
use registration_core::{IdentityStore, RegistrationClaim};
use tracing::info;

/// Health check endpoint.
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let principals = state
        .registration
        .store()
        .count()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        principals,
    }))
}

/// Register a user and return a session token.
pub async fn register_user(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    validate_registration(&request.name, &request.email, &request.password)
        .map_err(ApiError::Validation)?;

    info!(email = %request.email, "Registration request received");

    let RegisterRequest {
        name,
        email,
        password,
    } = request;
    let token = state
        .registration
        .register(RegistrationClaim::new(name, email, password))
        .await?;

    Ok(Json(RegisterResponse {
        token: token.into_string(),
    }))
}
