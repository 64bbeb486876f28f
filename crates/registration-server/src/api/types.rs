//! API request and response types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Request to register a new user.
///
/// Missing fields deserialize as empty strings so they are reported by
/// validation rather than rejected by the extractor.
#[derive(Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub password: String,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Response after successful registration.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub token: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub principals: usize,
}
