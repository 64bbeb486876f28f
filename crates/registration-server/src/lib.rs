//! Registration Server
//!
//! HTTP front end for the registration core:
//! - `POST /api/users` validates the request, registers the principal and
//!   returns a signed session token
//! - `GET /health` reports liveness and the number of stored principals
//!
//! Configuration is read from environment variables at startup.

pub mod api;
pub mod config;
pub mod error;
pub mod validation;

pub use config::Config;
pub use error::{ApiError, ErrorResponse, FieldError};
