//! HTTP API for the registration server.

mod handlers;
mod middleware;
mod types;

pub use handlers::*;
pub use middleware::logging_middleware;
pub use types::*;

use crate::config::Config;
use anyhow::{Context, Result};
use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use registration_core::{
    AvatarResolver, RegistrationService, SecretHasher, SigningKey, Store, TokenIssuer,
};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Registration pipeline over the configured store
    pub registration: Arc<RegistrationService<Store>>,
}

impl AppState {
    /// Create new application state.
    pub fn new(registration: RegistrationService<Store>) -> Self {
        Self {
            registration: Arc::new(registration),
        }
    }

    /// Build the store, hasher and token issuer from configuration.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let store = if config.store.persist {
            info!("Using file store at {:?}", config.store.path);
            Store::file(config.store.path.clone(), config.store.collation)
                .await
                .context("Failed to open identity store")?
        } else {
            info!("Persistence disabled, using in-memory storage");
            Store::memory(config.store.collation)
        };

        let hasher = SecretHasher::new(config.hasher.work_factor())
            .context("Invalid hasher configuration")?;

        let key = SigningKey::new(SecretString::new(
            config.token.secret.expose_secret().to_string(),
        ))
        .context("Invalid token signing key")?;

        let registration = RegistrationService::new(
            store,
            hasher,
            TokenIssuer::new(key),
            AvatarResolver::new(config.avatar.options()),
            config.token.validity,
        );

        Ok(Self::new(registration))
    }
}

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/users", post(handlers::register_user))
        .layer(axum_middleware::from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
