//! The registration pipeline.

use crate::avatar::AvatarResolver;
use crate::error::{RegistrationError, StoreError};
use crate::hasher::SecretHasher;
use crate::store::{IdentityStore, NewPrincipal};
use crate::token::{SessionToken, TokenIssuer};
use secrecy::SecretString;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// An identity claim submitted for registration.
///
/// Assumed already validated for shape. The secret is held as a
/// `SecretString` and is consumed by hashing.
pub struct RegistrationClaim {
    pub name: String,
    pub email: String,
    pub secret: SecretString,
}

impl RegistrationClaim {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            secret: SecretString::new(secret.into()),
        }
    }
}

impl fmt::Debug for RegistrationClaim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationClaim")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Stages of a single `register` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStage {
    CheckingUniqueness,
    Conflict,
    Hashing,
    Persisting,
    IssuingToken,
    Done,
}

impl fmt::Display for RegistrationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RegistrationStage::CheckingUniqueness => "checking_uniqueness",
            RegistrationStage::Conflict => "conflict",
            RegistrationStage::Hashing => "hashing",
            RegistrationStage::Persisting => "persisting",
            RegistrationStage::IssuingToken => "issuing_token",
            RegistrationStage::Done => "done",
        };
        f.write_str(s)
    }
}

/// Registers principals against an identity store.
///
/// Holds only immutable collaborators, so one instance can serve any
/// number of concurrent `register` calls.
pub struct RegistrationService<S> {
    store: S,
    hasher: SecretHasher,
    issuer: TokenIssuer,
    avatars: AvatarResolver,
    validity: Duration,
}

impl<S: IdentityStore> RegistrationService<S> {
    pub fn new(
        store: S,
        hasher: SecretHasher,
        issuer: TokenIssuer,
        avatars: AvatarResolver,
        validity: Duration,
    ) -> Self {
        Self {
            store,
            hasher,
            issuer,
            avatars,
            validity,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Token validity window.
    pub fn validity(&self) -> Duration {
        self.validity
    }

    /// Register a new principal and issue its first session token.
    ///
    /// Returns `DuplicateIdentity` if the email is already registered,
    /// including when a concurrent registration wins between the lookup and
    /// the insert. Nothing is written on any failure before the insert.
    #[instrument(skip_all, fields(email = %claim.email))]
    pub async fn register(
        &self,
        claim: RegistrationClaim,
    ) -> Result<SessionToken, RegistrationError> {
        let RegistrationClaim {
            name,
            email,
            secret,
        } = claim;

        debug!(stage = %RegistrationStage::CheckingUniqueness);
        if self.store.find_by_email(&email).await?.is_some() {
            info!(stage = %RegistrationStage::Conflict, "Email already registered");
            return Err(RegistrationError::DuplicateIdentity);
        }

        debug!(stage = %RegistrationStage::Hashing);
        let secret_digest = self.hasher.hash(secret).await?;
        let avatar_url = match self.avatars.resolve(&email) {
            Ok(url) => Some(url),
            Err(e) => {
                warn!("Avatar derivation failed, registering without avatar: {}", e);
                None
            }
        };

        debug!(stage = %RegistrationStage::Persisting);
        let id = self
            .store
            .insert(NewPrincipal {
                name,
                email,
                avatar_url,
                secret_digest,
            })
            .await
            .inspect_err(|e| {
                if matches!(e, StoreError::ConstraintViolation) {
                    info!(
                        stage = %RegistrationStage::Conflict,
                        "Lost registration race for email"
                    );
                }
            })?;

        debug!(stage = %RegistrationStage::IssuingToken, principal_id = %id);
        let token = self.issuer.issue(&id, self.validity)?;

        info!(
            stage = %RegistrationStage::Done,
            principal_id = %id,
            expires_at = %token.expires_at,
            "Principal registered"
        );
        Ok(token)
    }
}
