//! Principal registration core.
//!
//! Turns a validated identity claim (name, email, secret) into a persisted
//! principal and a signed, expiring session token:
//! - rejects identities whose email is already registered
//! - hashes the secret with a salted, deliberately expensive one-way function
//! - derives a Gravatar-style avatar URL from the email
//! - issues an HS256 token whose expiry is part of the signed payload
//!
//! # Architecture
//!
//! ```text
//! RegistrationClaim → IdentityStore::find_by_email → SecretHasher::hash
//!                   → IdentityStore::insert → TokenIssuer::issue → SessionToken
//! ```
//!
//! The store lookup is only a fast path. Uniqueness is enforced by the
//! store's insert, which reports `StoreError::ConstraintViolation` when a
//! concurrent registration for the same email won the race.

pub mod avatar;
pub mod error;
pub mod hasher;
pub mod service;
pub mod store;
pub mod token;

pub use avatar::{AvatarOptions, AvatarResolver};
pub use error::{AvatarError, HashError, RegistrationError, StoreError, TokenError};
pub use hasher::{SecretDigest, SecretHasher, WorkFactor};
pub use service::{RegistrationClaim, RegistrationService, RegistrationStage};
pub use store::{
    EmailCollation, FileIdentityStore, IdentityStore, MemoryIdentityStore, NewPrincipal,
    PrincipalId, PrincipalRecord, Store,
};
pub use token::{Claims, SessionToken, SigningKey, TokenIssuer};
