//! Error types for the registration pipeline.

use thiserror::Error;

/// Secret hashing failures.
///
/// Never caused by the content of the secret: any string is valid input.
#[derive(Error, Debug)]
pub enum HashError {
    /// The configured work factor is rejected by Argon2.
    #[error("Invalid work factor: {0}")]
    InvalidWorkFactor(argon2::Error),

    /// The hashing primitive failed.
    #[error("Hashing failed: {0}")]
    Hashing(argon2::password_hash::Error),

    /// The blocking hashing task panicked or was cancelled.
    #[error("Hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Token signing and verification errors.
#[derive(Error, Debug)]
pub enum TokenError {
    /// No usable signing key.
    #[error("Signing key unavailable")]
    KeyUnavailable,

    /// Validity window is zero or does not fit in a timestamp.
    #[error("Validity window out of range")]
    InvalidWindow,

    /// Header or claims could not be encoded or decoded.
    #[error("Token serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Not three base64url segments.
    #[error("Malformed token")]
    Malformed,

    /// Header names an algorithm other than HS256.
    #[error("Unsupported token header")]
    UnsupportedHeader,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token expired")]
    Expired,
}

/// Identity store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A record with the same email key already exists.
    #[error("Identity already exists")]
    ConstraintViolation,

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Backend(format!("JSON serialization error: {}", e))
    }
}

/// Avatar URL derivation errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AvatarError {
    #[error("Email is empty")]
    EmptyEmail,

    #[error("Invalid avatar base URL: {0}")]
    InvalidBaseUrl(String),
}

/// Outcome of a failed registration.
///
/// `DuplicateIdentity` is the only client-correctable variant. The others are
/// infrastructure faults whose detail must stay server-side.
#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("Identity already exists")]
    DuplicateIdentity,

    #[error("Hashing failure: {0}")]
    Hashing(#[from] HashError),

    #[error("Signing failure: {0}")]
    Signing(#[from] TokenError),

    #[error("Storage failure: {0}")]
    Storage(StoreError),
}

impl RegistrationError {
    /// Whether the caller can correct this by choosing another identity.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, RegistrationError::DuplicateIdentity)
    }
}

impl From<StoreError> for RegistrationError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ConstraintViolation => RegistrationError::DuplicateIdentity,
            other => RegistrationError::Storage(other),
        }
    }
}
