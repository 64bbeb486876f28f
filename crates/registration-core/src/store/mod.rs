//! Principal records and the identity store they live in.

mod file;
mod memory;

pub use file::FileIdentityStore;
pub use memory::MemoryIdentityStore;

use crate::error::StoreError;
use crate::hasher::SecretDigest;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Store-assigned principal identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(pub Uuid);

impl PrincipalId {
    /// Generate a new random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PrincipalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A registered principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalRecord {
    /// Assigned on insert, immutable afterwards
    pub id: PrincipalId,
    pub name: String,
    /// Natural key; compared using the store's collation
    pub email: String,
    /// Absent when avatar derivation failed at registration
    pub avatar_url: Option<String>,
    pub secret_digest: SecretDigest,
    pub created_at: DateTime<Utc>,
}

/// A principal that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPrincipal {
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub secret_digest: SecretDigest,
}

impl NewPrincipal {
    fn into_record(self, id: PrincipalId, created_at: DateTime<Utc>) -> PrincipalRecord {
        PrincipalRecord {
            id,
            name: self.name,
            email: self.email,
            avatar_url: self.avatar_url,
            secret_digest: self.secret_digest,
            created_at,
        }
    }
}

/// How a store compares emails for uniqueness.
///
/// The registration pipeline never normalizes emails itself; whether
/// `ADA@example.com` collides with `ada@example.com` is decided here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailCollation {
    #[default]
    CaseSensitive,
    CaseInsensitive,
}

impl EmailCollation {
    /// Key under which `email` is stored.
    pub fn key(self, email: &str) -> String {
        match self {
            EmailCollation::CaseSensitive => email.to_string(),
            EmailCollation::CaseInsensitive => email.to_lowercase(),
        }
    }
}

/// Keyed principal storage.
///
/// `insert` must enforce email uniqueness atomically and report a duplicate
/// as `StoreError::ConstraintViolation`; callers rely on that rather than on
/// a prior `find_by_email`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Look up a principal by email.
    async fn find_by_email(&self, email: &str) -> Result<Option<PrincipalRecord>, StoreError>;

    /// Insert a principal, returning its assigned id.
    async fn insert(&self, principal: NewPrincipal) -> Result<PrincipalId, StoreError>;

    /// Number of stored principals.
    async fn count(&self) -> Result<usize, StoreError>;
}

/// Storage backend selected at startup.
pub enum Store {
    /// In-memory only (no persistence)
    Memory(MemoryIdentityStore),
    /// JSON snapshot file
    File(FileIdentityStore),
}

impl Store {
    /// Create an in-memory store.
    pub fn memory(collation: EmailCollation) -> Self {
        Store::Memory(MemoryIdentityStore::new(collation))
    }

    /// Open a file-backed store, loading any existing snapshot.
    pub async fn file(path: PathBuf, collation: EmailCollation) -> Result<Self, StoreError> {
        Ok(Store::File(FileIdentityStore::open(path, collation).await?))
    }
}

#[async_trait]
impl IdentityStore for Store {
    async fn find_by_email(&self, email: &str) -> Result<Option<PrincipalRecord>, StoreError> {
        match self {
            Store::Memory(s) => s.find_by_email(email).await,
            Store::File(s) => s.find_by_email(email).await,
        }
    }

    async fn insert(&self, principal: NewPrincipal) -> Result<PrincipalId, StoreError> {
        match self {
            Store::Memory(s) => s.insert(principal).await,
            Store::File(s) => s.insert(principal).await,
        }
    }

    async fn count(&self) -> Result<usize, StoreError> {
        match self {
            Store::Memory(s) => s.count().await,
            Store::File(s) => s.count().await,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::hasher::testing::fast_hasher;

    pub fn new_principal(name: &str, email: &str) -> NewPrincipal {
        NewPrincipal {
            name: name.into(),
            email: email.into(),
            avatar_url: None,
            secret_digest: fast_hasher().hash_blocking("secretpw").unwrap(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::new_principal;
    use super::*;

    #[test]
    fn test_collation_keys() {
        assert_eq!(EmailCollation::CaseSensitive.key("Ada@Example.com"), "Ada@Example.com");
        assert_eq!(EmailCollation::CaseInsensitive.key("Ada@Example.com"), "ada@example.com");
    }

    #[test]
    fn test_collation_serialization() {
        let json = serde_json::to_string(&EmailCollation::CaseInsensitive).unwrap();
        assert_eq!(json, "\"case_insensitive\"");

        let parsed: EmailCollation = serde_json::from_str("\"case_sensitive\"").unwrap();
        assert_eq!(parsed, EmailCollation::CaseSensitive);
    }

    #[test]
    fn test_principal_id_serializes_as_uuid_string() {
        let id = PrincipalId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
    }

    #[test]
    fn test_record_debug_hides_digest() {
        let record = new_principal("Ada", "ada@example.com")
            .into_record(PrincipalId::new(), Utc::now());
        let debug = format!("{:?}", record);

        assert!(debug.contains("ada@example.com"));
        assert!(!debug.contains("argon2"));
    }

    #[tokio::test]
    async fn test_store_memory_variant() {
        let store = Store::memory(EmailCollation::CaseSensitive);

        let id = store
            .insert(new_principal("Ada", "ada@example.com"))
            .await
            .unwrap();

        let found = store.find_by_email("ada@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_store_file_variant() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("principals.json");

        let store = Store::file(path.clone(), EmailCollation::CaseSensitive)
            .await
            .unwrap();
        store
            .insert(new_principal("Ada", "ada@example.com"))
            .await
            .unwrap();

        assert!(path.exists());
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
