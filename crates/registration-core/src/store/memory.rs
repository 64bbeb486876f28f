//! In-memory identity store.

use super::{EmailCollation, IdentityStore, NewPrincipal, PrincipalId, PrincipalRecord};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Identity store backed by a `HashMap` keyed on the collated email.
///
/// The uniqueness check and the write happen under one write lock, so two
/// concurrent inserts for the same key cannot both succeed.
pub struct MemoryIdentityStore {
    records: RwLock<HashMap<String, PrincipalRecord>>,
    collation: EmailCollation,
}

impl MemoryIdentityStore {
    pub fn new(collation: EmailCollation) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            collation,
        }
    }

    /// Rebuild from previously stored records.
    ///
    /// Fails if two records collide under `collation`.
    pub(crate) fn from_records(
        records: Vec<PrincipalRecord>,
        collation: EmailCollation,
    ) -> Result<Self, StoreError> {
        let mut map = HashMap::with_capacity(records.len());
        for record in records {
            let key = collation.key(&record.email);
            if map.insert(key, record).is_some() {
                return Err(StoreError::Backend(
                    "stored records contain a duplicate email".into(),
                ));
            }
        }

        Ok(Self {
            records: RwLock::new(map),
            collation,
        })
    }

    /// All records, oldest first.
    pub(crate) async fn snapshot(&self) -> Vec<PrincipalRecord> {
        let records = self.records.read().await;
        let mut all: Vec<_> = records.values().cloned().collect();
        all.sort_by_key(|r| r.created_at);
        all
    }

    /// Add a record whose uniqueness the caller has already established.
    pub(crate) async fn commit(&self, record: PrincipalRecord) {
        let key = self.collation.key(&record.email);
        self.records.write().await.insert(key, record);
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<PrincipalRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records.get(&self.collation.key(email)).cloned())
    }

    async fn insert(&self, principal: NewPrincipal) -> Result<PrincipalId, StoreError> {
        let key = self.collation.key(&principal.email);
        let mut records = self.records.write().await;

        if records.contains_key(&key) {
            return Err(StoreError::ConstraintViolation);
        }

        let id = PrincipalId::new();
        records.insert(key, principal.into_record(id.clone(), Utc::now()));
        debug!("Inserted principal {}", id);

        Ok(id)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.records.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::new_principal;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = MemoryIdentityStore::new(EmailCollation::CaseSensitive);

        let id = store
            .insert(new_principal("Ada", "ada@example.com"))
            .await
            .unwrap();

        let found = store.find_by_email("ada@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.name, "Ada");
        assert!(found.avatar_url.is_none());
    }

    #[tokio::test]
    async fn test_find_missing() {
        let store = MemoryIdentityStore::new(EmailCollation::CaseSensitive);
        assert!(store.find_by_email("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let store = MemoryIdentityStore::new(EmailCollation::CaseSensitive);
        let first = store
            .insert(new_principal("Ada", "ada@example.com"))
            .await
            .unwrap();

        let result = store.insert(new_principal("Imposter", "ada@example.com")).await;
        assert!(matches!(result, Err(StoreError::ConstraintViolation)));

        let kept = store.find_by_email("ada@example.com").await.unwrap().unwrap();
        assert_eq!(kept.id, first);
        assert_eq!(kept.name, "Ada");
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_case_sensitive_collation() {
        let store = MemoryIdentityStore::new(EmailCollation::CaseSensitive);
        store.insert(new_principal("Ada", "ada@example.com")).await.unwrap();
        store.insert(new_principal("ADA", "ADA@example.com")).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
        assert!(store.find_by_email("Ada@Example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_case_insensitive_collation() {
        let store = MemoryIdentityStore::new(EmailCollation::CaseInsensitive);
        store.insert(new_principal("Ada", "ada@example.com")).await.unwrap();

        let result = store.insert(new_principal("ADA", "ADA@example.com")).await;
        assert!(matches!(result, Err(StoreError::ConstraintViolation)));

        // Submitted casing is kept on the record
        let found = store.find_by_email("Ada@Example.com").await.unwrap().unwrap();
        assert_eq!(found.email, "ada@example.com");
    }

    #[tokio::test]
    async fn test_concurrent_inserts_same_email() {
        let store = Arc::new(MemoryIdentityStore::new(EmailCollation::CaseSensitive));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .insert(new_principal(&format!("Ada {}", i), "ada@example.com"))
                        .await
                })
            })
            .collect();

        let mut successes = 0;
        let mut violations = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(StoreError::ConstraintViolation) => violations += 1,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(violations, 7);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_commit_uses_collation_key() {
        let store = MemoryIdentityStore::new(EmailCollation::CaseInsensitive);
        let record = new_principal("Ada", "Ada@Example.com")
            .into_record(PrincipalId::new(), Utc::now());

        store.commit(record.clone()).await;

        let found = store.find_by_email("ada@example.com").await.unwrap().unwrap();
        assert_eq!(found, record);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[test]
    fn test_from_records_rejects_collisions() {
        let a = new_principal("Ada", "ada@example.com")
            .into_record(PrincipalId::new(), Utc::now());
        let b = new_principal("ADA", "ADA@example.com")
            .into_record(PrincipalId::new(), Utc::now());

        assert!(MemoryIdentityStore::from_records(
            vec![a.clone(), b.clone()],
            EmailCollation::CaseSensitive
        )
        .is_ok());
        assert!(matches!(
            MemoryIdentityStore::from_records(vec![a, b], EmailCollation::CaseInsensitive),
            Err(StoreError::Backend(_))
        ));
    }
}
