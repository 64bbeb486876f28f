//! JSON-file persistent identity store.

use super::{
    EmailCollation, IdentityStore, MemoryIdentityStore, NewPrincipal, PrincipalId,
    PrincipalRecord,
};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument};

/// Snapshot format version.
const DATA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    records: Vec<PrincipalRecord>,
}

/// Identity store that keeps records in memory and rewrites a JSON snapshot
/// on every insert.
///
/// A record becomes visible to lookups only after the snapshot containing it
/// is on disk. A cancelled or failed insert leaves neither the file nor the
/// in-memory map changed.
pub struct FileIdentityStore {
    inner: Arc<MemoryIdentityStore>,
    path: PathBuf,
    /// Serializes inserts so snapshots are written in order
    write_lock: Arc<Mutex<()>>,
}

impl FileIdentityStore {
    /// Open the store at `path`.
    ///
    /// Starts empty if the file doesn't exist yet.
    pub async fn open(path: PathBuf, collation: EmailCollation) -> Result<Self, StoreError> {
        let inner = if fs::try_exists(&path).await? {
            let data = fs::read(&path).await?;
            let snapshot: Snapshot = serde_json::from_slice(&data)?;

            if snapshot.version != DATA_VERSION {
                return Err(StoreError::Backend(format!(
                    "unsupported snapshot version {} (expected {})",
                    snapshot.version, DATA_VERSION
                )));
            }

            info!(
                "Loaded {} principals from {:?}",
                snapshot.records.len(),
                path
            );
            MemoryIdentityStore::from_records(snapshot.records, collation)?
        } else {
            info!("Identity file not found at {:?}, starting empty", path);
            MemoryIdentityStore::new(collation)
        };

        Ok(Self {
            inner: Arc::new(inner),
            path,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `records` to the temp file next to the store path.
    async fn write_temp(&self, records: Vec<PrincipalRecord>) -> Result<PathBuf, StoreError> {
        let snapshot = Snapshot {
            version: DATA_VERSION,
            records,
        };
        let data = serde_json::to_vec_pretty(&snapshot)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, &data).await?;

        debug!(
            "Wrote {} principals ({} bytes) to {:?}",
            snapshot.records.len(),
            data.len(),
            temp_path
        );
        Ok(temp_path)
    }
}

#[async_trait]
impl IdentityStore for FileIdentityStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<PrincipalRecord>, StoreError> {
        self.inner.find_by_email(email).await
    }

    #[instrument(skip_all, fields(email = %principal.email))]
    async fn insert(&self, principal: NewPrincipal) -> Result<PrincipalId, StoreError> {
        let guard = self.write_lock.clone().lock_owned().await;

        if self.inner.find_by_email(&principal.email).await?.is_some() {
            return Err(StoreError::ConstraintViolation);
        }

        let id = PrincipalId::new();
        let record = principal.into_record(id.clone(), Utc::now());

        let mut records = self.inner.snapshot().await;
        records.push(record.clone());
        let temp_path = self.write_temp(records).await.inspect_err(|e| {
            error!("Failed to write snapshot for principal {}: {}", id, e);
        })?;

        // Rename and in-memory commit run to completion together, even if
        // the caller stops polling
        let inner = self.inner.clone();
        let path = self.path.clone();
        tokio::spawn(async move {
            let _guard = guard;
            fs::rename(&temp_path, &path).await?;
            inner.commit(record).await;
            Ok::<_, StoreError>(())
        })
        .await
        .map_err(|e| StoreError::Backend(format!("snapshot commit task failed: {}", e)))??;

        debug!("Committed principal {}", id);
        Ok(id)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        self.inner.count().await
    }
}
