//! Salted one-way secret hashing with Argon2id.

use crate::error::HashError;
use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::{Algorithm, Argon2, Params, Version};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, instrument};

/// Argon2id cost parameters.
///
/// Fixed for the lifetime of the process; raise them over time to keep
/// brute-force attacks expensive on current hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkFactor {
    /// Memory cost in KiB
    pub memory_cost_kib: u32,
    /// Number of passes
    pub iterations: u32,
    /// Degree of parallelism (lanes)
    pub parallelism: u32,
}

impl Default for WorkFactor {
    fn default() -> Self {
        Self {
            memory_cost_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// Digest of a secret in PHC string format.
///
/// The salt and parameters are embedded, so the digest alone is enough to
/// re-derive and compare. It is never equal to the plaintext.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretDigest(String);

impl SecretDigest {
    /// PHC string form (`$argon2id$v=19$m=...`).
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretDigest([REDACTED])")
    }
}

/// One-way secret hasher.
#[derive(Clone)]
pub struct SecretHasher {
    argon2: Argon2<'static>,
    work_factor: WorkFactor,
}

impl SecretHasher {
    /// Create a hasher, validating the work factor once.
    pub fn new(work_factor: WorkFactor) -> Result<Self, HashError> {
        let params = Params::new(
            work_factor.memory_cost_kib,
            work_factor.iterations,
            work_factor.parallelism,
            None,
        )
        .map_err(HashError::InvalidWorkFactor)?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            work_factor,
        })
    }

    pub fn work_factor(&self) -> WorkFactor {
        self.work_factor
    }

    /// Hash a secret on the blocking thread pool.
    ///
    /// A fresh random salt is drawn for every call, so hashing the same
    /// secret twice yields two different digests.
    #[instrument(skip_all)]
    pub async fn hash(&self, plaintext: SecretString) -> Result<SecretDigest, HashError> {
        let hasher = self.clone();
        let digest = tokio::task::spawn_blocking(move || {
            hasher.hash_blocking(plaintext.expose_secret())
        })
        .await??;

        debug!("Secret hashed");
        Ok(digest)
    }

    /// Hash a secret on the current thread.
    pub fn hash_blocking(&self, plaintext: &str) -> Result<SecretDigest, HashError> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| SecretDigest(hash.to_string()))
            .map_err(HashError::Hashing)
    }

    /// Re-derive the digest for `plaintext` and compare.
    ///
    /// Uses the parameters embedded in the digest, not this hasher's.
    pub fn verify(&self, plaintext: &str, digest: &SecretDigest) -> bool {
        let Ok(parsed) = PasswordHash::new(digest.as_str()) else {
            return false;
        };

        self.argon2
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }
}

impl fmt::Debug for SecretHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretHasher")
            .field("work_factor", &self.work_factor)
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::fast_hasher;
    use super::*;

    #[test]
    fn test_digest_differs_from_plaintext() {
        let hasher = fast_hasher();
        let digest = hasher.hash_blocking("secretpw").unwrap();

        assert_ne!(digest.as_str(), "secretpw");
        assert!(!digest.as_str().contains("secretpw"));
        assert!(digest.as_str().starts_with("$argon2id$"));
    }

    #[test]
    fn test_same_secret_hashes_differently() {
        let hasher = fast_hasher();
        let first = hasher.hash_blocking("secretpw").unwrap();
        let second = hasher.hash_blocking("secretpw").unwrap();

        assert_ne!(first, second);
        assert!(hasher.verify("secretpw", &first));
        assert!(hasher.verify("secretpw", &second));
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let hasher = fast_hasher();
        let digest = hasher.hash_blocking("secretpw").unwrap();

        assert!(!hasher.verify("secretpW", &digest));
        assert!(!hasher.verify("", &digest));
    }

    #[test]
    fn test_verify_rejects_garbage_digest() {
        let hasher = fast_hasher();
        let digest = SecretDigest("not-a-phc-string".into());

        assert!(!hasher.verify("secretpw", &digest));
    }

    #[test]
    fn test_work_factor_embedded_in_digest() {
        let hasher = fast_hasher();
        let digest = hasher.hash_blocking("secretpw").unwrap();

        assert!(digest.as_str().contains("m=8,t=1,p=1"));
    }

    #[test]
    fn test_digest_verifies_under_different_work_factor() {
        let digest = fast_hasher().hash_blocking("secretpw").unwrap();
        let stronger = SecretHasher::new(WorkFactor {
            memory_cost_kib: 16,
            iterations: 2,
            parallelism: 1,
        })
        .unwrap();

        assert!(stronger.verify("secretpw", &digest));
    }

    #[test]
    fn test_invalid_work_factor() {
        let result = SecretHasher::new(WorkFactor {
            memory_cost_kib: 8,
            iterations: 1,
            parallelism: 0,
        });

        assert!(matches!(result, Err(HashError::InvalidWorkFactor(_))));
    }

    #[test]
    fn test_debug_redacts_digest() {
        let digest = fast_hasher().hash_blocking("secretpw").unwrap();
        let debug = format!("{:?}", digest);

        assert_eq!(debug, "SecretDigest([REDACTED])");
    }

    #[test]
    fn test_default_work_factor() {
        let hasher = SecretHasher::new(WorkFactor::default()).unwrap();
        assert_eq!(hasher.work_factor().memory_cost_kib, 19456);
        assert_eq!(hasher.work_factor().iterations, 2);
    }

    #[tokio::test]
    async fn test_async_hash() {
        let hasher = fast_hasher();
        let digest = hasher
            .hash(SecretString::new("secretpw".to_string()))
            .await
            .unwrap();

        assert!(hasher.verify("secretpw", &digest));
    }
}
