//! Vault metadata persistence.
//!
//! One `vault.json` per vault root holds the format version, KDF salt
//! and cost parameters, the default cipher suite, and a canary
//! ciphertext used to validate a derived key without touching entries.
//! The file is created once on first unlock and never rewritten except
//! by a passphrase change.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tokio::fs;

use crate::fs::write_atomic;
use inkvault_common::{b64, Error, Result};
use inkvault_crypto::{decrypt, encrypt, CipherSuite, KdfParams, MasterKey, Salt};

/// Metadata file name in the vault root.
pub const METADATA_FILENAME: &str = "vault.json";

/// Metadata format version.
pub const METADATA_VERSION: u32 = 1;

const CANARY_PLAINTEXT: &[u8] = b"INKVAULT_KEY_CANARY_V1";
const CANARY_AAD: &[u8] = b"canary";

/// Known ciphertext used to validate a derived key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Canary {
    pub algorithm: CipherSuite,
    #[serde(with = "b64")]
    pub nonce: Vec<u8>,
    #[serde(with = "b64")]
    pub ciphertext: Vec<u8>,
}

impl Canary {
    fn seal(suite: CipherSuite, key: &MasterKey) -> Result<Self> {
        let (nonce, ciphertext) = encrypt(suite, key.as_bytes(), CANARY_PLAINTEXT, CANARY_AAD)?;
        Ok(Self {
            algorithm: suite,
            nonce: nonce.to_vec(),
            ciphertext,
        })
    }
}

/// Per-vault metadata stored at the vault root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultMetadata {
    pub version: u32,
    pub salt: Salt,
    pub kdf: KdfParams,
    pub default_algorithm: CipherSuite,
    pub available_algorithms: Vec<CipherSuite>,
    pub canary: Canary,
    pub created_at: DateTime<Utc>,
}

impl VaultMetadata {
    /// Path of the metadata file under `root`.
    pub fn path_for(root: &Path) -> PathBuf {
        root.join(METADATA_FILENAME)
    }

    /// Load metadata from `root`.
    ///
    /// Returns `Ok(None)` when no metadata exists (the vault has never
    /// been created). An unreadable or unparsable file is `VaultCorrupt`.
    pub async fn load(root: &Path) -> Result<Option<Self>> {
        let path = Self::path_for(root);
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let metadata: Self = serde_json::from_slice(&raw)
            .map_err(|e| Error::VaultCorrupt(format!("metadata unparsable: {e}")))?;

        if metadata.version != METADATA_VERSION {
            return Err(Error::VaultCorrupt(format!(
                "unsupported metadata version {}",
                metadata.version
            )));
        }

        Ok(Some(metadata))
    }

    /// Create and persist fresh metadata for a new vault.
    ///
    /// Fails with `AlreadyInitialized` if metadata already exists.
    pub async fn create(
        root: &Path,
        default_algorithm: CipherSuite,
        salt: Salt,
        kdf: KdfParams,
        key: &MasterKey,
    ) -> Result<Self> {
        let path = Self::path_for(root);
        if fs::try_exists(&path).await? {
            return Err(Error::AlreadyInitialized(root.to_path_buf()));
        }

        let metadata = Self {
            version: METADATA_VERSION,
            salt,
            kdf,
            default_algorithm,
            available_algorithms: CipherSuite::all().to_vec(),
            canary: Canary::seal(default_algorithm, key)?,
            created_at: Utc::now(),
        };

        metadata.save(root).await?;
        Ok(metadata)
    }

    /// Persist metadata atomically.
    pub async fn save(&self, root: &Path) -> Result<()> {
        let raw = serde_json::to_vec_pretty(self)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        write_atomic(&Self::path_for(root), &raw).await
    }

    /// Validate a derived key against the canary.
    ///
    /// A tag mismatch means the passphrase was wrong, not that the
    /// vault is damaged.
    pub fn verify_key(&self, key: &MasterKey) -> Result<()> {
        let plaintext = decrypt(
            self.canary.algorithm,
            key.as_bytes(),
            &self.canary.nonce,
            &self.canary.ciphertext,
            CANARY_AAD,
        )
        .map_err(|err| match err {
            Error::AuthenticationFailure(_) => Error::WrongPassphrase,
            other => other,
        })?;

        if bool::from(plaintext.ct_eq(CANARY_PLAINTEXT)) {
            Ok(())
        } else {
            Err(Error::WrongPassphrase)
        }
    }

    /// Rebuild the canary under a new key, preserving the suite.
    pub(crate) fn reseal_canary(&mut self, key: &MasterKey) -> Result<()> {
        self.canary = Canary::seal(self.canary.algorithm, key)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkvault_crypto::KEY_LENGTH;
    use tempfile::TempDir;

    fn test_key() -> MasterKey {
        MasterKey::from_bytes([3u8; KEY_LENGTH])
    }

    async fn create_test_metadata(root: &Path) -> VaultMetadata {
        VaultMetadata::create(
            root,
            CipherSuite::Aes256Gcm,
            Salt::generate(),
            KdfParams::fast_insecure(),
            &test_key(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_then_load() {
        let dir = TempDir::new().unwrap();
        let created = create_test_metadata(dir.path()).await;

        let loaded = VaultMetadata::load(dir.path()).await.unwrap().unwrap();
        assert_eq!(loaded.salt, created.salt);
        assert_eq!(loaded.default_algorithm, CipherSuite::Aes256Gcm);
        assert_eq!(loaded.available_algorithms, CipherSuite::all().to_vec());
    }

    #[tokio::test]
    async fn test_load_missing_returns_none() {
        let dir = TempDir::new().unwrap();
        assert!(VaultMetadata::load(dir.path()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_twice_fails() {
        let dir = TempDir::new().unwrap();
        create_test_metadata(dir.path()).await;

        let second = VaultMetadata::create(
            dir.path(),
            CipherSuite::Aes256Gcm,
            Salt::generate(),
            KdfParams::fast_insecure(),
            &test_key(),
        )
        .await;
        assert!(matches!(second, Err(Error::AlreadyInitialized(_))));
    }

    #[tokio::test]
    async fn test_garbled_metadata_is_corrupt() {
        let dir = TempDir::new().unwrap();
        std::fs::write(VaultMetadata::path_for(dir.path()), b"not json").unwrap();

        assert!(matches!(
            VaultMetadata::load(dir.path()).await,
            Err(Error::VaultCorrupt(_))
        ));
    }

    #[tokio::test]
    async fn test_verify_key() {
        let dir = TempDir::new().unwrap();
        let metadata = create_test_metadata(dir.path()).await;

        assert!(metadata.verify_key(&test_key()).is_ok());

        let wrong = MasterKey::from_bytes([4u8; KEY_LENGTH]);
        assert!(matches!(
            metadata.verify_key(&wrong),
            Err(Error::WrongPassphrase)
        ));
    }
}
