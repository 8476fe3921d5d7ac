//! Session lifecycle for a journal vault.
//!
//! A [`Vault`] is a handle to one vault root. `unlock` derives the key
//! from the passphrase and stored metadata, validates it against the
//! canary, rebuilds the entry index, and installs the single active
//! session. `lock` drops the session; the key is zeroized on drop.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::entry::{entry_path, Entry, EntrySummary, StoredEntry};
use crate::fs::{is_temp_file, write_atomic};
use crate::images::ImageCache;
use crate::metadata::VaultMetadata;
use inkvault_common::{Error, Result};
use inkvault_crypto::{derive_key, CipherSuite, KdfParams, MasterKey, Salt};

/// Entry files directory under the vault root.
pub const ENTRIES_DIRNAME: &str = "entries";

/// Image blob directory under the vault root.
pub const IMAGES_DIRNAME: &str = "images";

/// Plaintext export directory under the vault root.
pub const EXPORTS_DIRNAME: &str = "exports";

/// Result of a successful unlock.
#[derive(Debug, Clone)]
pub struct UnlockOutcome {
    /// Index records, newest first.
    pub entries: Vec<EntrySummary>,
    /// True when this unlock created the vault.
    pub created: bool,
    /// Timestamp of the most recent write, if any entry exists.
    pub last_saved: Option<DateTime<Utc>>,
    pub vault_root: PathBuf,
    /// Suite used for new writes this session.
    pub default_algorithm: CipherSuite,
    pub available_algorithms: Vec<CipherSuite>,
}

/// In-memory state of an unlocked session. Dropped on lock.
pub(crate) struct SessionState {
    pub key: MasterKey,
    pub metadata: VaultMetadata,
    /// Suite for new writes; existing records keep their own tags.
    pub algorithm: CipherSuite,
    /// Decrypted index, kept ordered by `updated_at` desc, ties by id.
    pub index: Vec<EntrySummary>,
    pub image_cache: ImageCache,
    pub last_saved: Option<DateTime<Utc>>,
}

/// Key material captured at the start of a read operation.
pub(crate) struct KeySnapshot {
    pub key: MasterKey,
    pub algorithm: CipherSuite,
}

/// Handle to one vault root.
///
/// At most one session is active per handle; callers must not point two
/// handles (or two processes) at the same root.
pub struct Vault {
    root: PathBuf,
    entries_dir: PathBuf,
    images_dir: PathBuf,
    creation_kdf: KdfParams,
    pub(crate) state: RwLock<Option<SessionState>>,
    /// Serializes all mutating operations against this vault.
    pub(crate) write_gate: Mutex<()>,
}

impl Vault {
    /// Create a handle for `root`. No I/O happens until `unlock`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_creation_kdf(root, KdfParams::default())
    }

    /// Override the KDF cost parameters used when this handle creates a
    /// new vault. Existing vaults always unlock with their stored
    /// parameters.
    pub fn with_creation_kdf(root: impl Into<PathBuf>, kdf: KdfParams) -> Self {
        let root = root.into();
        Self {
            entries_dir: root.join(ENTRIES_DIRNAME),
            images_dir: root.join(IMAGES_DIRNAME),
            root,
            creation_kdf: kdf,
            state: RwLock::new(None),
            write_gate: Mutex::new(()),
        }
    }

    /// The vault root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn entries_dir(&self) -> &Path {
        &self.entries_dir
    }

    pub(crate) fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    /// Whether a session is currently active.
    pub async fn is_unlocked(&self) -> bool {
        self.state.read().await.is_some()
    }

    /// Unlock the vault, creating it if no metadata exists at the root.
    ///
    /// For a new vault, `preferred_algorithm` (or AES-256-GCM) becomes
    /// the stored default. For an existing vault it only selects the
    /// suite for this session's new writes.
    ///
    /// # Errors
    /// - `WrongPassphrase` on canary tag mismatch; the vault stays
    ///   locked and nothing is mutated
    /// - `VaultCorrupt` if metadata or an entry file is unparsable
    /// - `AuthenticationFailure` if an entry title fails its tag check
    ///   while the index is rebuilt
    pub async fn unlock(
        &self,
        passphrase: &str,
        preferred_algorithm: Option<CipherSuite>,
    ) -> Result<UnlockOutcome> {
        let _gate = self.write_gate.lock().await;

        fs::create_dir_all(&self.entries_dir).await?;
        fs::create_dir_all(&self.images_dir).await?;

        let (metadata, key, created) = match VaultMetadata::load(&self.root).await? {
            Some(existing) => {
                let key = derive_key(passphrase.as_bytes(), &existing.salt, &existing.kdf)?;
                existing.verify_key(&key)?;
                (existing, key, false)
            }
            None => {
                let algorithm = preferred_algorithm.unwrap_or_default();
                let salt = Salt::generate();
                let key = derive_key(passphrase.as_bytes(), &salt, &self.creation_kdf)?;
                let metadata =
                    VaultMetadata::create(&self.root, algorithm, salt, self.creation_kdf, &key)
                        .await?;
                info!(root = %self.root.display(), %algorithm, "Created new vault");
                (metadata, key, true)
            }
        };

        let index = self.build_index(&key).await?;
        let last_saved = index.first().map(|record| record.updated_at);
        let algorithm = preferred_algorithm.unwrap_or(metadata.default_algorithm);

        let outcome = UnlockOutcome {
            entries: index.clone(),
            created,
            last_saved,
            vault_root: self.root.clone(),
            default_algorithm: metadata.default_algorithm,
            available_algorithms: metadata.available_algorithms.clone(),
        };

        let mut state = self.state.write().await;
        *state = Some(SessionState {
            key,
            metadata,
            algorithm,
            index,
            image_cache: ImageCache::new(),
            last_saved,
        });

        info!(
            root = %self.root.display(),
            entries = outcome.entries.len(),
            created,
            "Vault unlocked"
        );
        Ok(outcome)
    }

    /// Lock the vault: zeroize the key, drop the index and image cache.
    /// Idempotent.
    pub async fn lock(&self) {
        let mut state = self.state.write().await;
        if state.take().is_some() {
            info!(root = %self.root.display(), "Vault locked");
        }
    }

    /// Rebuild the index by decrypting the title of every entry file.
    async fn build_index(&self, key: &MasterKey) -> Result<Vec<EntrySummary>> {
        let mut index = Vec::new();
        let mut dir = fs::read_dir(&self.entries_dir).await?;

        while let Some(dirent) = dir.next_entry().await? {
            let path = dirent.path();
            if is_temp_file(&path) || path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }

            let raw = fs::read(&path).await?;
            let stored: StoredEntry = serde_json::from_slice(&raw).map_err(|e| {
                Error::VaultCorrupt(format!("entry file {} unparsable: {e}", path.display()))
            })?;
            index.push(stored.open_summary(key)?);
        }

        sort_index(&mut index);
        debug!(entries = index.len(), "Index rebuilt");
        Ok(index)
    }

    /// Capture the session key and write suite, failing when locked.
    pub(crate) async fn snapshot(&self) -> Result<KeySnapshot> {
        let state = self.state.read().await;
        let state = state.as_ref().ok_or(Error::Locked)?;
        Ok(KeySnapshot {
            key: state.key.clone(),
            algorithm: state.algorithm,
        })
    }

    /// Re-check the unlocked flag. Read operations call this right
    /// before handing back decrypted bytes so a lock that happened
    /// mid-operation turns into `LockedError` instead of stale
    /// plaintext.
    pub(crate) async fn ensure_unlocked(&self) -> Result<()> {
        if self.state.read().await.is_some() {
            Ok(())
        } else {
            Err(Error::Locked)
        }
    }

    /// Re-key the vault under a new passphrase.
    ///
    /// Every entry and image blob is decrypted under the old key and
    /// rewritten under the new one (keeping each record's own suite);
    /// metadata with the new salt and canary is written last. There is
    /// no multi-file transaction: a crash mid-rewrite can leave records
    /// under both keys.
    pub async fn change_passphrase(
        &self,
        old_passphrase: &str,
        new_passphrase: &str,
    ) -> Result<()> {
        if new_passphrase.is_empty() {
            return Err(Error::InvalidInput(
                "New passphrase cannot be empty".to_string(),
            ));
        }

        let _gate = self.write_gate.lock().await;

        let (metadata, old_key) = {
            let state = self.state.read().await;
            let state = state.as_ref().ok_or(Error::Locked)?;
            let old_key =
                derive_key(old_passphrase.as_bytes(), &state.metadata.salt, &state.metadata.kdf)?;
            state.metadata.verify_key(&old_key)?;
            (state.metadata.clone(), old_key)
        };

        // Decrypt everything first so a bad record aborts before any
        // rewrite happens.
        let entries = self.load_all_entries(&old_key).await?;
        let images = self.load_all_images(&old_key).await?;

        let salt = Salt::generate();
        let kdf = self.creation_kdf;
        let new_key = derive_key(new_passphrase.as_bytes(), &salt, &kdf)?;

        let mut new_metadata = metadata;
        new_metadata.salt = salt;
        new_metadata.kdf = kdf;
        new_metadata.reseal_canary(&new_key)?;

        for entry in &entries {
            let stored = StoredEntry::seal(entry, &new_key)?;
            let raw = serde_json::to_vec_pretty(&stored)
                .map_err(|e| Error::Serialization(e.to_string()))?;
            write_atomic(&entry_path(&self.entries_dir, entry.id), &raw).await?;
        }
        for (path, suite, plaintext) in &images {
            let sealed = crate::images::seal_image(*suite, &new_key, plaintext)?;
            write_atomic(path, &sealed).await?;
        }
        new_metadata.save(&self.root).await?;

        let mut state = self.state.write().await;
        let state = state.as_mut().ok_or(Error::Locked)?;
        state.key = new_key;
        state.metadata = new_metadata;
        state.image_cache = ImageCache::new();

        info!(
            root = %self.root.display(),
            entries = entries.len(),
            images = images.len(),
            "Passphrase changed"
        );
        Ok(())
    }

    async fn load_all_entries(&self, key: &MasterKey) -> Result<Vec<Entry>> {
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&self.entries_dir).await?;
        while let Some(dirent) = dir.next_entry().await? {
            let path = dirent.path();
            if is_temp_file(&path) || path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            let raw = fs::read(&path).await?;
            let stored: StoredEntry = serde_json::from_slice(&raw).map_err(|e| {
                Error::VaultCorrupt(format!("entry file {} unparsable: {e}", path.display()))
            })?;
            entries.push(stored.open(key)?);
        }
        Ok(entries)
    }

    async fn load_all_images(
        &self,
        key: &MasterKey,
    ) -> Result<Vec<(PathBuf, CipherSuite, Vec<u8>)>> {
        let mut blobs = Vec::new();
        let mut stack = vec![self.images_dir.clone()];

        while let Some(dir) = stack.pop() {
            let mut rd = fs::read_dir(&dir).await?;
            while let Some(dirent) = rd.next_entry().await? {
                let path = dirent.path();
                if dirent.file_type().await?.is_dir() {
                    stack.push(path);
                } else if !is_temp_file(&path) {
                    let raw = fs::read(&path).await?;
                    let (suite, plaintext) = crate::images::open_image(key, &raw)?;
                    blobs.push((path, suite, plaintext));
                }
            }
        }
        Ok(blobs)
    }
}

/// Order by last-modified descending, ties broken by id for
/// deterministic listings.
pub(crate) fn sort_index(index: &mut [EntrySummary]) {
    index.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
}
