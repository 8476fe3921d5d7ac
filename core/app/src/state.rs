//! Application state shared across command invocations.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;

use inkvault_common::{Error, Result};
use inkvault_crypto::KdfParams;
use inkvault_vault::Vault;

/// Long-lived application state: the default vault location and the
/// handle to the vault opened by the most recent unlock.
pub struct App {
    default_root: PathBuf,
    creation_kdf: KdfParams,
    pub(crate) vault: RwLock<Option<Arc<Vault>>>,
}

impl App {
    /// `default_root` is where a vault is created or opened when an
    /// unlock request names no directory.
    pub fn new(default_root: impl Into<PathBuf>) -> Self {
        Self::with_creation_kdf(default_root, KdfParams::default())
    }

    /// Override the KDF cost used when creating new vaults.
    pub fn with_creation_kdf(default_root: impl Into<PathBuf>, kdf: KdfParams) -> Self {
        Self {
            default_root: default_root.into(),
            creation_kdf: kdf,
            vault: RwLock::new(None),
        }
    }

    pub fn default_root(&self) -> &PathBuf {
        &self.default_root
    }

    pub(crate) fn creation_kdf(&self) -> KdfParams {
        self.creation_kdf
    }

    /// The current vault handle, or `LockedError` before any unlock.
    pub(crate) async fn vault(&self) -> Result<Arc<Vault>> {
        self.vault.read().await.clone().ok_or(Error::Locked)
    }
}
