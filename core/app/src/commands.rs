//! Command surface for embedding clients.
//!
//! Each method maps one user-facing operation onto the vault engine.
//! Requests and responses are plain serializable structs so a desktop
//! shell can forward them over its IPC bridge unchanged.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use inkvault_common::{EntryId, Result};
use inkvault_crypto::CipherSuite;
use inkvault_vault::{Entry, EntrySummary, Vault};

use crate::state::App;

/// Unlock parameters from the client.
#[derive(Debug, Clone, Deserialize)]
pub struct UnlockRequest {
    pub passphrase: String,
    /// Vault directory; falls back to the application default.
    pub vault_root: Option<PathBuf>,
    /// Suite for this session's new writes.
    pub text_encryption: Option<CipherSuite>,
}

/// Everything the client needs to render the journal after unlock.
#[derive(Debug, Clone, Serialize)]
pub struct UnlockResponse {
    pub entries: Vec<EntrySummary>,
    pub created: bool,
    /// RFC 3339 timestamp of the most recent write, if any.
    pub last_saved: Option<String>,
    pub vault_root: String,
    pub text_encryption: CipherSuite,
    pub available_text_encryptions: Vec<CipherSuite>,
}

/// Raw clipboard payload forwarded by the client.
#[derive(Debug, Clone, Deserialize)]
pub struct ClipboardImage {
    pub data: Vec<u8>,
    pub mime: Option<String>,
    pub name: Option<String>,
}

/// Fields of an entry the client can edit.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateEntryRequest {
    pub id: EntryId,
    pub title: String,
    pub content: String,
    pub folder: Option<String>,
}

impl App {
    /// Unlock (or create) a vault and make it the active one. An
    /// already-active vault is locked first.
    pub async fn unlock(&self, request: UnlockRequest) -> Result<UnlockResponse> {
        let root = request
            .vault_root
            .unwrap_or_else(|| self.default_root().clone());
        info!(root = %root.display(), "Unlock requested");

        let vault = Arc::new(Vault::with_creation_kdf(&root, self.creation_kdf()));
        let outcome = vault
            .unlock(&request.passphrase, request.text_encryption)
            .await?;

        let mut active = self.vault.write().await;
        if let Some(previous) = active.take() {
            previous.lock().await;
        }
        *active = Some(vault);

        Ok(UnlockResponse {
            entries: outcome.entries,
            created: outcome.created,
            last_saved: outcome.last_saved.map(|t| t.to_rfc3339()),
            vault_root: outcome.vault_root.display().to_string(),
            text_encryption: request.text_encryption.unwrap_or(outcome.default_algorithm),
            available_text_encryptions: outcome.available_algorithms,
        })
    }

    /// Lock the active vault. A no-op when nothing is unlocked.
    pub async fn lock(&self) {
        if let Some(vault) = self.vault.read().await.clone() {
            vault.lock().await;
        }
    }

    pub async fn is_unlocked(&self) -> bool {
        match self.vault.read().await.clone() {
            Some(vault) => vault.is_unlocked().await,
            None => false,
        }
    }

    pub async fn list_entries(&self) -> Result<Vec<EntrySummary>> {
        self.vault().await?.list_entries().await
    }

    pub async fn load_entry(&self, id: EntryId) -> Result<Entry> {
        self.vault().await?.load_entry(id).await
    }

    pub async fn create_entry(
        &self,
        title: Option<String>,
        content: Option<String>,
    ) -> Result<Entry> {
        self.vault().await?.create_entry(title, content).await
    }

    pub async fn update_entry(&self, request: UpdateEntryRequest) -> Result<Entry> {
        self.vault()
            .await?
            .update_entry(request.id, request.title, request.content, request.folder)
            .await
    }

    pub async fn delete_entry(&self, id: EntryId) -> Result<()> {
        self.vault().await?.delete_entry(id).await
    }

    /// Export every entry as plaintext Markdown; returns the file path.
    pub async fn export_plaintext_file(&self) -> Result<PathBuf> {
        self.vault().await?.export_plaintext_file().await
    }

    /// Encrypt an image file into the vault; returns the relative path
    /// to embed in entry content.
    pub async fn store_image(&self, source: PathBuf) -> Result<String> {
        self.vault().await?.store_image(&source).await
    }

    pub async fn import_clipboard_image(&self, image: ClipboardImage) -> Result<String> {
        self.vault()
            .await?
            .import_clipboard_image(image.data, image.mime.as_deref(), image.name.as_deref())
            .await
    }

    pub async fn decrypt_image(&self, path: String) -> Result<Vec<u8>> {
        self.vault().await?.decrypt_image(&path).await
    }

    pub async fn change_passphrase(
        &self,
        old_passphrase: String,
        new_passphrase: String,
    ) -> Result<()> {
        self.vault()
            .await?
            .change_passphrase(&old_passphrase, &new_passphrase)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkvault_common::Error;
    use inkvault_crypto::KdfParams;
    use tempfile::TempDir;

    fn test_app(dir: &TempDir) -> App {
        App::with_creation_kdf(dir.path(), KdfParams::fast_insecure())
    }

    fn unlock_request(passphrase: &str) -> UnlockRequest {
        UnlockRequest {
            passphrase: passphrase.to_string(),
            vault_root: None,
            text_encryption: None,
        }
    }

    #[tokio::test]
    async fn test_commands_before_unlock_fail() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir);

        assert!(!app.is_unlocked().await);
        assert!(matches!(app.list_entries().await, Err(Error::Locked)));
        assert!(matches!(app.export_plaintext_file().await, Err(Error::Locked)));
    }

    #[tokio::test]
    async fn test_unlock_create_edit_flow() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir);

        let response = app.unlock(unlock_request("open sesame seeds")).await.unwrap();
        assert!(response.created);
        assert!(response.last_saved.is_none());
        assert_eq!(response.text_encryption, CipherSuite::Aes256Gcm);
        assert!(app.is_unlocked().await);

        let entry = app
            .create_entry(Some("Day one".to_string()), Some("It begins.".to_string()))
            .await
            .unwrap();
        let updated = app
            .update_entry(UpdateEntryRequest {
                id: entry.id,
                title: "Day one".to_string(),
                content: "It begins, again.".to_string(),
                folder: None,
            })
            .await
            .unwrap();
        assert_eq!(updated.content, "It begins, again.");

        let listing = app.list_entries().await.unwrap();
        assert_eq!(listing.len(), 1);

        app.lock().await;
        assert!(!app.is_unlocked().await);
        assert!(matches!(app.load_entry(entry.id).await, Err(Error::Locked)));

        let response = app.unlock(unlock_request("open sesame seeds")).await.unwrap();
        assert!(!response.created);
        assert!(response.last_saved.is_some());
        assert_eq!(response.entries.len(), 1);
    }

    #[tokio::test]
    async fn test_unlock_switches_vault_root() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let app = test_app(&first);

        app.unlock(unlock_request("first vault words")).await.unwrap();
        app.create_entry(Some("here".to_string()), None).await.unwrap();

        let response = app
            .unlock(UnlockRequest {
                passphrase: "second vault words".to_string(),
                vault_root: Some(second.path().to_path_buf()),
                text_encryption: Some(CipherSuite::ChaCha20Poly1305),
            })
            .await
            .unwrap();
        assert!(response.created);
        assert!(response.entries.is_empty());
        assert_eq!(response.text_encryption, CipherSuite::ChaCha20Poly1305);
        assert_eq!(response.vault_root, second.path().display().to_string());
    }

    #[tokio::test]
    async fn test_image_commands() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir);
        app.unlock(unlock_request("open sesame seeds")).await.unwrap();

        let relative = app
            .import_clipboard_image(ClipboardImage {
                data: vec![9, 9, 9],
                mime: Some("image/png".to_string()),
                name: None,
            })
            .await
            .unwrap();
        assert_eq!(app.decrypt_image(relative).await.unwrap(), vec![9, 9, 9]);
    }
}
