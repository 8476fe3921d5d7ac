//! Plaintext Markdown export.
//!
//! Every entry is decrypted and concatenated into a single document,
//! newest first, then written under `exports/` in one atomic step. Any
//! entry that fails to decrypt aborts the whole export.

use chrono::{SecondsFormat, Utc};
use std::path::PathBuf;
use tokio::fs;
use tracing::info;

use crate::entry::{entry_path, Entry, StoredEntry};
use crate::fs::write_atomic;
use crate::session::{Vault, EXPORTS_DIRNAME};
use inkvault_common::{Error, Result};

/// Separator between exported entries.
const DIVIDER: &str = "\n---\n\n";

fn render(entry: &Entry) -> String {
    format!(
        "# {}\nCreated: {}\nUpdated: {}\n\n{}",
        entry.title,
        entry.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        entry.updated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        entry.content
    )
}

impl Vault {
    /// Render the whole vault as one Markdown document, newest entry
    /// first. Image references in entry content are left as-is.
    pub async fn export_plaintext(&self) -> Result<String> {
        let snapshot = self.snapshot().await?;
        let index = self.list_entries().await?;

        let mut sections = Vec::with_capacity(index.len());
        for record in &index {
            let path = entry_path(self.entries_dir(), record.id);
            let raw = match fs::read(&path).await {
                Ok(raw) => raw,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(Error::EntryNotFound(record.id));
                }
                Err(e) => return Err(e.into()),
            };
            let stored: StoredEntry = serde_json::from_slice(&raw).map_err(|e| {
                Error::VaultCorrupt(format!("entry file {} unparsable: {e}", path.display()))
            })?;
            sections.push(render(&stored.open(&snapshot.key)?));
        }

        self.ensure_unlocked().await?;
        Ok(sections.join(DIVIDER))
    }

    /// Write the export document to `exports/journal-YYYY-MM-DD.md`,
    /// overwriting a same-day export. Returns the file's path.
    pub async fn export_plaintext_file(&self) -> Result<PathBuf> {
        let document = self.export_plaintext().await?;

        let filename = format!("journal-{}.md", Utc::now().format("%Y-%m-%d"));
        let path = self.root().join(EXPORTS_DIRNAME).join(filename);
        write_atomic(&path, document.as_bytes()).await?;

        info!(path = %path.display(), bytes = document.len(), "Vault exported");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkvault_crypto::KdfParams;
    use tempfile::TempDir;

    async fn unlocked_vault(dir: &TempDir) -> Vault {
        let vault = Vault::with_creation_kdf(dir.path(), KdfParams::fast_insecure());
        vault.unlock("a serviceable passphrase", None).await.unwrap();
        vault
    }

    #[tokio::test]
    async fn test_export_orders_newest_first() {
        let dir = TempDir::new().unwrap();
        let vault = unlocked_vault(&dir).await;

        vault
            .create_entry(Some("Older".to_string()), Some("first words".to_string()))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        vault
            .create_entry(Some("Newer".to_string()), Some("second words".to_string()))
            .await
            .unwrap();

        let document = vault.export_plaintext().await.unwrap();
        let newer = document.find("# Newer").unwrap();
        let older = document.find("# Older").unwrap();
        assert!(newer < older);
        assert!(document.contains("first words"));
        assert!(document.contains(DIVIDER));
    }

    #[tokio::test]
    async fn test_export_empty_vault() {
        let dir = TempDir::new().unwrap();
        let vault = unlocked_vault(&dir).await;

        assert_eq!(vault.export_plaintext().await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_export_file_written_under_exports() {
        let dir = TempDir::new().unwrap();
        let vault = unlocked_vault(&dir).await;

        vault
            .create_entry(Some("Kept".to_string()), Some("plain words".to_string()))
            .await
            .unwrap();

        let path = vault.export_plaintext_file().await.unwrap();
        assert!(path.starts_with(dir.path().join(EXPORTS_DIRNAME)));
        assert!(path.file_name().unwrap().to_str().unwrap().starts_with("journal-"));

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("# Kept"));
        assert!(written.contains("plain words"));

        // A second export the same day overwrites rather than piling up.
        let again = vault.export_plaintext_file().await.unwrap();
        assert_eq!(again, path);
        let files: Vec<_> = std::fs::read_dir(dir.path().join(EXPORTS_DIRNAME))
            .unwrap()
            .collect();
        assert_eq!(files.len(), 1);
    }

    #[tokio::test]
    async fn test_export_fails_when_locked() {
        let dir = TempDir::new().unwrap();
        let vault = unlocked_vault(&dir).await;
        vault.lock().await;

        assert!(matches!(vault.export_plaintext().await, Err(Error::Locked)));
        assert!(matches!(vault.export_plaintext_file().await, Err(Error::Locked)));
    }

    #[tokio::test]
    async fn test_export_aborts_on_corrupt_entry() {
        let dir = TempDir::new().unwrap();
        let vault = unlocked_vault(&dir).await;

        let entry = vault
            .create_entry(Some("Fine".to_string()), Some("ok".to_string()))
            .await
            .unwrap();
        let path = entry_path(&dir.path().join("entries"), entry.id);
        std::fs::write(&path, b"{not json").unwrap();

        assert!(matches!(
            vault.export_plaintext().await,
            Err(Error::VaultCorrupt(_))
        ));
    }
}
