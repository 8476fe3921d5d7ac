//! Entry CRUD against the unlocked session.
//!
//! Every mutation rewrites the whole entry file through the atomic
//! temp-and-rename path and updates the in-memory index in place.

use chrono::Utc;
use tokio::fs;
use tracing::{debug, info};

use crate::entry::{entry_path, Entry, EntrySummary, StoredEntry};
use crate::fs::write_atomic;
use crate::session::{sort_index, Vault};
use inkvault_common::{EntryId, Error, Result};

/// Title applied when an entry is created without one.
pub const UNTITLED: &str = "Untitled entry";

impl Vault {
    /// Current index, newest first. No disk I/O.
    pub async fn list_entries(&self) -> Result<Vec<EntrySummary>> {
        let state = self.state.read().await;
        let state = state.as_ref().ok_or(Error::Locked)?;
        Ok(state.index.clone())
    }

    /// Decrypt one entry in full.
    pub async fn load_entry(&self, id: EntryId) -> Result<Entry> {
        let snapshot = self.snapshot().await?;

        let path = entry_path(self.entries_dir(), id);
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::EntryNotFound(id));
            }
            Err(e) => return Err(e.into()),
        };
        let stored: StoredEntry = serde_json::from_slice(&raw).map_err(|e| {
            Error::VaultCorrupt(format!("entry file {} unparsable: {e}", path.display()))
        })?;
        let entry = stored.open(&snapshot.key)?;

        self.ensure_unlocked().await?;
        Ok(entry)
    }

    /// Create a new entry under the session's write suite and persist
    /// it before returning.
    pub async fn create_entry(
        &self,
        title: Option<String>,
        content: Option<String>,
    ) -> Result<Entry> {
        let _gate = self.write_gate.lock().await;
        let snapshot = self.snapshot().await?;

        let now = Utc::now();
        let entry = Entry {
            id: EntryId::generate(),
            title: title.filter(|t| !t.is_empty()).unwrap_or_else(|| UNTITLED.to_string()),
            content: content.unwrap_or_default(),
            created_at: now,
            updated_at: now,
            folder: None,
            algorithm: snapshot.algorithm,
        };

        self.persist(&entry, &snapshot.key).await?;

        let mut state = self.state.write().await;
        let state = state.as_mut().ok_or(Error::Locked)?;
        state.index.insert(0, entry.summary());
        sort_index(&mut state.index);
        state.last_saved = Some(now);

        info!(id = %entry.id, "Entry created");
        Ok(entry)
    }

    /// Overwrite an existing entry. `created_at` is preserved from the
    /// stored record; `updated_at` is stamped here. The rewrite uses
    /// the session's current write suite, so an update migrates the
    /// entry to it.
    pub async fn update_entry(
        &self,
        id: EntryId,
        title: String,
        content: String,
        folder: Option<String>,
    ) -> Result<Entry> {
        let _gate = self.write_gate.lock().await;
        let snapshot = self.snapshot().await?;

        let created_at = {
            let state = self.state.read().await;
            let state = state.as_ref().ok_or(Error::Locked)?;
            state
                .index
                .iter()
                .find(|record| record.id == id)
                .map(|record| record.created_at)
                .ok_or(Error::EntryNotFound(id))?
        };

        let entry = Entry {
            id,
            title: if title.is_empty() { UNTITLED.to_string() } else { title },
            content,
            created_at,
            updated_at: Utc::now(),
            folder,
            algorithm: snapshot.algorithm,
        };

        self.persist(&entry, &snapshot.key).await?;

        let mut state = self.state.write().await;
        let state = state.as_mut().ok_or(Error::Locked)?;
        if let Some(record) = state.index.iter_mut().find(|record| record.id == id) {
            *record = entry.summary();
        }
        sort_index(&mut state.index);
        state.last_saved = Some(entry.updated_at);

        debug!(id = %entry.id, "Entry updated");
        Ok(entry)
    }

    /// Remove an entry file and its index record.
    pub async fn delete_entry(&self, id: EntryId) -> Result<()> {
        let _gate = self.write_gate.lock().await;
        self.ensure_unlocked().await?;

        let path = entry_path(self.entries_dir(), id);
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::EntryNotFound(id));
            }
            Err(e) => return Err(e.into()),
        }

        let mut state = self.state.write().await;
        if let Some(state) = state.as_mut() {
            state.index.retain(|record| record.id != id);
        }

        info!(id = %id, "Entry deleted");
        Ok(())
    }

    async fn persist(&self, entry: &Entry, key: &inkvault_crypto::MasterKey) -> Result<()> {
        let stored = StoredEntry::seal(entry, key)?;
        let raw =
            serde_json::to_vec_pretty(&stored).map_err(|e| Error::Serialization(e.to_string()))?;
        write_atomic(&entry_path(self.entries_dir(), entry.id), &raw).await
    }
}
