//! Entry types and their on-disk encrypted representation.
//!
//! Each entry lives in its own file under `entries/<id>.json`. Title and
//! content are sealed independently, each bound to the entry id and a
//! field tag as associated data, so ciphertext from one field or entry
//! cannot be substituted for another.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use inkvault_common::{b64, Error, EntryId, Result};
use inkvault_crypto::{decrypt, encrypt, CipherSuite, MasterKey};

/// Entry file format version.
pub const ENTRY_VERSION: u32 = 1;

/// A fully decrypted journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub folder: Option<String>,
    /// Suite the entry's current ciphertext was written under.
    pub algorithm: CipherSuite,
}

impl Entry {
    pub(crate) fn summary(&self) -> EntrySummary {
        EntrySummary {
            id: self.id,
            title: self.title.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            folder: self.folder.clone(),
            algorithm: self.algorithm,
        }
    }
}

/// Index record for one entry: everything needed for listing without
/// decrypting the content field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySummary {
    pub id: EntryId,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub folder: Option<String>,
    pub algorithm: CipherSuite,
}

/// One sealed field: nonce plus ciphertext (tag included).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SealedField {
    #[serde(with = "b64")]
    pub nonce: Vec<u8>,
    #[serde(with = "b64")]
    pub ciphertext: Vec<u8>,
}

/// On-disk entry record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StoredEntry {
    pub version: u32,
    pub id: EntryId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub folder: Option<String>,
    pub algorithm: CipherSuite,
    pub title: SealedField,
    pub content: SealedField,
}

fn field_aad(id: EntryId, field: &str) -> Vec<u8> {
    format!("{id}:{field}").into_bytes()
}

fn seal_field(
    suite: CipherSuite,
    key: &MasterKey,
    id: EntryId,
    field: &str,
    plaintext: &str,
) -> Result<SealedField> {
    let (nonce, ciphertext) = encrypt(
        suite,
        key.as_bytes(),
        plaintext.as_bytes(),
        &field_aad(id, field),
    )?;
    Ok(SealedField {
        nonce: nonce.to_vec(),
        ciphertext,
    })
}

fn open_field(
    suite: CipherSuite,
    key: &MasterKey,
    id: EntryId,
    field: &str,
    sealed: &SealedField,
) -> Result<String> {
    let plaintext = decrypt(
        suite,
        key.as_bytes(),
        &sealed.nonce,
        &sealed.ciphertext,
        &field_aad(id, field),
    )
    .map_err(|err| match err {
        Error::AuthenticationFailure(_) => {
            Error::AuthenticationFailure(format!("entry {id}, field {field}"))
        }
        other => other,
    })?;
    String::from_utf8(plaintext)
        .map_err(|_| Error::VaultCorrupt(format!("entry {id}: {field} is not valid UTF-8")))
}

impl StoredEntry {
    /// Seal an entry with fresh random nonces for both fields.
    pub fn seal(entry: &Entry, key: &MasterKey) -> Result<Self> {
        Ok(Self {
            version: ENTRY_VERSION,
            id: entry.id,
            created_at: entry.created_at,
            updated_at: entry.updated_at,
            folder: entry.folder.clone(),
            algorithm: entry.algorithm,
            title: seal_field(entry.algorithm, key, entry.id, "title", &entry.title)?,
            content: seal_field(entry.algorithm, key, entry.id, "content", &entry.content)?,
        })
    }

    /// Decrypt both fields.
    pub fn open(&self, key: &MasterKey) -> Result<Entry> {
        self.check_version()?;
        Ok(Entry {
            id: self.id,
            title: open_field(self.algorithm, key, self.id, "title", &self.title)?,
            content: open_field(self.algorithm, key, self.id, "content", &self.content)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
            folder: self.folder.clone(),
            algorithm: self.algorithm,
        })
    }

    /// Decrypt only the title, producing the index record.
    ///
    /// Used when rebuilding the index on unlock so content ciphertexts
    /// are never touched until explicitly loaded.
    pub fn open_summary(&self, key: &MasterKey) -> Result<EntrySummary> {
        self.check_version()?;
        Ok(EntrySummary {
            id: self.id,
            title: open_field(self.algorithm, key, self.id, "title", &self.title)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
            folder: self.folder.clone(),
            algorithm: self.algorithm,
        })
    }

    fn check_version(&self) -> Result<()> {
        if self.version != ENTRY_VERSION {
            return Err(Error::VaultCorrupt(format!(
                "unsupported entry version {} for entry {}",
                self.version, self.id
            )));
        }
        Ok(())
    }
}

/// Path of the entry file for `id`.
pub(crate) fn entry_path(entries_dir: &Path, id: EntryId) -> PathBuf {
    entries_dir.join(format!("{id}.json"))
}
