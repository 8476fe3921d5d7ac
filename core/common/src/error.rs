//! Common error types for InkVault.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::EntryId;

/// Top-level error type for InkVault operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Passphrase validation failed during unlock.
    #[error("Wrong passphrase")]
    WrongPassphrase,

    /// Metadata or an entry file is malformed. Surfaced, never auto-repaired.
    #[error("Vault corrupt: {0}")]
    VaultCorrupt(String),

    /// AEAD tag verification failed on a specific record.
    #[error("Authentication failure: {0}")]
    AuthenticationFailure(String),

    /// No entry with the given id.
    #[error("Entry not found: {0}")]
    EntryNotFound(EntryId),

    /// No image blob at the given path.
    #[error("Image not found: {0}")]
    ImageNotFound(String),

    /// Operation attempted without an active session.
    #[error("Vault is locked")]
    Locked,

    /// Vault creation attempted over existing metadata.
    #[error("Vault already initialized at {}", .0.display())]
    AlreadyInitialized(PathBuf),

    /// Cryptographic operation failed for a reason other than tag mismatch.
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
