//! Encrypted journal vault engine for InkVault.
//!
//! This crate provides:
//! - Vault metadata persistence (salt, KDF parameters, default suite)
//! - Session lifecycle with secure key management
//! - Atomic per-entry encrypted persistence and an in-memory index
//! - Encrypted image attachment storage with a session-scoped cache
//! - All-or-nothing plaintext export
//!
//! # Architecture
//! A [`Vault`] is a handle to one vault root directory. `unlock` derives
//! the key and installs the single active session; every store operation
//! goes through that handle until `lock` drops the session and zeroizes
//! the key. Mutations are serialized through one internal gate; reads run
//! concurrently against a snapshot of the session key.
//!
//! # Caller constraints
//! Concurrent processes touching the same vault root are not coordinated
//! and have undefined behavior.

pub mod entries;
pub mod entry;
pub mod export;
pub mod fs;
pub mod images;
pub mod metadata;
pub mod session;

pub use entry::{Entry, EntrySummary};
pub use metadata::{VaultMetadata, METADATA_FILENAME};
pub use session::{UnlockOutcome, Vault, ENTRIES_DIRNAME, EXPORTS_DIRNAME, IMAGES_DIRNAME};
