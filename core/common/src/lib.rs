//! Common types shared across InkVault modules.
//!
//! This crate provides the error taxonomy and foundational types used by
//! the crypto, vault, and app layers.

pub mod b64;
pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::EntryId;
