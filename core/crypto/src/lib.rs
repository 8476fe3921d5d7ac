//! Cryptographic primitives for InkVault.
//!
//! This crate provides:
//! - Passphrase key derivation using Argon2id
//! - Authenticated encryption with two cipher suites
//!   (AES-256-GCM and ChaCha20-Poly1305)
//! - Secure key types with automatic zeroization
//!
//! # Security Guarantees
//! - Key material is zeroized on drop
//! - Plaintext is never returned on tag mismatch
//! - Nonces are freshly randomized on every encryption

pub mod aead;
pub mod kdf;
pub mod keys;

pub use aead::{decrypt, encrypt, CipherSuite, NONCE_LENGTH, TAG_LENGTH};
pub use kdf::{derive_key, KdfParams};
pub use keys::{MasterKey, Salt, KEY_LENGTH, SALT_LENGTH};
