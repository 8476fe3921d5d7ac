//! Key derivation using Argon2id.
//!
//! Argon2id is a memory-hard password hashing function that provides
//! resistance to both GPU and time-memory trade-off attacks. Cost
//! parameters are persisted per vault so existing vaults stay unlockable
//! when defaults change in a later release.

use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};

use crate::keys::{MasterKey, Salt, KEY_LENGTH};
use inkvault_common::{Error, Result};

/// Parameters for Argon2id key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB (e.g., 65536 = 64 MiB).
    pub memory_cost: u32,
    /// Number of iterations.
    pub time_cost: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl KdfParams {
    /// Parameters suitable for interactive unlock.
    ///
    /// Targets well under a second of derivation time on desktop
    /// hardware while staying memory-hard.
    pub fn interactive() -> Self {
        Self {
            memory_cost: 65536, // 64 MiB
            time_cost: 3,
            parallelism: 4,
        }
    }

    /// Reduced parameters for test vaults.
    ///
    /// Never used for real vault metadata.
    pub fn fast_insecure() -> Self {
        Self {
            memory_cost: 8192, // 8 MiB
            time_cost: 1,
            parallelism: 1,
        }
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::interactive()
    }
}

/// Derive a master key from a passphrase and salt using Argon2id.
///
/// The same passphrase, salt, and parameters always produce the same
/// key; this is what makes re-unlocking a vault possible.
///
/// # Errors
/// - Passphrase is empty
/// - Argon2id parameters are malformed (caller bug, not user-facing)
pub fn derive_key(passphrase: &[u8], salt: &Salt, params: &KdfParams) -> Result<MasterKey> {
    if passphrase.is_empty() {
        return Err(Error::InvalidInput("Passphrase cannot be empty".to_string()));
    }

    let argon2_params = Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        Some(KEY_LENGTH),
    )
    .map_err(|e| Error::Crypto(format!("Invalid KDF parameters: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key_bytes = [0u8; KEY_LENGTH];
    argon2
        .hash_password_into(passphrase, salt.as_bytes(), &mut key_bytes)
        .map_err(|e| Error::Crypto(format!("Key derivation failed: {}", e)))?;

    Ok(MasterKey::from_bytes(key_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_key_deterministic() {
        let passphrase = b"correct horse battery staple";
        let salt = Salt::from_bytes([42u8; 32]);
        let params = KdfParams::fast_insecure();

        let key1 = derive_key(passphrase, &salt, &params).unwrap();
        let key2 = derive_key(passphrase, &salt, &params).unwrap();

        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_different_salt() {
        let passphrase = b"correct horse battery staple";
        let params = KdfParams::fast_insecure();

        let key1 = derive_key(passphrase, &Salt::from_bytes([1u8; 32]), &params).unwrap();
        let key2 = derive_key(passphrase, &Salt::from_bytes([2u8; 32]), &params).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_different_passphrase() {
        let salt = Salt::from_bytes([42u8; 32]);
        let params = KdfParams::fast_insecure();

        let key1 = derive_key(b"passphrase one", &salt, &params).unwrap();
        let key2 = derive_key(b"passphrase two", &salt, &params).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_empty_passphrase_fails() {
        let salt = Salt::generate();
        assert!(derive_key(b"", &salt, &KdfParams::fast_insecure()).is_err());
    }

    #[test]
    fn test_kdf_params_serde_roundtrip() {
        let params = KdfParams::interactive();
        let json = serde_json::to_string(&params).unwrap();
        let back: KdfParams = serde_json::from_str(&json).unwrap();
        assert_eq!(params, back);
    }
}
