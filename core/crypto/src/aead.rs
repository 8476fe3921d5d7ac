//! Authenticated encryption with associated data.
//!
//! Two cipher suites are supported: AES-256-GCM and ChaCha20-Poly1305.
//! Both use 96-bit nonces and 128-bit tags. The suite used for a piece
//! of ciphertext is recorded next to it, so a vault can hold content
//! written under different suites at different times.

use std::fmt;

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use chacha20poly1305::ChaCha20Poly1305;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::keys::KEY_LENGTH;
use inkvault_common::{Error, Result};

/// Nonce size in bytes (96-bit, shared by both suites).
pub const NONCE_LENGTH: usize = 12;

/// Authentication tag size in bytes.
pub const TAG_LENGTH: usize = 16;

/// Content encryption algorithm.
///
/// The suite is fixed per record at write time and carried in the
/// record's stored metadata; it is independent of the vault default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CipherSuite {
    #[serde(rename = "aes256_gcm")]
    Aes256Gcm,
    #[serde(rename = "chacha20_poly1305")]
    ChaCha20Poly1305,
}

impl CipherSuite {
    /// All suites this build can read and write.
    pub fn all() -> [CipherSuite; 2] {
        [CipherSuite::Aes256Gcm, CipherSuite::ChaCha20Poly1305]
    }

    /// Single-byte tag used in binary envelopes (image blobs).
    pub fn tag_byte(self) -> u8 {
        match self {
            CipherSuite::Aes256Gcm => 1,
            CipherSuite::ChaCha20Poly1305 => 2,
        }
    }

    /// Reverse of [`tag_byte`](Self::tag_byte).
    pub fn from_tag_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(CipherSuite::Aes256Gcm),
            2 => Some(CipherSuite::ChaCha20Poly1305),
            _ => None,
        }
    }
}

impl Default for CipherSuite {
    fn default() -> Self {
        CipherSuite::Aes256Gcm
    }
}

impl fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CipherSuite::Aes256Gcm => write!(f, "aes256_gcm"),
            CipherSuite::ChaCha20Poly1305 => write!(f, "chacha20_poly1305"),
        }
    }
}

fn check_key(key: &[u8]) -> Result<()> {
    if key.len() != KEY_LENGTH {
        return Err(Error::Crypto(format!(
            "Invalid key length: expected {}, got {}",
            KEY_LENGTH,
            key.len()
        )));
    }
    Ok(())
}

/// Encrypt plaintext under the given suite with a fresh random nonce.
///
/// Returns the nonce and the ciphertext (which includes the tag). The
/// associated data is authenticated but not encrypted; decryption with
/// different associated data fails.
pub fn encrypt(
    suite: CipherSuite,
    key: &[u8],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<([u8; NONCE_LENGTH], Vec<u8>)> {
    check_key(key)?;

    let mut nonce_bytes = [0u8; NONCE_LENGTH];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);
    let payload = Payload {
        msg: plaintext,
        aad,
    };

    let ciphertext = match suite {
        CipherSuite::Aes256Gcm => {
            let cipher = Aes256Gcm::new_from_slice(key)
                .map_err(|e| Error::Crypto(format!("Invalid key: {}", e)))?;
            cipher.encrypt(nonce, payload)
        }
        CipherSuite::ChaCha20Poly1305 => {
            let cipher = ChaCha20Poly1305::new_from_slice(key)
                .map_err(|e| Error::Crypto(format!("Invalid key: {}", e)))?;
            cipher.encrypt(nonce, payload)
        }
    }
    .map_err(|_| Error::Crypto("Encryption failed".to_string()))?;

    Ok((nonce_bytes, ciphertext))
}

/// Decrypt ciphertext produced by [`encrypt`].
///
/// Verifies the authentication tag (bound to `aad`) before returning
/// any plaintext; a mismatch yields `AuthenticationFailure` and no
/// partial output.
pub fn decrypt(
    suite: CipherSuite,
    key: &[u8],
    nonce: &[u8],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    check_key(key)?;

    if nonce.len() != NONCE_LENGTH {
        return Err(Error::Crypto(format!(
            "Invalid nonce length: expected {}, got {}",
            NONCE_LENGTH,
            nonce.len()
        )));
    }
    if ciphertext.len() < TAG_LENGTH {
        return Err(Error::Crypto("Ciphertext too short".to_string()));
    }

    let nonce = Nonce::from_slice(nonce);
    let payload = Payload {
        msg: ciphertext,
        aad,
    };

    match suite {
        CipherSuite::Aes256Gcm => {
            let cipher = Aes256Gcm::new_from_slice(key)
                .map_err(|e| Error::Crypto(format!("Invalid key: {}", e)))?;
            cipher.decrypt(nonce, payload)
        }
        CipherSuite::ChaCha20Poly1305 => {
            let cipher = ChaCha20Poly1305::new_from_slice(key)
                .map_err(|e| Error::Crypto(format!("Invalid key: {}", e)))?;
            cipher.decrypt(nonce, payload)
        }
    }
    .map_err(|_| Error::AuthenticationFailure("AEAD tag mismatch".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    const KEY: [u8; KEY_LENGTH] = [42u8; KEY_LENGTH];

    #[test]
    fn test_encrypt_decrypt_roundtrip_both_suites() {
        for suite in CipherSuite::all() {
            let plaintext = "Grüße, 世界 — encrypted journal ✒️".as_bytes();
            let (nonce, ciphertext) = encrypt(suite, &KEY, plaintext, b"aad").unwrap();
            let decrypted = decrypt(suite, &KEY, &nonce, &ciphertext, b"aad").unwrap();
            assert_eq!(decrypted, plaintext);
        }
    }

    #[test]
    fn test_empty_plaintext() {
        for suite in CipherSuite::all() {
            let (nonce, ciphertext) = encrypt(suite, &KEY, b"", b"").unwrap();
            assert_eq!(ciphertext.len(), TAG_LENGTH);
            assert_eq!(decrypt(suite, &KEY, &nonce, &ciphertext, b"").unwrap(), b"");
        }
    }

    #[test]
    fn test_wrong_key_fails() {
        let other_key = [1u8; KEY_LENGTH];
        for suite in CipherSuite::all() {
            let (nonce, ciphertext) = encrypt(suite, &KEY, b"secret", b"").unwrap();
            let result = decrypt(suite, &other_key, &nonce, &ciphertext, b"");
            assert!(matches!(
                result,
                Err(inkvault_common::Error::AuthenticationFailure(_))
            ));
        }
    }

    #[test]
    fn test_wrong_aad_fails() {
        let (nonce, ciphertext) =
            encrypt(CipherSuite::Aes256Gcm, &KEY, b"secret", b"entry-1:title").unwrap();
        let result = decrypt(
            CipherSuite::Aes256Gcm,
            &KEY,
            &nonce,
            &ciphertext,
            b"entry-1:content",
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_wrong_suite_fails() {
        let (nonce, ciphertext) = encrypt(CipherSuite::Aes256Gcm, &KEY, b"secret", b"").unwrap();
        assert!(decrypt(CipherSuite::ChaCha20Poly1305, &KEY, &nonce, &ciphertext, b"").is_err());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let (nonce, mut ciphertext) =
            encrypt(CipherSuite::ChaCha20Poly1305, &KEY, b"important", b"").unwrap();
        ciphertext[3] ^= 0xFF;
        assert!(decrypt(CipherSuite::ChaCha20Poly1305, &KEY, &nonce, &ciphertext, b"").is_err());
    }

    #[test]
    fn test_nonces_pairwise_distinct() {
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            let (nonce, _) = encrypt(CipherSuite::Aes256Gcm, &KEY, b"x", b"").unwrap();
            assert!(seen.insert(nonce), "nonce repeated");
        }
    }

    #[test]
    fn test_invalid_key_length() {
        let short_key = [0u8; 16];
        assert!(encrypt(CipherSuite::Aes256Gcm, &short_key, b"data", b"").is_err());
    }

    #[test]
    fn test_tag_byte_roundtrip() {
        for suite in CipherSuite::all() {
            assert_eq!(CipherSuite::from_tag_byte(suite.tag_byte()), Some(suite));
        }
        assert_eq!(CipherSuite::from_tag_byte(0), None);
    }

    #[test]
    fn test_suite_serde_names() {
        assert_eq!(
            serde_json::to_string(&CipherSuite::Aes256Gcm).unwrap(),
            "\"aes256_gcm\""
        );
        assert_eq!(
            serde_json::to_string(&CipherSuite::ChaCha20Poly1305).unwrap(),
            "\"chacha20_poly1305\""
        );
    }

    proptest! {
        #[test]
        fn prop_roundtrip_arbitrary_bytes(
            plaintext in proptest::collection::vec(any::<u8>(), 0..2048),
            aad in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            for suite in CipherSuite::all() {
                let (nonce, ciphertext) = encrypt(suite, &KEY, &plaintext, &aad).unwrap();
                let decrypted = decrypt(suite, &KEY, &nonce, &ciphertext, &aad).unwrap();
                prop_assert_eq!(&decrypted, &plaintext);
            }
        }
    }
}
