//! Serde adapter for base64-encoded binary fields.
//!
//! Salts, nonces, and ciphertexts are stored in JSON files as unpadded
//! standard base64. Use with `#[serde(with = "inkvault_common::b64")]`.

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    STANDARD_NO_PAD.encode(bytes).serialize(serializer)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let encoded = String::deserialize(deserializer)?;
    STANDARD_NO_PAD
        .decode(encoded.as_bytes())
        .map_err(serde::de::Error::custom)
}
