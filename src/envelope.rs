//! The transport envelope of a license key.
//!
//! A license key is `base64(json)` where the JSON object carries two
//! base64 encoded byte strings:
//!
//! ```text
//! {"data": "<base64 license json>", "signature": "<base64 signature>"}
//! ```
//!
//! Both levels use the standard, padded base64 alphabet.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_derive::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnvelopeError {
    #[error("invalid license format")]
    InvalidEncoding,
    #[error("invalid license format: malformed envelope")]
    InvalidStructure,
}

/// The signed bytes and their signature, before transport encoding.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct SignedEnvelope {
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub signature: Vec<u8>,
}

pub fn encode(envelope: &SignedEnvelope) -> String {
    let json = serde_json::to_vec(envelope)
        .expect("an envelope of two base64 strings always serializes");
    STANDARD.encode(json)
}

/// Unpacks a license key. `data` is returned as opaque bytes.
pub fn decode(license_key: &str) -> Result<SignedEnvelope, EnvelopeError> {
    let json = STANDARD
        .decode(license_key.trim())
        .map_err(|_| EnvelopeError::InvalidEncoding)?;

    serde_json::from_slice(&json).map_err(|_| EnvelopeError::InvalidStructure)
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
