//! Hex and base64 helpers.
//!
//! Policies and proofs carry keys, hashes and signatures as lowercase hex;
//! checkpoints carry the root hash as standard padded base64.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

/// Encoding errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("Hex string contains invalid characters")]
    InvalidHexCharacter,

    #[error("Hex string must have an even length")]
    OddHexLength,

    #[error("expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Decode a hex string.
pub fn decode_hex(s: &str) -> Result<Vec<u8>, EncodingError> {
    hex::decode(s).map_err(|e| match e {
        hex::FromHexError::OddLength => EncodingError::OddHexLength,
        _ => EncodingError::InvalidHexCharacter,
    })
}

/// Encode bytes as lowercase hex.
pub fn encode_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Encode bytes as standard padded base64.
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}
