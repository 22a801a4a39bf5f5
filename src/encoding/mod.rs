//! Byte encodings and digests shared by the currency plugins, the encryption
//! schemes and threshold sharing.

pub mod base58;
pub mod hash;

/// Errors decoding text into bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    #[error("invalid base58: {0}")]
    InvalidBase58(String),

    #[error("base58 checksum mismatch")]
    ChecksumMismatch,

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("invalid base64: {0}")]
    InvalidBase64(String),
}

impl From<hex::FromHexError> for EncodingError {
    fn from(e: hex::FromHexError) -> Self {
        EncodingError::InvalidHex(e.to_string())
    }
}

impl From<base64::DecodeError> for EncodingError {
    fn from(e: base64::DecodeError) -> Self {
        EncodingError::InvalidBase64(e.to_string())
    }
}

/// True when `s` is non-empty, of even length and entirely hex digits.
pub fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.len() % 2 == 0 && s.bytes().all(|b| b.is_ascii_hexdigit())
}
