//! Base58 and Base58Check with the Bitcoin alphabet.

use super::hash::checksum;
use super::EncodingError;

const ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Encodes bytes as Base58. Leading zero bytes become leading '1's.
pub fn encode(data: &[u8]) -> String {
    bs58::encode(data)
        .with_alphabet(bs58::Alphabet::BITCOIN)
        .into_string()
}

/// Decodes a Base58 string.
pub fn decode(s: &str) -> Result<Vec<u8>, EncodingError> {
    bs58::decode(s)
        .with_alphabet(bs58::Alphabet::BITCOIN)
        .into_vec()
        .map_err(|e| EncodingError::InvalidBase58(e.to_string()))
}

/// Encodes `data || sha256d(data)[..4]`.
pub fn check_encode(data: &[u8]) -> String {
    let mut payload = Vec::with_capacity(data.len() + 4);
    payload.extend_from_slice(data);
    payload.extend_from_slice(&checksum(data));
    encode(&payload)
}

/// Decodes Base58Check and strips the verified checksum.
pub fn check_decode(s: &str) -> Result<Vec<u8>, EncodingError> {
    let decoded = decode(s)?;
    if decoded.len() < 4 {
        return Err(EncodingError::InvalidBase58(
            "data too short for checksum".to_string(),
        ));
    }
    let (payload, check) = decoded.split_at(decoded.len() - 4);
    if check != checksum(payload) {
        return Err(EncodingError::ChecksumMismatch);
    }
    Ok(payload.to_vec())
}

/// True when `s` is non-empty and uses only the Base58 alphabet.
pub fn is_base58(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| ALPHABET.contains(c))
}
