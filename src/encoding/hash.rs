//! Hash functions used for addresses, checksums and key derivation.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use sha3::Keccak256;

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// SHA-256(SHA-256(data)), the Bitcoin checksum hash.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// RIPEMD-160(SHA-256(data)), used for P2PKH addresses.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(sha256(data)).into()
}

/// Legacy Keccak-256 (not NIST SHA3-256) as used by Ethereum.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// First four bytes of `sha256d(data)`.
pub fn checksum(data: &[u8]) -> [u8; 4] {
    let digest = sha256d(data);
    [digest[0], digest[1], digest[2], digest[3]]
}
