//! BIP38 encryption without EC multiplication.
//!
//! # Scheme
//! 1. **Salt**: `addresshash = sha256d(address)[0..4]`
//! 2. **KDF**: `scrypt(passphrase, addresshash, N=16384, r=8, p=8, 64)` split
//!    into `derivedhalf1 || derivedhalf2`
//! 3. **Encryption**: `AES-256-ECB(key[0..16] ^ half1[0..16], half2)` and the
//!    same for the second 16 bytes
//! 4. **Format**: Base58Check of
//!    `0x01 0x42 || flag || addresshash || encryptedhalf1 || encryptedhalf2`
//!
//! Decryption has no MAC; the address hash is the integrity check. The caller
//! re-derives the address from the decrypted key and compares it with
//! [`Bip38Decrypted::address_hash`].

use aes::cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes256;
use zeroize::Zeroizing;

use super::CryptoError;
use crate::config::Bip38Params;
use crate::encoding::{base58, hash};

const PREFIX: [u8; 2] = [0x01, 0x42];
const FLAG_COMPRESSED: u8 = 0xE0;
const FLAG_UNCOMPRESSED: u8 = 0xC0;
const PAYLOAD_LEN: usize = 39;
/// Length of the Base58Check string.
pub const ENCODED_LEN: usize = 58;

/// Output of a successful BIP38 decryption.
pub struct Bip38Decrypted {
    pub secret: Zeroizing<[u8; 32]>,
    pub address_hash: [u8; 4],
    pub compressed: bool,
}

/// Encrypts a 32-byte private key whose P2PKH address is `address`.
/// `compressed` records which public key form the address was built from.
pub fn encrypt(
    secret: &[u8; 32],
    compressed: bool,
    address: &str,
    passphrase: &str,
    params: &Bip38Params,
) -> Result<String, CryptoError> {
    let address_hash = address_hash(address);
    let derived = derive(passphrase, &address_hash, params)?;
    let (half1, half2) = derived.split_at(32);

    let cipher = Aes256::new(GenericArray::from_slice(half2));
    let mut payload = Vec::with_capacity(PAYLOAD_LEN);
    payload.extend_from_slice(&PREFIX);
    payload.push(if compressed { FLAG_COMPRESSED } else { FLAG_UNCOMPRESSED });
    payload.extend_from_slice(&address_hash);
    for offset in [0, 16] {
        let mut block = Zeroizing::new([0u8; 16]);
        for i in 0..16 {
            block[i] = secret[offset + i] ^ half1[offset + i];
        }
        let mut block = GenericArray::clone_from_slice(&block[..]);
        cipher.encrypt_block(&mut block);
        payload.extend_from_slice(&block);
    }

    Ok(base58::check_encode(&payload))
}

/// Decrypts a BIP38 string. Never fails on a wrong passphrase by itself; see
/// the module docs.
pub fn decrypt(
    encrypted: &str,
    passphrase: &str,
    params: &Bip38Params,
) -> Result<Bip38Decrypted, CryptoError> {
    let payload = decode(encrypted)?;
    let compressed = payload[2] == FLAG_COMPRESSED;
    let mut address_hash = [0u8; 4];
    address_hash.copy_from_slice(&payload[3..7]);

    let derived = derive(passphrase, &address_hash, params)?;
    let (half1, half2) = derived.split_at(32);

    let cipher = Aes256::new(GenericArray::from_slice(half2));
    let mut secret = Zeroizing::new([0u8; 32]);
    for (chunk, offset) in payload[7..].chunks_exact(16).zip([0, 16]) {
        let mut block = GenericArray::clone_from_slice(chunk);
        cipher.decrypt_block(&mut block);
        for i in 0..16 {
            secret[offset + i] = block[i] ^ half1[offset + i];
        }
    }

    Ok(Bip38Decrypted {
        secret,
        address_hash,
        compressed,
    })
}

/// `sha256d(address)[0..4]`.
pub fn address_hash(address: &str) -> [u8; 4] {
    hash::checksum(address.as_bytes())
}

/// True when `s` is a well-formed non-EC-multiply BIP38 string.
pub fn is_bip38(s: &str) -> bool {
    s.len() == ENCODED_LEN && s.starts_with("6P") && decode(s).is_ok()
}

fn decode(encrypted: &str) -> Result<Vec<u8>, CryptoError> {
    let payload = base58::check_decode(encrypted)?;
    if payload.len() != PAYLOAD_LEN {
        return Err(CryptoError::Malformed(format!(
            "BIP38 payload is {} bytes, expected {}",
            payload.len(),
            PAYLOAD_LEN
        )));
    }
    if payload[..2] != PREFIX {
        return Err(CryptoError::Malformed("not a non-EC-multiplied BIP38 key".into()));
    }
    if payload[2] != FLAG_COMPRESSED && payload[2] != FLAG_UNCOMPRESSED {
        return Err(CryptoError::Malformed(format!("unsupported BIP38 flag {:#04x}", payload[2])));
    }
    Ok(payload)
}

fn derive(
    passphrase: &str,
    salt: &[u8; 4],
    params: &Bip38Params,
) -> Result<Zeroizing<[u8; 64]>, CryptoError> {
    let scrypt_params = scrypt::Params::new(params.log_n, params.r, params.p, 64)
        .map_err(|e| CryptoError::Kdf(e.to_string()))?;
    let mut derived = Zeroizing::new([0u8; 64]);
    scrypt::scrypt(passphrase.as_bytes(), salt, &scrypt_params, &mut *derived)
        .map_err(|e| CryptoError::Kdf(e.to_string()))?;
    Ok(derived)
}
