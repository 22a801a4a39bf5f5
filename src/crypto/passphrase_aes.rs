//! Salted AES-256-CBC in the OpenSSL / CryptoJS envelope.
//!
//! # Format
//! `base64("Salted__" || salt[8] || AES-256-CBC-PKCS7(plaintext))`, with key
//! and IV from `EVP_BytesToKey(MD5, passphrase, salt, 1 iteration)`.
//!
//! There is no MAC. A wrong passphrase is detected by bad padding or, when
//! padding happens to verify, by the plaintext failing to parse as a key one
//! layer up.

use aes::Aes256;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use md5::{Digest, Md5};
use zeroize::Zeroizing;

use super::CryptoError;
use crate::encoding::EncodingError;
use crate::entropy::EntropySource;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

const MAGIC: &[u8; 8] = b"Salted__";
pub const SALT_LEN: usize = 8;
const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;

/// Encrypts `plaintext` under `passphrase` with a fresh random salt.
pub fn encrypt<R: EntropySource + ?Sized>(
    plaintext: &str,
    passphrase: &str,
    rng: &mut R,
) -> Result<String, CryptoError> {
    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt)?;
    encrypt_with_salt(plaintext.as_bytes(), passphrase.as_bytes(), &salt)
}

/// Encrypts with an explicit salt.
pub fn encrypt_with_salt(
    plaintext: &[u8],
    passphrase: &[u8],
    salt: &[u8; SALT_LEN],
) -> Result<String, CryptoError> {
    let derived = evp_bytes_to_key(passphrase, salt);
    let (key, iv) = derived.split_at(KEY_LEN);
    let ciphertext = Aes256CbcEnc::new_from_slices(key, iv)
        .map_err(|e| CryptoError::Kdf(e.to_string()))?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut envelope = Vec::with_capacity(MAGIC.len() + SALT_LEN + ciphertext.len());
    envelope.extend_from_slice(MAGIC);
    envelope.extend_from_slice(salt);
    envelope.extend_from_slice(&ciphertext);
    Ok(STANDARD.encode(envelope))
}

/// Decrypts an envelope produced by [`encrypt`].
pub fn decrypt(encoded: &str, passphrase: &str) -> Result<Zeroizing<String>, CryptoError> {
    let envelope = STANDARD.decode(encoded).map_err(EncodingError::from)?;
    if envelope.len() <= MAGIC.len() + SALT_LEN || &envelope[..MAGIC.len()] != MAGIC {
        return Err(CryptoError::Malformed("missing salted envelope header".into()));
    }
    let mut salt = [0u8; SALT_LEN];
    salt.copy_from_slice(&envelope[MAGIC.len()..MAGIC.len() + SALT_LEN]);
    let ciphertext = &envelope[MAGIC.len() + SALT_LEN..];

    let derived = evp_bytes_to_key(passphrase.as_bytes(), &salt);
    let (key, iv) = derived.split_at(KEY_LEN);
    let plaintext = Zeroizing::new(
        Aes256CbcDec::new_from_slices(key, iv)
            .map_err(|e| CryptoError::Kdf(e.to_string()))?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| CryptoError::IncorrectPassphrase)?,
    );
    let text = std::str::from_utf8(&plaintext).map_err(|_| CryptoError::IncorrectPassphrase)?;
    Ok(Zeroizing::new(text.to_string()))
}

/// True when `s` looks like a CryptoJS envelope holding a private key.
pub fn is_passphrase_aes(s: &str) -> bool {
    s.starts_with("U2")
        && (s.len() == 128 || s.len() == 108)
        && !s.chars().any(char::is_whitespace)
}

/// Hex form of an envelope (the decoded bytes).
pub fn envelope_to_hex(encoded: &str) -> Result<String, CryptoError> {
    let bytes = STANDARD.decode(encoded).map_err(EncodingError::from)?;
    Ok(hex::encode(bytes))
}

/// Base64 envelope from its hex form.
pub fn envelope_from_hex(hex_str: &str) -> Result<String, CryptoError> {
    let bytes = hex::decode(hex_str).map_err(EncodingError::from)?;
    if !bytes.starts_with(MAGIC) {
        return Err(CryptoError::Malformed("missing salted envelope header".into()));
    }
    Ok(STANDARD.encode(bytes))
}

fn evp_bytes_to_key(passphrase: &[u8], salt: &[u8; SALT_LEN]) -> Zeroizing<[u8; KEY_LEN + IV_LEN]> {
    let mut out = Zeroizing::new([0u8; KEY_LEN + IV_LEN]);
    let mut filled = 0;
    let mut previous: Option<Zeroizing<[u8; 16]>> = None;
    while filled < out.len() {
        let mut hasher = Md5::new();
        if let Some(prev) = &previous {
            hasher.update(&prev[..]);
        }
        hasher.update(passphrase);
        hasher.update(salt);
        let block: Zeroizing<[u8; 16]> = Zeroizing::new(hasher.finalize().into());
        let take = (out.len() - filled).min(block.len());
        out[filled..filled + take].copy_from_slice(&block[..take]);
        filled += take;
        previous = Some(block);
    }
    out
}
