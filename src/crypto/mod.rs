//! Private-key encryption schemes.
//!
//! - `bip38`: BIP38 without EC multiplication, for the Bitcoin family.
//! - `passphrase_aes`: OpenSSL-compatible salted AES-256-CBC, readable by
//!   CryptoJS and `openssl enc -aes-256-cbc -md md5`.
//!
//! Both derive their cipher keys from the passphrase and wipe the derived
//! material on drop.

pub mod bip38;
pub mod passphrase_aes;

use crate::encoding::EncodingError;
use crate::entropy::EntropyError;

/// Errors from encrypting or decrypting a key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    /// The integrity check of the scheme failed.
    #[error("Incorrect passphrase")]
    IncorrectPassphrase,

    /// The ciphertext does not have the scheme's structure.
    #[error("malformed ciphertext: {0}")]
    Malformed(String),

    /// Key derivation rejected its parameters.
    #[error("key derivation failed: {0}")]
    Kdf(String),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Entropy(#[from] EntropyError),
}
