//! Cryptocurrency keys.
//!
//! A [`CryptoKey`] pairs a currency plugin with a [`KeyState`]. Operations
//! that change the key (encrypt, decrypt, address assignment) compute the new
//! state first and swap it in only on success, so a failed operation leaves
//! the key exactly as it was.

mod crypto_key;
pub mod import;
mod state;

use crate::crypto::CryptoError;
use crate::currency::EncryptionScheme;
use crate::entropy::EntropyError;
use crate::threshold::ShareError;

pub use crypto_key::CryptoKey;
pub use import::{get_key, parse_key};
pub use state::KeyState;

/// Errors for key construction and manipulation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("Unrecognized {ticker} private key")]
    Parse { ticker: String },

    #[error("invalid {ticker} address: {address}")]
    InvalidAddress { ticker: String, address: String },

    #[error("address does not match the private key")]
    AddressMismatch,

    #[error("{0}")]
    InvalidOperation(&'static str),

    #[error("{ticker} does not support {scheme} encryption")]
    UnsupportedScheme { ticker: String, scheme: EncryptionScheme },

    #[error("key is already encrypted")]
    AlreadyEncrypted,

    #[error("key is not encrypted")]
    NotEncrypted,

    #[error("passphrase must not be empty")]
    EmptyPassphrase,

    #[error("Incorrect passphrase")]
    IncorrectPassphrase,

    #[error("unknown currency: {0}")]
    UnknownCurrency(String),

    #[error("currency registered twice: {0}")]
    DuplicateCurrency(String),

    #[error(transparent)]
    Crypto(CryptoError),

    #[error(transparent)]
    Share(#[from] ShareError),

    #[error(transparent)]
    Entropy(#[from] EntropyError),
}

impl From<CryptoError> for KeyError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::IncorrectPassphrase => KeyError::IncorrectPassphrase,
            CryptoError::Entropy(e) => KeyError::Entropy(e),
            other => KeyError::Crypto(other),
        }
    }
}
