use core::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::currency::EncryptionScheme;

/// Plain data behind a [`super::CryptoKey`].
///
/// For an unencrypted key `hex` and `wif` encode the same private key and
/// `address` is derived from it. For an encrypted key both carry the
/// ciphertext and `address` is whatever was recorded before encryption. A
/// public-only state has just an address.
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct KeyState {
    pub hex: Option<String>,
    pub wif: Option<String>,
    pub address: Option<String>,
    #[zeroize(skip)]
    pub encryption: Option<EncryptionScheme>,
}

impl KeyState {
    pub fn unencrypted(hex: String, wif: String, address: String) -> Self {
        KeyState {
            hex: Some(hex),
            wif: Some(wif),
            address: Some(address),
            encryption: None,
        }
    }

    pub fn encrypted(hex: String, wif: String, scheme: EncryptionScheme) -> Self {
        KeyState {
            hex: Some(hex),
            wif: Some(wif),
            address: None,
            encryption: Some(scheme),
        }
    }

    pub fn public(address: String) -> Self {
        KeyState {
            hex: None,
            wif: None,
            address: Some(address),
            encryption: None,
        }
    }

    pub fn has_private_key(&self) -> bool {
        self.hex.is_some() || self.wif.is_some()
    }
}

impl fmt::Debug for KeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyState")
            .field("private", &self.has_private_key().then_some("***SENSITIVE***"))
            .field("address", &self.address)
            .field("encryption", &self.encryption)
            .finish()
    }
}
