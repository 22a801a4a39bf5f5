//! Currency plugins.
//!
//! A [`CurrencyPlugin`] knows how to generate, parse and validate keys of one
//! currency and which encryption schemes apply to them. Plugins are looked up
//! by ticker through an explicitly constructed [`PluginRegistry`].
//!
//! Plugins work on [`KeyState`] values and never mutate them: every operation
//! returns a fresh state which [`crate::key::CryptoKey`] commits only on
//! success.

pub mod bitcoin;
pub mod ethereum;
pub mod registry;

use core::fmt;
use core::str::FromStr;

use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::SecretKey;
use serde::{Deserialize, Serialize};

use crate::crypto::passphrase_aes;
use crate::entropy::OsEntropy;
use crate::key::{KeyError, KeyState};

pub use bitcoin::BitcoinPlugin;
pub use ethereum::EthereumPlugin;
pub use registry::PluginRegistry;

/// Encryption applied to a private key before export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EncryptionScheme {
    #[serde(rename = "BIP38")]
    Bip38,
    /// Salted AES-256-CBC, serialized under its historical name.
    #[serde(rename = "CryptoJS")]
    PassphraseAes,
}

impl EncryptionScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncryptionScheme::Bip38 => "BIP38",
            EncryptionScheme::PassphraseAes => "CryptoJS",
        }
    }
}

impl fmt::Display for EncryptionScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EncryptionScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BIP38" => Ok(EncryptionScheme::Bip38),
            "CryptoJS" => Ok(EncryptionScheme::PassphraseAes),
            other => Err(format!("unknown encryption scheme: {}", other)),
        }
    }
}

/// Per-currency capability provider.
pub trait CurrencyPlugin: Send + Sync {
    /// Display name, e.g. "Bitcoin".
    fn name(&self) -> &str;

    /// Ticker symbol, e.g. "BTC".
    fn ticker(&self) -> &str;

    /// Schemes keys of this currency may be encrypted with.
    fn encryption_schemes(&self) -> &[EncryptionScheme];

    /// Address donations for this currency go to, if configured.
    fn donation_address(&self) -> Option<&str>;

    /// Random unencrypted key.
    fn generate_state(&self) -> Result<KeyState, KeyError>;

    /// Parses any encoding this currency recognizes, encrypted or not.
    fn parse_state(&self, input: &str) -> Result<KeyState, KeyError>;

    /// Never fails; malformed input is simply not an address.
    fn is_address(&self, address: &str) -> bool;

    /// True when `address` belongs to the unencrypted key in `state`.
    fn controls_address(&self, state: &KeyState, address: &str) -> bool {
        state.address.as_deref() == Some(address)
    }

    fn supports(&self, scheme: EncryptionScheme) -> bool {
        self.encryption_schemes().contains(&scheme)
    }

    /// Encrypts an unencrypted state. The default handles passphrase AES.
    fn encrypt_state(
        &self,
        state: &KeyState,
        scheme: EncryptionScheme,
        passphrase: &str,
        on_progress: &mut dyn FnMut(f64),
    ) -> Result<KeyState, KeyError> {
        match scheme {
            EncryptionScheme::PassphraseAes => {
                let hex = state.hex.as_deref().ok_or(KeyError::InvalidOperation(
                    "cannot encrypt a key without a private key",
                ))?;
                encrypt_passphrase_aes(self, state, hex, passphrase, on_progress)
            }
            other => Err(KeyError::UnsupportedScheme {
                ticker: self.ticker().to_string(),
                scheme: other,
            }),
        }
    }

    /// Decrypts an encrypted state. The default handles passphrase AES.
    fn decrypt_state(
        &self,
        state: &KeyState,
        passphrase: &str,
        on_progress: &mut dyn FnMut(f64),
    ) -> Result<KeyState, KeyError> {
        match state.encryption {
            Some(EncryptionScheme::PassphraseAes) => {
                decrypt_passphrase_aes(self, state, passphrase, on_progress)
            }
            Some(other) => Err(KeyError::UnsupportedScheme {
                ticker: self.ticker().to_string(),
                scheme: other,
            }),
            None => Err(KeyError::NotEncrypted),
        }
    }
}

impl fmt::Debug for dyn CurrencyPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CurrencyPlugin")
            .field("ticker", &self.ticker())
            .finish()
    }
}

/// Passphrase AES over `plaintext`, a parseable encoding of the key. The
/// address is carried over since it cannot be derived from the envelope.
pub(crate) fn encrypt_passphrase_aes<P: CurrencyPlugin + ?Sized>(
    plugin: &P,
    state: &KeyState,
    plaintext: &str,
    passphrase: &str,
    on_progress: &mut dyn FnMut(f64),
) -> Result<KeyState, KeyError> {
    on_progress(0.0);
    let envelope = passphrase_aes::encrypt(plaintext, passphrase, &mut OsEntropy::new())?;
    let mut next = plugin.parse_state(&envelope)?;
    next.address = state.address.clone();
    on_progress(1.0);
    Ok(next)
}

pub(crate) fn decrypt_passphrase_aes<P: CurrencyPlugin + ?Sized>(
    plugin: &P,
    state: &KeyState,
    passphrase: &str,
    on_progress: &mut dyn FnMut(f64),
) -> Result<KeyState, KeyError> {
    let envelope = state
        .wif
        .as_deref()
        .ok_or(KeyError::InvalidOperation("encrypted key has no ciphertext"))?;
    on_progress(0.0);
    let plaintext = passphrase_aes::decrypt(envelope, passphrase)?;
    // padding can verify by chance under a wrong passphrase
    let next = plugin
        .parse_state(plaintext.trim())
        .map_err(|_| KeyError::IncorrectPassphrase)?;
    if next.encryption.is_some() {
        return Err(KeyError::IncorrectPassphrase);
    }
    on_progress(1.0);
    Ok(next)
}

/// secp256k1 secret from exactly 32 bytes.
pub(crate) fn secret_key(ticker: &str, secret: &[u8]) -> Result<SecretKey, KeyError> {
    if secret.len() != 32 {
        return Err(KeyError::Parse { ticker: ticker.to_string() });
    }
    SecretKey::from_slice(secret).map_err(|_| KeyError::Parse { ticker: ticker.to_string() })
}

/// SEC1 public key bytes.
pub(crate) fn public_key_bytes(secret: &SecretKey, compressed: bool) -> Vec<u8> {
    secret
        .public_key()
        .to_encoded_point(compressed)
        .as_bytes()
        .to_vec()
}
