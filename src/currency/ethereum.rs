//! Ethereum-family currencies. The hex private key doubles as the WIF and
//! addresses carry an EIP-55 mixed-case checksum.

use k256::SecretKey;
use rand_core::OsRng;
use zeroize::Zeroizing;

use super::{public_key_bytes, secret_key, CurrencyPlugin, EncryptionScheme};
use crate::crypto::passphrase_aes;
use crate::encoding::{hash, is_hex};
use crate::key::{KeyError, KeyState};

const SCHEMES: [EncryptionScheme; 1] = [EncryptionScheme::PassphraseAes];

pub struct EthereumPlugin {
    name: &'static str,
    ticker: &'static str,
    donation_address: Option<String>,
}

impl EthereumPlugin {
    pub fn ethereum() -> Self {
        EthereumPlugin {
            name: "Ethereum",
            ticker: "ETH",
            donation_address: None,
        }
    }

    pub fn ethereum_classic() -> Self {
        EthereumPlugin {
            name: "Ethereum Classic",
            ticker: "ETC",
            donation_address: None,
        }
    }

    pub fn with_donation_address(mut self, address: Option<String>) -> Self {
        self.donation_address = address;
        self
    }

    fn parse_error(&self) -> KeyError {
        KeyError::Parse { ticker: self.ticker.to_string() }
    }

    fn state(&self, secret: &[u8]) -> Result<KeyState, KeyError> {
        let key = secret_key(self.ticker, secret)?;
        let hex_key = hex::encode(secret);
        Ok(KeyState::unencrypted(hex_key.clone(), hex_key, address(&key)))
    }
}

/// `0x` + EIP-55 checksummed last 20 bytes of keccak256(uncompressed point).
fn address(key: &SecretKey) -> String {
    let public = public_key_bytes(key, false);
    let digest = hash::keccak256(&public[1..]);
    to_checksum_address(&hex::encode(&digest[12..]))
}

/// EIP-55 casing of a 40-character lowercase hex address body.
pub fn to_checksum_address(lower: &str) -> String {
    let digest = hash::keccak256(lower.as_bytes());
    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = (digest[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0F;
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

impl CurrencyPlugin for EthereumPlugin {
    fn name(&self) -> &str {
        self.name
    }

    fn ticker(&self) -> &str {
        self.ticker
    }

    fn encryption_schemes(&self) -> &[EncryptionScheme] {
        &SCHEMES
    }

    fn donation_address(&self) -> Option<&str> {
        self.donation_address.as_deref()
    }

    fn generate_state(&self) -> Result<KeyState, KeyError> {
        let key = SecretKey::random(&mut OsRng);
        let secret = Zeroizing::new(key.to_bytes().to_vec());
        self.state(&secret)
    }

    fn parse_state(&self, input: &str) -> Result<KeyState, KeyError> {
        let unprefixed = input
            .strip_prefix("0x")
            .or_else(|| input.strip_prefix("0X"))
            .unwrap_or(input);
        if unprefixed.len() == 64 && is_hex(unprefixed) {
            let secret = Zeroizing::new(hex::decode(unprefixed).map_err(|_| self.parse_error())?);
            return self.state(&secret);
        }
        if passphrase_aes::is_passphrase_aes(input) {
            let hex_form = passphrase_aes::envelope_to_hex(input).map_err(|_| self.parse_error())?;
            return Ok(KeyState::encrypted(
                hex_form,
                input.to_string(),
                EncryptionScheme::PassphraseAes,
            ));
        }
        if input.len() > 100 && is_hex(input) {
            let lower = input.to_ascii_lowercase();
            if let Ok(envelope) = passphrase_aes::envelope_from_hex(&lower) {
                if passphrase_aes::is_passphrase_aes(&envelope) {
                    return Ok(KeyState::encrypted(lower, envelope, EncryptionScheme::PassphraseAes));
                }
            }
        }
        Err(self.parse_error())
    }

    fn is_address(&self, address: &str) -> bool {
        let body = match address.strip_prefix("0x") {
            Some(body) if body.len() == 40 && body.bytes().all(|b| b.is_ascii_hexdigit()) => body,
            _ => return false,
        };
        let has_lower = body.bytes().any(|b| b.is_ascii_lowercase());
        let has_upper = body.bytes().any(|b| b.is_ascii_uppercase());
        if !(has_lower && has_upper) {
            return true;
        }
        to_checksum_address(&body.to_ascii_lowercase()) == address
    }
}
