//! Configuration for the key and piece core.
//!
//! Populated by the host application and passed to the registry, codec,
//! orchestrator and pipeline at construction. Nothing here is global.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::currency::EncryptionScheme;

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Number of keys encrypted or decrypted concurrently.
    pub encryption_workers: usize,

    /// Relative cost of each unit of work, for progress reporting.
    pub weights: WeightTable,

    /// Version string written into every produced piece.
    pub piece_version: String,

    /// Optional donation address per ticker. Validated by the registry.
    pub donation_addresses: BTreeMap<String, String>,

    /// Key derivation parameters for BIP38.
    pub bip38: Bip38Params,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            encryption_workers: 1,
            weights: WeightTable::default(),
            piece_version: env!("CARGO_PKG_VERSION").to_string(),
            donation_addresses: BTreeMap::new(),
            bip38: Bip38Params::default(),
        }
    }
}

impl CoreConfig {
    /// Parses a configuration from JSON; omitted fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// scrypt parameters used by BIP38.
///
/// The standard fixes N = 16384, r = 8, p = 8. Keys encrypted with anything
/// else are not readable by other BIP38 implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bip38Params {
    pub log_n: u8,
    pub r: u32,
    pub p: u32,
}

impl Default for Bip38Params {
    fn default() -> Self {
        Self { log_n: 14, r: 8, p: 8 }
    }
}

/// Empirical relative costs of the batch operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightTable {
    pub create_key: u64,
    pub bip38_encrypt: u64,
    pub bip38_decrypt: u64,
    pub passphrase_aes_encrypt: u64,
    pub passphrase_aes_decrypt: u64,
    /// Cost of rendering one QR code.
    pub render_unit: u64,
}

impl Default for WeightTable {
    fn default() -> Self {
        Self {
            create_key: 63,
            bip38_encrypt: 4187,
            bip38_decrypt: 4581,
            passphrase_aes_encrypt: 10,
            passphrase_aes_decrypt: 100,
            render_unit: 15,
        }
    }
}

impl WeightTable {
    pub fn encrypt(&self, scheme: EncryptionScheme) -> u64 {
        match scheme {
            EncryptionScheme::Bip38 => self.bip38_encrypt,
            EncryptionScheme::PassphraseAes => self.passphrase_aes_encrypt,
        }
    }

    pub fn decrypt(&self, scheme: EncryptionScheme) -> u64 {
        match scheme {
            EncryptionScheme::Bip38 => self.bip38_decrypt,
            EncryptionScheme::PassphraseAes => self.passphrase_aes_decrypt,
        }
    }

    /// Weight of creating `num_keys` keys.
    pub fn create_keys(&self, num_keys: usize) -> u64 {
        self.create_key * num_keys as u64
    }

    /// Weight of encrypting with `schemes`, plus the decryption pass when
    /// verifying.
    pub fn encrypt_keys(&self, schemes: &[EncryptionScheme], verify: bool) -> u64 {
        schemes
            .iter()
            .map(|&scheme| {
                let decrypt = if verify { self.decrypt(scheme) } else { 0 };
                self.encrypt(scheme) + decrypt
            })
            .sum()
    }

    /// Weight of decrypting keys encrypted with `schemes`.
    pub fn decrypt_keys(&self, schemes: &[EncryptionScheme]) -> u64 {
        schemes.iter().map(|&scheme| self.decrypt(scheme)).sum()
    }

    /// Default rendering weight: two QR codes (address and private key) per
    /// key per piece.
    pub fn render(&self, num_keys: usize, num_pieces: usize) -> u64 {
        (num_keys * num_pieces * 2) as u64 * self.render_unit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoreConfig::default();
        assert_eq!(config.encryption_workers, 1);
        assert_eq!(config.piece_version, "0.1.1");
        assert_eq!(config.bip38, Bip38Params { log_n: 14, r: 8, p: 8 });
        assert!(config.donation_addresses.is_empty());
    }

    #[test]
    fn test_weights() {
        let weights = WeightTable::default();
        let schemes = [EncryptionScheme::Bip38, EncryptionScheme::PassphraseAes];
        assert_eq!(weights.encrypt_keys(&schemes, false), 4187 + 10);
        assert_eq!(weights.encrypt_keys(&schemes, true), 4187 + 10 + 4581 + 100);
        assert_eq!(weights.decrypt_keys(&schemes), 4581 + 100);
        assert_eq!(weights.create_keys(3), 189);
        assert_eq!(weights.render(2, 3), 180);
    }

    #[test]
    fn test_from_json_partial() {
        let config = CoreConfig::from_json(
            r#"{"encryption_workers": 4, "donation_addresses": {"BTC": "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH"}}"#,
        )
        .unwrap();
        assert_eq!(config.encryption_workers, 4);
        assert_eq!(config.weights, WeightTable::default());
        assert_eq!(config.donation_addresses.len(), 1);
    }
}
