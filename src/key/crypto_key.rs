use core::fmt;
use std::sync::Arc;

use super::{KeyError, KeyState};
use crate::currency::{CurrencyPlugin, EncryptionScheme};
use crate::entropy::EntropySource;
use crate::threshold;

/// A key of one currency: private key, address, or both.
#[derive(Clone)]
pub struct CryptoKey {
    plugin: Arc<dyn CurrencyPlugin>,
    state: KeyState,
}

impl CryptoKey {
    /// Fresh random unencrypted key.
    pub fn generate(plugin: &Arc<dyn CurrencyPlugin>) -> Result<Self, KeyError> {
        let state = plugin.generate_state()?;
        Ok(Self::from_state(plugin, state))
    }

    /// Parses any private key encoding the currency recognizes.
    pub fn parse(plugin: &Arc<dyn CurrencyPlugin>, input: &str) -> Result<Self, KeyError> {
        let state = plugin.parse_state(input)?;
        Ok(Self::from_state(plugin, state))
    }

    /// Public-only key.
    pub fn from_address(plugin: &Arc<dyn CurrencyPlugin>, address: &str) -> Result<Self, KeyError> {
        if !plugin.is_address(address) {
            return Err(KeyError::InvalidAddress {
                ticker: plugin.ticker().to_string(),
                address: address.to_string(),
            });
        }
        Ok(Self::from_state(plugin, KeyState::public(address.to_string())))
    }

    pub(crate) fn from_state(plugin: &Arc<dyn CurrencyPlugin>, state: KeyState) -> Self {
        CryptoKey {
            plugin: Arc::clone(plugin),
            state,
        }
    }

    pub fn plugin(&self) -> &Arc<dyn CurrencyPlugin> {
        &self.plugin
    }

    pub fn ticker(&self) -> &str {
        self.plugin.ticker()
    }

    pub fn state(&self) -> &KeyState {
        &self.state
    }

    pub fn hex(&self) -> Option<&str> {
        self.state.hex.as_deref()
    }

    pub fn wif(&self) -> Option<&str> {
        self.state.wif.as_deref()
    }

    pub fn address(&self) -> Option<&str> {
        self.state.address.as_deref()
    }

    pub fn encryption(&self) -> Option<EncryptionScheme> {
        self.state.encryption
    }

    pub fn is_encrypted(&self) -> bool {
        self.state.encryption.is_some()
    }

    pub fn has_private_key(&self) -> bool {
        self.state.has_private_key()
    }

    /// Records the key's address.
    ///
    /// Unencrypted keys already know their address, so only an address the
    /// key controls is accepted and the held one is kept. Encrypted and public-only keys take it as given.
    pub fn set_address(&mut self, address: &str) -> Result<(), KeyError> {
        if !self.plugin.is_address(address) {
            return Err(KeyError::InvalidAddress {
                ticker: self.ticker().to_string(),
                address: address.to_string(),
            });
        }
        if self.has_private_key() && !self.is_encrypted() {
            if self.plugin.controls_address(&self.state, address) {
                return Ok(());
            }
            return Err(KeyError::AddressMismatch);
        }
        self.state.address = Some(address.to_string());
        Ok(())
    }

    /// Encrypts in place. `on_progress` receives fractions in `[0, 1]`.
    pub fn encrypt(
        &mut self,
        scheme: EncryptionScheme,
        passphrase: &str,
        on_progress: &mut dyn FnMut(f64),
    ) -> Result<(), KeyError> {
        if passphrase.is_empty() {
            return Err(KeyError::EmptyPassphrase);
        }
        if self.is_encrypted() {
            return Err(KeyError::AlreadyEncrypted);
        }
        if !self.has_private_key() {
            return Err(KeyError::InvalidOperation("cannot encrypt a key without a private key"));
        }
        if !self.plugin.supports(scheme) {
            return Err(KeyError::UnsupportedScheme {
                ticker: self.ticker().to_string(),
                scheme,
            });
        }
        let next = self
            .plugin
            .encrypt_state(&self.state, scheme, passphrase, on_progress)
            .map_err(|e| {
                log::warn!("{} key encryption failed, key unchanged: {}", self.ticker(), e);
                e
            })?;
        self.state = next;
        Ok(())
    }

    /// Decrypts in place. A wrong passphrase yields `IncorrectPassphrase` and
    /// leaves the key encrypted.
    pub fn decrypt(
        &mut self,
        passphrase: &str,
        on_progress: &mut dyn FnMut(f64),
    ) -> Result<(), KeyError> {
        if passphrase.is_empty() {
            return Err(KeyError::EmptyPassphrase);
        }
        if !self.is_encrypted() {
            return Err(KeyError::NotEncrypted);
        }
        let next = self
            .plugin
            .decrypt_state(&self.state, passphrase, on_progress)?;
        if let Some(recorded) = self.address() {
            if !self.plugin.controls_address(&next, recorded) {
                log::warn!("{} key decrypted to a different address than recorded", self.ticker());
                return Err(KeyError::IncorrectPassphrase);
            }
        }
        self.state = next;
        Ok(())
    }

    /// Splits the private key (encrypted or not) into share strings.
    pub fn split<R: EntropySource + ?Sized>(
        &self,
        num_pieces: usize,
        min_pieces: usize,
        rng: &mut R,
    ) -> Result<Vec<String>, KeyError> {
        let hex = self
            .hex()
            .ok_or(KeyError::InvalidOperation("Cannot split piece without private key"))?;
        Ok(threshold::share(hex, num_pieces, min_pieces, rng)?)
    }

    /// Rebuilds a key from share strings produced by [`split`](Self::split).
    pub fn combine<S: AsRef<str>>(
        plugin: &Arc<dyn CurrencyPlugin>,
        shares: &[S],
    ) -> Result<Self, KeyError> {
        let hex = threshold::combine(shares)?;
        Self::parse(plugin, &hex)
    }

    /// Copy without the address. Needs a private key.
    pub fn exclude_public(&self) -> Result<Self, KeyError> {
        if !self.has_private_key() {
            return Err(KeyError::InvalidOperation(
                "cannot exclude the address of a key without a private key",
            ));
        }
        let mut copy = self.clone();
        copy.state.address = None;
        Ok(copy)
    }

    /// Public-only copy. Needs an address.
    pub fn exclude_private(&self) -> Result<Self, KeyError> {
        let address = self.address().ok_or(KeyError::InvalidOperation(
            "cannot exclude the private key of a key without an address",
        ))?;
        Ok(Self::from_state(&self.plugin, KeyState::public(address.to_string())))
    }
}

/// Same currency and key material. Addresses are compared only when both
/// sides have one.
impl PartialEq for CryptoKey {
    fn eq(&self, other: &Self) -> bool {
        let addresses_match = match (self.address(), other.address()) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        };
        self.ticker() == other.ticker()
            && self.hex() == other.hex()
            && self.wif() == other.wif()
            && self.encryption() == other.encryption()
            && addresses_match
    }
}

impl fmt::Debug for CryptoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoKey")
            .field("ticker", &self.ticker())
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Bip38Params;
    use crate::currency::{BitcoinPlugin, EthereumPlugin};
    use crate::entropy::testing::CounterEntropy;

    const KEY_ONE: &str = "0000000000000000000000000000000000000000000000000000000000000001";
    const KEY_ONE_ADDRESS: &str = "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH";
    const KEY_ONE_UNCOMPRESSED: &str = "1EHNa6Q4Jz2uvNExL497mE43ikXhwF6kZm";
    const OTHER_ADDRESS: &str = "164MQi977u9GUteHr4EPH27VkkdxmfCvGW";

    fn btc() -> Arc<dyn CurrencyPlugin> {
        Arc::new(BitcoinPlugin::bitcoin(Bip38Params { log_n: 4, r: 8, p: 1 }))
    }

    fn eth() -> Arc<dyn CurrencyPlugin> {
        Arc::new(EthereumPlugin::ethereum())
    }

    #[test]
    fn test_generate_has_everything() {
        let key = CryptoKey::generate(&btc()).unwrap();
        assert!(key.has_private_key());
        assert!(!key.is_encrypted());
        assert!(key.address().is_some());
        assert_eq!(key.ticker(), "BTC");
    }

    #[test]
    fn test_encrypt_decrypt_each_scheme() {
        for scheme in [EncryptionScheme::Bip38, EncryptionScheme::PassphraseAes] {
            let original = CryptoKey::parse(&btc(), KEY_ONE).unwrap();
            let mut key = original.clone();
            key.encrypt(scheme, "pw", &mut |_| {}).unwrap();
            assert_eq!(key.encryption(), Some(scheme));
            assert_eq!(key.address(), Some(KEY_ONE_ADDRESS));
            assert_ne!(key.hex(), Some(KEY_ONE));

            assert_eq!(key.encrypt(scheme, "pw", &mut |_| {}), Err(KeyError::AlreadyEncrypted));

            let before = key.clone();
            assert_eq!(key.decrypt("nope", &mut |_| {}), Err(KeyError::IncorrectPassphrase));
            assert_eq!(key.state(), before.state());

            key.decrypt("pw", &mut |_| {}).unwrap();
            assert_eq!(key, original);
        }
    }

    #[test]
    fn test_encrypt_preconditions() {
        let mut key = CryptoKey::parse(&eth(), KEY_ONE).unwrap();
        assert_eq!(
            key.encrypt(EncryptionScheme::PassphraseAes, "", &mut |_| {}),
            Err(KeyError::EmptyPassphrase)
        );
        assert!(matches!(
            key.encrypt(EncryptionScheme::Bip38, "pw", &mut |_| {}),
            Err(KeyError::UnsupportedScheme { .. })
        ));
        assert_eq!(key.decrypt("pw", &mut |_| {}), Err(KeyError::NotEncrypted));

        let mut public = key.exclude_private().unwrap();
        assert!(matches!(
            public.encrypt(EncryptionScheme::PassphraseAes, "pw", &mut |_| {}),
            Err(KeyError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_set_address() {
        let mut key = CryptoKey::parse(&btc(), KEY_ONE).unwrap();
        assert!(key.set_address(KEY_ONE_ADDRESS).is_ok());
        assert_eq!(key.set_address(OTHER_ADDRESS), Err(KeyError::AddressMismatch));
        key.set_address(KEY_ONE_UNCOMPRESSED).unwrap();
        assert_eq!(key.address(), Some(KEY_ONE_ADDRESS));
        assert!(matches!(key.set_address("garbage"), Err(KeyError::InvalidAddress { .. })));

        let mut encrypted = key.exclude_public().unwrap();
        encrypted
            .encrypt(EncryptionScheme::PassphraseAes, "pw", &mut |_| {})
            .unwrap();
        assert_eq!(encrypted.address(), None);
        encrypted.set_address(KEY_ONE_ADDRESS).unwrap();
        assert_eq!(encrypted.address(), Some(KEY_ONE_ADDRESS));
    }

    #[test]
    fn test_decrypt_checks_recorded_address() {
        let mut key = CryptoKey::parse(&btc(), KEY_ONE).unwrap();
        key.encrypt(EncryptionScheme::PassphraseAes, "pw", &mut |_| {})
            .unwrap();
        key.state.address = Some(OTHER_ADDRESS.into());
        assert_eq!(key.decrypt("pw", &mut |_| {}), Err(KeyError::IncorrectPassphrase));
        assert!(key.is_encrypted());
    }

    #[test]
    fn test_decrypt_uncompressed_bip38_with_recorded_address() {
        let mut secret = [0u8; 32];
        secret[31] = 1;
        let params = Bip38Params { log_n: 4, r: 8, p: 1 };
        let encrypted =
            crate::crypto::bip38::encrypt(&secret, false, KEY_ONE_UNCOMPRESSED, "pw", &params).unwrap();
        let mut key = CryptoKey::parse(&btc(), &encrypted).unwrap();
        key.set_address(KEY_ONE_UNCOMPRESSED).unwrap();

        assert_eq!(key.decrypt("nope", &mut |_| {}), Err(KeyError::IncorrectPassphrase));
        key.decrypt("pw", &mut |_| {}).unwrap();
        assert_eq!(key.hex(), Some(KEY_ONE));
        assert_eq!(key.address(), Some(KEY_ONE_ADDRESS));
    }

    #[test]
    fn test_split_and_combine() {
        let key = CryptoKey::parse(&btc(), KEY_ONE).unwrap();
        let shares = key.split(3, 2, &mut CounterEntropy::new(1)).unwrap();
        assert_eq!(shares.len(), 3);
        for share in &shares {
            assert!(share.starts_with("2c"));
        }
        let combined = CryptoKey::combine(&btc(), &shares[1..]).unwrap();
        assert_eq!(combined, key);

        let public = key.exclude_private().unwrap();
        assert!(public.split(3, 2, &mut CounterEntropy::new(1)).is_err());
    }

    #[test]
    fn test_split_encrypted_key() {
        let mut key = CryptoKey::parse(&eth(), KEY_ONE).unwrap();
        key.encrypt(EncryptionScheme::PassphraseAes, "pw", &mut |_| {})
            .unwrap();
        let shares = key.split(2, 2, &mut CounterEntropy::new(9)).unwrap();
        let combined = CryptoKey::combine(&eth(), &shares).unwrap();
        assert_eq!(combined.encryption(), Some(EncryptionScheme::PassphraseAes));
        assert_eq!(combined.wif(), key.wif());
    }

    #[test]
    fn test_exclusions() {
        let key = CryptoKey::parse(&btc(), KEY_ONE).unwrap();

        let private_only = key.exclude_public().unwrap();
        assert_eq!(private_only.address(), None);
        assert_eq!(private_only.wif(), key.wif());
        assert_eq!(private_only, key);

        let public_only = key.exclude_private().unwrap();
        assert!(!public_only.has_private_key());
        assert_eq!(public_only.address(), Some(KEY_ONE_ADDRESS));
        assert!(public_only.exclude_public().is_err());
        assert!(private_only.exclude_private().is_err());
    }

    #[test]
    fn test_from_address() {
        let key =
            CryptoKey::from_address(&eth(), "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf").unwrap();
        assert!(!key.has_private_key());
        assert!(CryptoKey::from_address(&eth(), KEY_ONE_ADDRESS).is_err());
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = CryptoKey::parse(&btc(), KEY_ONE).unwrap();
        let debug = format!("{:?}", key);
        assert!(!debug.contains("KwDiBf89"));
        assert!(debug.contains(KEY_ONE_ADDRESS));
    }
}
