//! Bitcoin-family currencies: P2PKH addresses, WIF private keys, BIP38 and
//! passphrase AES encryption.

use k256::SecretKey;
use rand_core::OsRng;
use zeroize::Zeroizing;

use super::{
    decrypt_passphrase_aes, encrypt_passphrase_aes, public_key_bytes, secret_key, CurrencyPlugin,
    EncryptionScheme,
};
use crate::config::Bip38Params;
use crate::crypto::{bip38, passphrase_aes};
use crate::encoding::{base58, hash, is_hex};
use crate::key::{KeyError, KeyState};

const SCHEMES: [EncryptionScheme; 2] = [EncryptionScheme::Bip38, EncryptionScheme::PassphraseAes];
const COMPRESSED_SUFFIX: u8 = 0x01;

/// Version bytes of a Bitcoin-like network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Network {
    pub p2pkh_prefix: u8,
    pub wif_prefix: u8,
}

impl Network {
    pub const BITCOIN: Network = Network { p2pkh_prefix: 0x00, wif_prefix: 0x80 };
    pub const LITECOIN: Network = Network { p2pkh_prefix: 0x30, wif_prefix: 0xB0 };
    pub const DASH: Network = Network { p2pkh_prefix: 0x4C, wif_prefix: 0xCC };
}

pub struct BitcoinPlugin {
    name: &'static str,
    ticker: &'static str,
    network: Network,
    bip38: Bip38Params,
    donation_address: Option<String>,
}

impl BitcoinPlugin {
    pub fn new(name: &'static str, ticker: &'static str, network: Network, bip38: Bip38Params) -> Self {
        BitcoinPlugin {
            name,
            ticker,
            network,
            bip38,
            donation_address: None,
        }
    }

    pub fn bitcoin(bip38: Bip38Params) -> Self {
        Self::new("Bitcoin", "BTC", Network::BITCOIN, bip38)
    }

    /// Legacy address format; keys are interchangeable with Bitcoin's.
    pub fn bitcoin_cash(bip38: Bip38Params) -> Self {
        Self::new("Bitcoin Cash", "BCH", Network::BITCOIN, bip38)
    }

    pub fn litecoin(bip38: Bip38Params) -> Self {
        Self::new("Litecoin", "LTC", Network::LITECOIN, bip38)
    }

    pub fn dash(bip38: Bip38Params) -> Self {
        Self::new("Dash", "DASH", Network::DASH, bip38)
    }

    pub fn with_donation_address(mut self, address: Option<String>) -> Self {
        self.donation_address = address;
        self
    }

    pub fn network(&self) -> Network {
        self.network
    }

    fn parse_error(&self) -> KeyError {
        KeyError::Parse { ticker: self.ticker.to_string() }
    }

    fn address(&self, secret: &SecretKey, compressed: bool) -> String {
        let mut payload = Vec::with_capacity(21);
        payload.push(self.network.p2pkh_prefix);
        payload.extend_from_slice(&hash::hash160(&public_key_bytes(secret, compressed)));
        base58::check_encode(&payload)
    }

    fn wif(&self, secret: &[u8]) -> String {
        let mut payload = Zeroizing::new(Vec::with_capacity(34));
        payload.push(self.network.wif_prefix);
        payload.extend_from_slice(secret);
        payload.push(COMPRESSED_SUFFIX);
        base58::check_encode(&payload)
    }

    /// Keys are always held in compressed form.
    fn state(&self, secret: &[u8]) -> Result<KeyState, KeyError> {
        let key = secret_key(self.ticker, secret)?;
        Ok(KeyState::unencrypted(
            hex::encode(secret),
            self.wif(secret),
            self.address(&key, true),
        ))
    }

    /// Private key bytes of a compressed or uncompressed WIF on this network.
    fn decode_wif(&self, input: &str) -> Option<Zeroizing<Vec<u8>>> {
        let payload = Zeroizing::new(base58::check_decode(input).ok()?);
        if payload.first() != Some(&self.network.wif_prefix) {
            return None;
        }
        match payload.len() {
            34 if payload[33] == COMPRESSED_SUFFIX => Some(Zeroizing::new(payload[1..33].to_vec())),
            33 => Some(Zeroizing::new(payload[1..].to_vec())),
            _ => None,
        }
    }
}

impl CurrencyPlugin for BitcoinPlugin {
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
        if let Some(secret) = self.decode_wif(input) {
            return self.state(&secret);
        }
        if input.len() == 64 && is_hex(input) {
            let secret = Zeroizing::new(hex::decode(input).map_err(|_| self.parse_error())?);
            return self.state(&secret);
        }
        if bip38::is_bip38(input) {
            let payload = base58::decode(input).map_err(|_| self.parse_error())?;
            return Ok(KeyState::encrypted(
                hex::encode(payload),
                input.to_string(),
                EncryptionScheme::Bip38,
            ));
        }
        if passphrase_aes::is_passphrase_aes(input) {
            let hex_form = passphrase_aes::envelope_to_hex(input).map_err(|_| self.parse_error())?;
            return Ok(KeyState::encrypted(
                hex_form,
                input.to_string(),
                EncryptionScheme::PassphraseAes,
            ));
        }
        if is_hex(input) {
            let lower = input.to_ascii_lowercase();
            if input.len() > 80 && input.len() < 90 {
                if let Ok(bytes) = hex::decode(&lower) {
                    let encrypted = base58::encode(&bytes);
                    if bip38::is_bip38(&encrypted) {
                        return Ok(KeyState::encrypted(lower, encrypted, EncryptionScheme::Bip38));
                    }
                }
            } else if input.len() > 100 {
                if let Ok(envelope) = passphrase_aes::envelope_from_hex(&lower) {
                    if passphrase_aes::is_passphrase_aes(&envelope) {
                        return Ok(KeyState::encrypted(
                            lower,
                            envelope,
                            EncryptionScheme::PassphraseAes,
                        ));
                    }
                }
            }
        }
        Err(self.parse_error())
    }

    fn is_address(&self, address: &str) -> bool {
        match base58::check_decode(address) {
            Ok(payload) => payload.len() == 21 && payload[0] == self.network.p2pkh_prefix,
            Err(_) => false,
        }
    }

    /// The held address is the compressed one; the uncompressed address of
    /// the same private key is accepted too.
    fn controls_address(&self, state: &KeyState, address: &str) -> bool {
        if state.address.as_deref() == Some(address) {
            return true;
        }
        let Some(hex_key) = state.hex.as_deref() else {
            return false;
        };
        let mut secret = Zeroizing::new([0u8; 32]);
        if hex::decode_to_slice(hex_key, &mut secret[..]).is_err() {
            return false;
        }
        match secret_key(self.ticker, &secret[..]) {
            Ok(key) => self.address(&key, false) == address,
            Err(_) => false,
        }
    }

    fn encrypt_state(
        &self,
        state: &KeyState,
        scheme: EncryptionScheme,
        passphrase: &str,
        on_progress: &mut dyn FnMut(f64),
    ) -> Result<KeyState, KeyError> {
        let hex_key = state
            .hex
            .as_deref()
            .ok_or(KeyError::InvalidOperation("cannot encrypt a key without a private key"))?;
        match scheme {
            EncryptionScheme::Bip38 => {
                let address = state
                    .address
                    .as_deref()
                    .ok_or(KeyError::InvalidOperation("BIP38 requires the key's address"))?;
                let mut secret = Zeroizing::new([0u8; 32]);
                hex::decode_to_slice(hex_key, &mut secret[..]).map_err(|_| self.parse_error())?;
                on_progress(0.0);
                let encrypted = bip38::encrypt(&secret, true, address, passphrase, &self.bip38)?;
                let mut next = self.parse_state(&encrypted)?;
                next.address = state.address.clone();
                on_progress(1.0);
                Ok(next)
            }
            EncryptionScheme::PassphraseAes => {
                encrypt_passphrase_aes(self, state, hex_key, passphrase, on_progress)
            }
        }
    }

    fn decrypt_state(
        &self,
        state: &KeyState,
        passphrase: &str,
        on_progress: &mut dyn FnMut(f64),
    ) -> Result<KeyState, KeyError> {
        match state.encryption {
            Some(EncryptionScheme::Bip38) => {
                let encrypted = state
                    .wif
                    .as_deref()
                    .ok_or(KeyError::InvalidOperation("encrypted key has no ciphertext"))?;
                on_progress(0.0);
                let decrypted = bip38::decrypt(encrypted, passphrase, &self.bip38)?;
                let key = secret_key(self.ticker, &decrypted.secret[..])
                    .map_err(|_| KeyError::IncorrectPassphrase)?;
                // the hash covers the address form the key was encrypted under
                let address = self.address(&key, decrypted.compressed);
                if bip38::address_hash(&address) != decrypted.address_hash {
                    return Err(KeyError::IncorrectPassphrase);
                }
                let next = self.state(&decrypted.secret[..])?;
                on_progress(1.0);
                Ok(next)
            }
            Some(EncryptionScheme::PassphraseAes) => {
                decrypt_passphrase_aes(self, state, passphrase, on_progress)
            }
            None => Err(KeyError::NotEncrypted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_ONE: &str = "0000000000000000000000000000000000000000000000000000000000000001";
    const BIP38_SECRET: &str = "cbf4b9f70470856bb4f40f80b87edb90865997ffee6df315ab166d713af433a5";
    const BIP38_ENCRYPTED: &str = "6PYNKZ1EAgYgmQfmNVamxyXVWHzK5s6DGhwP4J5o44cvXdoY7sRzhtpUeo";
    const BIP38_HEX: &str =
        "0142e043be417970e4a0805f15a77efc738f794068d8837c2985a6945f7fe0db3f75dc305eaf7cbb61ce24";
    const ENVELOPE: &str = "U2FsdGVkX18BAgMEBQYHCJyluJLOoQqSh41VWGQs/Hhay731B1MdtCtKrI3Oq3IM+nhd2H5R6UzRFIknqrvII4xAwJuu4dk6H6gS1kWFOAYzu746i8lCrlxOykifMCK2";

    fn fast() -> Bip38Params {
        Bip38Params { log_n: 4, r: 8, p: 1 }
    }

    fn no_progress() -> impl FnMut(f64) {
        |_| {}
    }

    #[test]
    fn test_key_one_addresses() {
        let btc = BitcoinPlugin::bitcoin(fast());
        let state = btc.parse_state(KEY_ONE).unwrap();
        assert_eq!(state.wif.as_deref(), Some("KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn"));
        assert_eq!(state.address.as_deref(), Some("1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH"));
        assert_eq!(state.encryption, None);

        let ltc = BitcoinPlugin::litecoin(fast()).parse_state(KEY_ONE).unwrap();
        assert_eq!(ltc.wif.as_deref(), Some("T33ydQRKp4FCW5LCLLUB7deioUMoveiwekdwUwyfRDeGZm76aUjV"));
        assert_eq!(ltc.address.as_deref(), Some("LVuDpNCSSj6pQ7t9Pv6d6sUkLKoqDEVUnJ"));

        let dash = BitcoinPlugin::dash(fast()).parse_state(KEY_ONE).unwrap();
        assert_eq!(dash.wif.as_deref(), Some("XBHddvWWiMu3nZhhpTXBQWJMmdz5JNKJD85b9fgKAckCT2coW3Y4"));
        assert_eq!(dash.address.as_deref(), Some("XmN7PQYWKn5MJFna5fRYgP6mxT2F7xpekE"));
    }

    #[test]
    fn test_parse_wif_forms() {
        let btc = BitcoinPlugin::bitcoin(fast());
        let compressed = btc
            .parse_state("KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn")
            .unwrap();
        assert_eq!(compressed.hex.as_deref(), Some(KEY_ONE));

        // uncompressed WIFs are held in compressed form
        let uncompressed = btc
            .parse_state("5HpHagT65TZzG1PH3CSu63k8DbpvD8s5ip4nEB3kEsreAnchuDf")
            .unwrap();
        assert_eq!(uncompressed, compressed);

        // another network's WIF is not ours
        let ltc = BitcoinPlugin::litecoin(fast());
        assert!(ltc
            .parse_state("KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn")
            .is_err());
    }

    #[test]
    fn test_parse_encrypted_forms() {
        let btc = BitcoinPlugin::bitcoin(fast());

        let bip38 = btc.parse_state(BIP38_ENCRYPTED).unwrap();
        assert_eq!(bip38.encryption, Some(EncryptionScheme::Bip38));
        assert_eq!(bip38.hex.as_deref(), Some(BIP38_HEX));
        assert_eq!(bip38.address, None);

        let from_hex = btc.parse_state(&BIP38_HEX.to_uppercase()).unwrap();
        assert_eq!(from_hex.wif.as_deref(), Some(BIP38_ENCRYPTED));
        assert_eq!(from_hex.hex.as_deref(), Some(BIP38_HEX));

        let aes = btc.parse_state(ENVELOPE).unwrap();
        assert_eq!(aes.encryption, Some(EncryptionScheme::PassphraseAes));
        let aes_hex = aes.hex.clone().unwrap();
        assert_eq!(aes_hex.len(), 192);
        assert!(aes_hex.starts_with("53616c7465645f5f"));
        assert_eq!(btc.parse_state(&aes_hex).unwrap().wif.as_deref(), Some(ENVELOPE));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let btc = BitcoinPlugin::bitcoin(fast());
        let inputs = vec![
            String::new(),
            "hello".to_string(),
            "abcd".to_string(),
            "0".repeat(64),
            "ab".repeat(45),
        ];
        for input in &inputs {
            assert!(
                matches!(btc.parse_state(input), Err(KeyError::Parse { .. })),
                "{input}"
            );
        }
    }

    #[test]
    fn test_is_address() {
        let btc = BitcoinPlugin::bitcoin(fast());
        assert!(btc.is_address("1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH"));
        assert!(!btc.is_address("1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMh"));
        assert!(!btc.is_address("LVuDpNCSSj6pQ7t9Pv6d6sUkLKoqDEVUnJ"));
        assert!(!btc.is_address(""));
        assert!(BitcoinPlugin::litecoin(fast()).is_address("LVuDpNCSSj6pQ7t9Pv6d6sUkLKoqDEVUnJ"));
    }

    #[test]
    fn test_bip38_known_vector() {
        let btc = BitcoinPlugin::bitcoin(Bip38Params::default());
        let state = btc.parse_state(BIP38_SECRET).unwrap();
        assert_eq!(state.address.as_deref(), Some("164MQi977u9GUteHr4EPH27VkkdxmfCvGW"));

        let encrypted = btc
            .encrypt_state(&state, EncryptionScheme::Bip38, "TestingOneTwoThree", &mut no_progress())
            .unwrap();
        assert_eq!(encrypted.wif.as_deref(), Some(BIP38_ENCRYPTED));
        assert_eq!(encrypted.address, state.address);

        let decrypted = btc
            .decrypt_state(&encrypted, "TestingOneTwoThree", &mut no_progress())
            .unwrap();
        assert_eq!(decrypted, state);
        assert_eq!(
            decrypted.wif.as_deref(),
            Some("L44B5gGEpqEDRS9vVPz7QT35jcBG2r3CZwSwQ4fCewXAhAhqGVpP")
        );
    }

    #[test]
    fn test_bip38_wrong_passphrase() {
        let btc = BitcoinPlugin::bitcoin(fast());
        let state = btc.parse_state(KEY_ONE).unwrap();
        let encrypted = btc
            .encrypt_state(&state, EncryptionScheme::Bip38, "right", &mut no_progress())
            .unwrap();
        assert_eq!(
            btc.decrypt_state(&encrypted, "wrong", &mut no_progress()),
            Err(KeyError::IncorrectPassphrase)
        );
    }

    #[test]
    fn test_bip38_uncompressed_flag_accepted() {
        let btc = BitcoinPlugin::bitcoin(fast());
        let mut secret = [0u8; 32];
        secret[31] = 1;
        let foreign =
            bip38::encrypt(&secret, false, "1EHNa6Q4Jz2uvNExL497mE43ikXhwF6kZm", "pw", &fast())
                .unwrap();
        let encrypted = btc.parse_state(&foreign).unwrap();
        let decrypted = btc.decrypt_state(&encrypted, "pw", &mut no_progress()).unwrap();
        assert_eq!(decrypted.address.as_deref(), Some("1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH"));
    }

    #[test]
    fn test_passphrase_aes_known_envelope() {
        let btc = BitcoinPlugin::bitcoin(fast());
        let encrypted = btc.parse_state(ENVELOPE).unwrap();
        let decrypted = btc
            .decrypt_state(&encrypted, "abctesting123", &mut no_progress())
            .unwrap();
        assert_eq!(decrypted.hex.as_deref(), Some(KEY_ONE));
        assert_eq!(decrypted.address.as_deref(), Some("1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH"));

        assert_eq!(
            btc.decrypt_state(&encrypted, "abctesting124", &mut no_progress()),
            Err(KeyError::IncorrectPassphrase)
        );
    }

    #[test]
    fn test_passphrase_aes_round_trip() {
        let btc = BitcoinPlugin::bitcoin(fast());
        let state = btc.generate_state().unwrap();
        let mut reports = Vec::new();
        let encrypted = btc
            .encrypt_state(&state, EncryptionScheme::PassphraseAes, "pw", &mut |p| reports.push(p))
            .unwrap();
        assert_eq!(reports, vec![0.0, 1.0]);
        assert!(passphrase_aes::is_passphrase_aes(encrypted.wif.as_deref().unwrap()));
        let decrypted = btc.decrypt_state(&encrypted, "pw", &mut no_progress()).unwrap();
        assert_eq!(decrypted, state);
    }

    #[test]
    fn test_generate_state_is_valid() {
        let btc = BitcoinPlugin::bitcoin(fast());
        let state = btc.generate_state().unwrap();
        let address = state.address.clone().unwrap();
        assert!(btc.is_address(&address));
        assert_eq!(btc.parse_state(state.wif.as_deref().unwrap()).unwrap(), state);
    }

    #[test]
    fn test_decrypt_unencrypted_is_rejected() {
        let btc = BitcoinPlugin::bitcoin(fast());
        let state = btc.parse_state(KEY_ONE).unwrap();
        assert_eq!(
            btc.decrypt_state(&state, "pw", &mut no_progress()),
            Err(KeyError::NotEncrypted)
        );
    }
}
