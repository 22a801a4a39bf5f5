//! Conversion between keys and pieces.

use std::sync::Arc;

use super::{Divergence, Piece, PieceError, PieceKey};
use crate::config::CoreConfig;
use crate::currency::{CurrencyPlugin, PluginRegistry};
use crate::entropy::EntropySource;
use crate::key::{CryptoKey, KeyError};
use crate::threshold::{min_shares, MAX_SHARES};

/// Builds pieces from keys and keys back from pieces.
#[derive(Clone)]
pub struct PieceCodec {
    registry: Arc<PluginRegistry>,
    version: String,
}

impl PieceCodec {
    pub fn new(registry: Arc<PluginRegistry>, config: &CoreConfig) -> Self {
        PieceCodec {
            registry,
            version: config.piece_version.clone(),
        }
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// Distributes `keys` over `num_pieces` pieces.
    ///
    /// One piece carries each key's wif as is. More than one splits every
    /// key's private component so that `min_pieces` of them reconstitute it;
    /// `pieces[i].keys[j]` then holds share `i` of `keys[j]`.
    pub fn keys_to_pieces<R: EntropySource + ?Sized>(
        &self,
        keys: &[CryptoKey],
        num_pieces: usize,
        min_pieces: Option<usize>,
        rng: &mut R,
    ) -> Result<Vec<Piece>, PieceError> {
        if keys.is_empty() {
            return Err(PieceError::InvalidArgument("At least one key is required"));
        }
        let split_threshold = check_split(num_pieces, min_pieces)?;

        let mut pieces: Vec<Piece> = (0..num_pieces)
            .map(|i| Piece {
                version: self.version.clone(),
                piece_num: split_threshold.map(|_| i as u32 + 1),
                keys: Vec::with_capacity(keys.len()),
            })
            .collect();

        for key in keys {
            let wifs: Vec<Option<String>> = match split_threshold {
                None => vec![key.wif().map(str::to_string)],
                Some(min) => {
                    if !key.has_private_key() {
                        return Err(PieceError::MissingPrivateKey);
                    }
                    key.split(num_pieces, min, rng)?
                        .into_iter()
                        .map(Some)
                        .collect()
                }
            };
            for (piece, wif) in pieces.iter_mut().zip(wifs) {
                let encryption = wif.as_ref().and_then(|_| key.encryption());
                piece.keys.push(PieceKey {
                    ticker: key.ticker().to_string(),
                    address: key.address().map(str::to_string),
                    wif,
                    encryption,
                });
            }
        }

        log::info!(
            "distributed {} keys over {} pieces (threshold {})",
            keys.len(),
            num_pieces,
            split_threshold.unwrap_or(1)
        );
        Ok(pieces)
    }

    /// Reconstitutes keys from one unsplit piece or from enough pieces of a
    /// split set. Identical pieces count once.
    pub fn pieces_to_keys(&self, pieces: &[Piece]) -> Result<Vec<CryptoKey>, PieceError> {
        if pieces.is_empty() {
            return Err(PieceError::InvalidArgument("At least one piece is required"));
        }
        for piece in pieces {
            piece.validate(true)?;
        }
        let mut distinct: Vec<&Piece> = Vec::with_capacity(pieces.len());
        for piece in pieces {
            if !distinct.contains(&piece) {
                distinct.push(piece);
            }
        }

        if let [piece] = distinct.as_slice() {
            if let (true, Some(wif)) = (piece.is_split(), piece.keys[0].wif.as_deref()) {
                let min = min_shares(wif).unwrap_or(2);
                return Err(PieceError::ThresholdNotMet {
                    additional: min.saturating_sub(1).max(1),
                });
            }
            return piece
                .keys
                .iter()
                .enumerate()
                .map(|(i, piece_key)| self.import_piece_key(i, piece_key))
                .collect();
        }

        let num_keys = distinct[0].keys.len();
        if distinct.iter().any(|p| p.keys.len() != num_keys) {
            return Err(PieceError::KeyCountMismatch);
        }

        // only present wifs carry a threshold
        let mut threshold: Option<usize> = None;
        for i in 0..num_keys {
            let first = &distinct[0].keys[i];
            for piece in &distinct {
                let piece_key = &piece.keys[i];
                if piece_key.ticker != first.ticker {
                    return Err(PieceError::InconsistentPieces(Divergence::Cryptocurrency));
                }
                if piece_key.address != first.address {
                    return Err(PieceError::InconsistentPieces(Divergence::Address));
                }
                if piece_key.encryption != first.encryption {
                    return Err(PieceError::InconsistentPieces(Divergence::Encryption));
                }
                if let Some(wif) = piece_key.wif.as_deref() {
                    let prefix = min_shares(wif).ok_or(PieceError::CombineFailed)?;
                    match threshold {
                        None => threshold = Some(prefix),
                        Some(expected) if expected != prefix => {
                            return Err(PieceError::InconsistentThreshold)
                        }
                        Some(_) => {}
                    }
                }
            }
        }

        if let Some(min) = threshold {
            if distinct.len() < min {
                return Err(PieceError::ThresholdNotMet {
                    additional: min - distinct.len(),
                });
            }
        }

        let mut keys = Vec::with_capacity(num_keys);
        for i in 0..num_keys {
            let first = &distinct[0].keys[i];
            let plugin = self.plugin(&first.ticker)?;
            if first.wif.is_none() {
                let address = first.address.as_deref().ok_or(PieceError::CombineFailed)?;
                keys.push(CryptoKey::from_address(&plugin, address)?);
                continue;
            }
            let mut shares = Vec::with_capacity(distinct.len());
            for piece in &distinct {
                shares.push(piece.keys[i].wif.as_deref().ok_or(PieceError::CombineFailed)?);
            }
            let mut key = CryptoKey::combine(&plugin, &shares).map_err(|e| {
                log::debug!("combining key {} failed: {}", i, e);
                PieceError::CombineFailed
            })?;
            self.check_recorded(i, first, &mut key)?;
            keys.push(key);
        }
        log::info!("imported {} keys from {} pieces", keys.len(), distinct.len());
        Ok(keys)
    }

    fn plugin(&self, ticker: &str) -> Result<Arc<dyn CurrencyPlugin>, PieceError> {
        self.registry
            .get(ticker)
            .ok_or_else(|| PieceError::UnknownTicker(ticker.to_string()))
    }

    fn import_piece_key(&self, index: usize, piece_key: &PieceKey) -> Result<CryptoKey, PieceError> {
        let plugin = self.plugin(&piece_key.ticker)?;
        match (&piece_key.wif, &piece_key.address) {
            (Some(wif), _) => {
                let mut key = CryptoKey::parse(&plugin, wif)?;
                self.check_recorded(index, piece_key, &mut key)?;
                Ok(key)
            }
            (None, Some(address)) => Ok(CryptoKey::from_address(&plugin, address)?),
            (None, None) => Err(PieceError::Invalid(format!(
                "piece.keys[{}] is missing an address and private key",
                index
            ))),
        }
    }

    /// Holds `key` to the encryption state and address its piece recorded.
    /// Encrypted keys adopt the recorded address.
    fn check_recorded(
        &self,
        index: usize,
        piece_key: &PieceKey,
        key: &mut CryptoKey,
    ) -> Result<(), PieceError> {
        if key.encryption() != piece_key.encryption {
            return Err(PieceError::KeyMismatch { index, field: "encryption" });
        }
        if let Some(address) = &piece_key.address {
            key.set_address(address).map_err(|e| match e {
                KeyError::AddressMismatch | KeyError::InvalidAddress { .. } => {
                    PieceError::KeyMismatch { index, field: "address" }
                }
                other => PieceError::Key(other),
            })?;
        }
        Ok(())
    }
}

/// Validates split arguments and returns the threshold to split with, or
/// `None` for a single unsplit piece.
pub fn check_split(
    num_pieces: usize,
    min_pieces: Option<usize>,
) -> Result<Option<usize>, PieceError> {
    if num_pieces < 1 {
        return Err(PieceError::InvalidArgument("Number of pieces must be >= 1"));
    }
    if num_pieces > MAX_SHARES {
        return Err(PieceError::InvalidArgument("Number of pieces must be <= 255"));
    }
    if let Some(min) = min_pieces {
        if num_pieces < 2 {
            return Err(PieceError::InvalidArgument("Number of pieces must be >= 2"));
        }
        if min < 2 {
            return Err(PieceError::InvalidArgument("Minimum pieces must be >= 2"));
        }
        if min > num_pieces {
            return Err(PieceError::InvalidArgument(
                "Minimum pieces must be <= number of pieces",
            ));
        }
    }

    match (num_pieces, min_pieces) {
        (1, _) => Ok(None),
        (_, Some(min)) => Ok(Some(min)),
        (_, None) => Err(PieceError::InvalidArgument(
            "Minimum pieces must be given to split into multiple pieces",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Bip38Params;
    use crate::currency::EncryptionScheme;
    use crate::entropy::testing::CounterEntropy;
    use crate::entropy::OsEntropy;

    fn codec() -> PieceCodec {
        let mut config = CoreConfig::default();
        config.bip38 = Bip38Params { log_n: 4, r: 8, p: 1 };
        let registry = Arc::new(PluginRegistry::from_config(&config).unwrap());
        PieceCodec::new(registry, &config)
    }

    fn keys(codec: &PieceCodec) -> Vec<CryptoKey> {
        ["BTC", "ETH", "LTC"]
            .iter()
            .map(|t| CryptoKey::generate(&codec.registry().require(t).unwrap()).unwrap())
            .collect()
    }

    #[test]
    fn test_single_piece_round_trip() {
        let codec = codec();
        let keys = keys(&codec);
        let pieces = codec.keys_to_pieces(&keys, 1, None, &mut OsEntropy::new()).unwrap();
        assert_eq!(pieces.len(), 1);
        assert_eq!(pieces[0].piece_num, None);
        assert_eq!(pieces[0].keys[0].wif.as_deref(), keys[0].wif());
        assert_eq!(codec.pieces_to_keys(&pieces).unwrap(), keys);
    }

    #[test]
    fn test_two_of_three_every_pair() {
        let codec = codec();
        let keys = keys(&codec);
        let pieces = codec.keys_to_pieces(&keys, 3, Some(2), &mut OsEntropy::new()).unwrap();
        assert_eq!(
            pieces.iter().map(|p| p.piece_num).collect::<Vec<_>>(),
            vec![Some(1), Some(2), Some(3)]
        );
        for (a, b) in [(0, 1), (0, 2), (1, 2)] {
            let subset = vec![pieces[a].clone(), pieces[b].clone()];
            assert_eq!(codec.pieces_to_keys(&subset).unwrap(), keys);
        }
        let err = codec.pieces_to_keys(&pieces[..1]).unwrap_err();
        assert_eq!(err.to_string(), "Need 1 additional piece to import private keys");
    }

    #[test]
    fn test_duplicates_do_not_count() {
        let codec = codec();
        let keys = keys(&codec);
        let pieces = codec.keys_to_pieces(&keys, 5, Some(3), &mut OsEntropy::new()).unwrap();
        let repeated = vec![pieces[0].clone(), pieces[0].clone(), pieces[1].clone()];
        assert_eq!(
            codec.pieces_to_keys(&repeated),
            Err(PieceError::ThresholdNotMet { additional: 1 })
        );
        assert_eq!(
            codec.pieces_to_keys(&pieces[3..4]).unwrap_err().to_string(),
            "Need 2 additional pieces to import private keys"
        );
    }

    #[test]
    fn test_cross_piece_divergence() {
        let codec = codec();
        let keys = keys(&codec);
        let pieces = codec.keys_to_pieces(&keys, 2, Some(2), &mut OsEntropy::new()).unwrap();

        let mut ticker = pieces.clone();
        ticker[1].keys[0].ticker = "BCH".into();
        assert_eq!(
            codec.pieces_to_keys(&ticker),
            Err(PieceError::InconsistentPieces(Divergence::Cryptocurrency))
        );

        let mut address = pieces.clone();
        address[1].keys[2].address = None;
        assert_eq!(
            codec.pieces_to_keys(&address),
            Err(PieceError::InconsistentPieces(Divergence::Address))
        );

        let mut encryption = pieces.clone();
        encryption[0].keys[1].encryption = Some(EncryptionScheme::PassphraseAes);
        assert_eq!(
            codec.pieces_to_keys(&encryption),
            Err(PieceError::InconsistentPieces(Divergence::Encryption))
        );

        let mut count = pieces.clone();
        count[0].keys.pop();
        assert_eq!(codec.pieces_to_keys(&count), Err(PieceError::KeyCountMismatch));
    }

    #[test]
    fn test_mixed_thresholds_across_pieces() {
        let codec = codec();
        let keys = keys(&codec);
        let two = codec.keys_to_pieces(&keys, 2, Some(2), &mut CounterEntropy::new(1)).unwrap();
        let three = codec.keys_to_pieces(&keys, 3, Some(3), &mut CounterEntropy::new(1)).unwrap();
        let mixed = vec![two[0].clone(), three[1].clone()];
        assert_eq!(codec.pieces_to_keys(&mixed), Err(PieceError::InconsistentThreshold));
    }

    #[test]
    fn test_pieces_from_different_splits() {
        let codec = codec();
        let first = codec
            .keys_to_pieces(&keys(&codec)[..1], 2, Some(2), &mut OsEntropy::new())
            .unwrap();
        let mut second = codec
            .keys_to_pieces(&keys(&codec)[..1], 2, Some(2), &mut OsEntropy::new())
            .unwrap();
        second[1].keys[0].address = first[0].keys[0].address.clone();
        let mixed = vec![first[0].clone(), second[1].clone()];
        assert_eq!(codec.pieces_to_keys(&mixed), Err(PieceError::CombineFailed));
    }

    #[test]
    fn test_encrypted_keys_keep_address() {
        let codec = codec();
        let mut keys = keys(&codec);
        for key in &mut keys {
            key.encrypt(EncryptionScheme::PassphraseAes, "pw", &mut |_| {})
                .unwrap();
        }
        let pieces = codec.keys_to_pieces(&keys, 3, Some(2), &mut OsEntropy::new()).unwrap();
        assert!(pieces[0].keys.iter().all(|k| k.encryption == Some(EncryptionScheme::PassphraseAes)));
        let restored = codec.pieces_to_keys(&pieces[1..]).unwrap();
        assert_eq!(restored, keys);
        assert_eq!(restored[0].address(), keys[0].address());

        let single = codec.keys_to_pieces(&keys, 1, None, &mut OsEntropy::new()).unwrap();
        let restored = codec.pieces_to_keys(&single).unwrap();
        assert_eq!(restored[1].address(), keys[1].address());
    }

    #[test]
    fn test_public_only_keys() {
        let codec = codec();
        let public: Vec<CryptoKey> = keys(&codec)
            .iter()
            .map(|k| k.exclude_private().unwrap())
            .collect();
        let pieces = codec.keys_to_pieces(&public, 1, None, &mut OsEntropy::new()).unwrap();
        assert!(pieces[0].keys.iter().all(|k| k.wif.is_none() && k.encryption.is_none()));
        assert_eq!(codec.pieces_to_keys(&pieces).unwrap(), public);

        assert_eq!(
            codec.keys_to_pieces(&public, 2, Some(2), &mut OsEntropy::new()),
            Err(PieceError::MissingPrivateKey)
        );
    }

    #[test]
    fn test_split_pieces_without_private_keys() {
        let codec = codec();
        let keys = keys(&codec);
        let public: Vec<CryptoKey> = keys.iter().map(|k| k.exclude_private().unwrap()).collect();
        let pieces = codec.keys_to_pieces(&keys, 3, Some(2), &mut OsEntropy::new()).unwrap();
        let redacted: Vec<Piece> = pieces.iter().map(|p| p.redacted(true, false)).collect();

        assert_eq!(codec.pieces_to_keys(&redacted[..2]).unwrap(), public);
        assert_eq!(codec.pieces_to_keys(&redacted[..1]).unwrap(), public);

        // one index carries no shares, the others still combine
        let mut partial = pieces[..2].to_vec();
        for piece in &mut partial {
            piece.keys[1].wif = None;
        }
        let restored = codec.pieces_to_keys(&partial).unwrap();
        assert_eq!(restored[0], keys[0]);
        assert_eq!(restored[1], public[1]);
        assert_eq!(restored[2], keys[2]);
        assert_eq!(
            codec.pieces_to_keys(&partial[..1]),
            Err(PieceError::ThresholdNotMet { additional: 1 })
        );
    }

    #[test]
    fn test_recorded_fields_must_match() {
        let codec = codec();
        let keys = keys(&codec);
        let mut pieces = codec.keys_to_pieces(&keys, 1, None, &mut OsEntropy::new()).unwrap();
        pieces[0].keys[0].address = keys[2].address().map(str::to_string);
        pieces[0].keys[0].ticker = "LTC".into();
        pieces[0].keys[0].wif = keys[0].wif().map(str::to_string);
        // a BTC wif is not an LTC key
        assert!(codec.pieces_to_keys(&pieces).is_err());

        let mut pieces = codec.keys_to_pieces(&keys, 1, None, &mut OsEntropy::new()).unwrap();
        pieces[0].keys[0].address = Some("1EHNa6Q4Jz2uvNExL497mE43ikXhwF6kZm".into());
        assert_eq!(
            codec.pieces_to_keys(&pieces),
            Err(PieceError::KeyMismatch { index: 0, field: "address" })
        );

        let mut pieces = codec.keys_to_pieces(&keys, 1, None, &mut OsEntropy::new()).unwrap();
        pieces[0].keys[1].encryption = Some(EncryptionScheme::PassphraseAes);
        assert_eq!(
            codec.pieces_to_keys(&pieces),
            Err(PieceError::KeyMismatch { index: 1, field: "encryption" })
        );
    }

    #[test]
    fn test_argument_validation() {
        let codec = codec();
        let keys = keys(&codec);
        let rng = &mut OsEntropy::new();
        let message = |r: Result<Vec<Piece>, PieceError>| r.unwrap_err().to_string();
        assert_eq!(message(codec.keys_to_pieces(&keys, 0, None, rng)), "Number of pieces must be >= 1");
        assert_eq!(message(codec.keys_to_pieces(&keys, 1, Some(2), rng)), "Number of pieces must be >= 2");
        assert_eq!(message(codec.keys_to_pieces(&keys, 3, Some(1), rng)), "Minimum pieces must be >= 2");
        assert_eq!(
            message(codec.keys_to_pieces(&keys, 3, Some(4), rng)),
            "Minimum pieces must be <= number of pieces"
        );
        assert!(codec.keys_to_pieces(&keys, 3, None, rng).is_err());
        assert!(codec.keys_to_pieces(&[], 1, None, rng).is_err());
        assert!(codec.pieces_to_keys(&[]).is_err());
    }

    #[test]
    fn test_unknown_ticker() {
        let codec = codec();
        let mut pieces = codec.keys_to_pieces(&keys(&codec), 1, None, &mut OsEntropy::new()).unwrap();
        pieces[0].keys[0].ticker = "XMR".into();
        assert_eq!(
            codec.pieces_to_keys(&pieces),
            Err(PieceError::UnknownTicker("XMR".into()))
        );
    }
}
