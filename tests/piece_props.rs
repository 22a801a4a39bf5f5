use std::sync::Arc;

use cryptostorage_core::entropy::OsEntropy;
use cryptostorage_core::{
    Bip38Params, CoreConfig, CryptoKey, EncryptionScheme, Piece, PieceCodec, PieceError,
    PluginRegistry,
};
use proptest::prelude::*;

fn codec() -> PieceCodec {
    let config = CoreConfig {
        bip38: Bip38Params { log_n: 4, r: 8, p: 1 },
        ..CoreConfig::default()
    };
    let registry = Arc::new(PluginRegistry::from_config(&config).unwrap());
    PieceCodec::new(registry, &config)
}

fn keys(codec: &PieceCodec, tickers: &[&str], encrypt: bool) -> Vec<CryptoKey> {
    tickers
        .iter()
        .map(|ticker| {
            let plugin = codec.registry().require(ticker).unwrap();
            let mut key = CryptoKey::generate(&plugin).unwrap();
            if encrypt {
                key.encrypt(EncryptionScheme::PassphraseAes, "pass", &mut |_| {}).unwrap();
            }
            key
        })
        .collect()
}

fn tickers() -> impl Strategy<Value = Vec<&'static str>> {
    prop::collection::vec(
        prop::sample::select(vec!["BTC", "BCH", "LTC", "DASH", "ETH", "ETC"]),
        1..4,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn split_pieces_round_trip_through_json(
        tickers in tickers(),
        (n, m) in (2usize..=6).prop_flat_map(|n| (Just(n), 2..=n)),
        encrypt in any::<bool>(),
        offset in 0usize..6,
    ) {
        let codec = codec();
        let keys = keys(&codec, &tickers, encrypt);
        let pieces = codec.keys_to_pieces(&keys, n, Some(m), &mut OsEntropy::new()).unwrap();
        prop_assert_eq!(pieces.len(), n);

        let reloaded: Vec<Piece> = (0..m)
            .map(|i| Piece::from_json(&pieces[(offset + i) % n].to_json().unwrap()).unwrap())
            .collect();
        prop_assert_eq!(codec.pieces_to_keys(&reloaded).unwrap(), keys);

        let err = codec.pieces_to_keys(&reloaded[..m - 1]).unwrap_err();
        prop_assert_eq!(err, PieceError::ThresholdNotMet { additional: 1 });
    }

    #[test]
    fn single_piece_never_needs_more(tickers in tickers(), encrypt in any::<bool>()) {
        let codec = codec();
        let keys = keys(&codec, &tickers, encrypt);
        let pieces = codec.keys_to_pieces(&keys, 1, None, &mut OsEntropy::new()).unwrap();
        prop_assert_eq!(pieces.len(), 1);
        prop_assert!(pieces[0].piece_num.is_none());
        prop_assert_eq!(codec.pieces_to_keys(&pieces).unwrap(), keys);
    }
}
