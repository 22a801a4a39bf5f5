use std::collections::BTreeSet;

use cryptostorage_core::entropy::OsEntropy;
use cryptostorage_core::threshold::combine::reconstruct_secret;
use cryptostorage_core::threshold::{self, Share, ShareError};
use proptest::prelude::*;

fn split_params() -> impl Strategy<Value = (usize, usize)> {
    (2usize..=10).prop_flat_map(|n| (Just(n), 2..=n))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn any_threshold_subset_reconstitutes(
        secret in prop::collection::vec(any::<u8>(), 1..48),
        (n, m) in split_params(),
        offset in 0usize..10,
    ) {
        let secret_hex = hex::encode(&secret);
        let shares = threshold::share(&secret_hex, n, m, &mut OsEntropy::new()).unwrap();
        prop_assert_eq!(shares.len(), n);
        let prefix = format!("{}c", m);
        prop_assert!(shares.iter().all(|s| s.starts_with(&prefix)));

        let subset: Vec<&String> = (0..m).map(|i| &shares[(offset + i) % n]).collect();
        prop_assert_eq!(threshold::combine(&subset).unwrap(), secret_hex);
    }

    #[test]
    fn one_share_short_reports_shortfall(
        secret in prop::collection::vec(any::<u8>(), 1..48),
        (n, m) in split_params(),
    ) {
        let shares = threshold::share(&hex::encode(&secret), n, m, &mut OsEntropy::new()).unwrap();
        let err = threshold::combine(&shares[..m - 1]).unwrap_err();
        prop_assert_eq!(err, ShareError::ThresholdNotMet { min_shares: m, additional: 1 });
    }

    /// With m - 1 genuine shares, varying the one remaining share over every
    /// byte value reaches every possible secret byte.
    #[test]
    fn fewer_than_threshold_shares_reveal_nothing(
        secret in prop::collection::vec(any::<u8>(), 1..16),
        (n, m) in split_params(),
    ) {
        let shares = threshold::share(&hex::encode(&secret), n, m, &mut OsEntropy::new()).unwrap();
        let mut known: Vec<Share> = shares[..m - 1]
            .iter()
            .map(|s| Share::decode(s).unwrap().1)
            .collect();
        let len = known[0].value.len();
        let free_x = (n + 1) as u8;

        let mut reachable = BTreeSet::new();
        for guess in 0..=255u8 {
            let mut value = vec![0u8; len];
            value[0] = guess;
            known.push(Share::new(free_x, value).unwrap());
            let candidate = reconstruct_secret(&known).unwrap();
            reachable.insert(candidate[0]);
            known.pop();
        }
        prop_assert_eq!(reachable.len(), 256);
    }
}

#[test]
fn share_strings_are_possible_shares() {
    let shares = threshold::share(&"ab".repeat(32), 3, 2, &mut OsEntropy::new()).unwrap();
    assert!(shares.iter().all(|s| threshold::is_possible_share(s)));
    assert_eq!(threshold::min_shares(&shares[0]), Some(2));
}
