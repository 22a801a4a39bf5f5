//! Splitting a byte secret into Shamir shares over GF(256).
//!
//! Every secret byte gets its own random polynomial of degree `k - 1` whose
//! intercept is the byte; share `i` holds the evaluations at `x = i`.
//! Coefficients are wiped after use.

use zeroize::Zeroizing;

use super::gf256::GF256;
use super::polynomial::evaluate_polynomial;
use super::share::Share;
use super::ShareError;
use crate::entropy::EntropySource;

/// Splits `secret` into `n` shares, any `k` of which reconstruct it.
pub fn split_secret<R: EntropySource + ?Sized>(
    secret: &[u8],
    k: u8,
    n: u8,
    rng: &mut R,
) -> Result<Vec<Share>, ShareError> {
    if secret.is_empty() {
        return Err(ShareError::InvalidSecret);
    }
    if k < 2 || k > n {
        return Err(ShareError::InvalidThreshold {
            num_shares: n as usize,
            min_shares: k as usize,
        });
    }

    // share_values[i] belongs to the share with identifier i + 1
    let mut share_values: Vec<Zeroizing<Vec<u8>>> = (0..n)
        .map(|_| Zeroizing::new(Vec::with_capacity(secret.len())))
        .collect();

    let mut random_buf = Zeroizing::new(vec![0u8; (k - 1) as usize]);
    let mut coeffs: Zeroizing<Vec<GF256>> = Zeroizing::new(Vec::with_capacity(k as usize));

    for &byte in secret {
        rng.fill(&mut random_buf)?;

        coeffs.clear();
        coeffs.push(GF256(byte));
        coeffs.extend(random_buf.iter().map(|&r| GF256(r)));

        for (i, values) in share_values.iter_mut().enumerate() {
            let x = GF256(i as u8 + 1);
            values.push(evaluate_polynomial(&coeffs, x).0);
        }
    }

    share_values
        .iter()
        .enumerate()
        .map(|(i, value)| Share::new(i as u8 + 1, value.to_vec()))
        .collect()
}
