//! Secret reconstruction by Lagrange interpolation at `x = 0`.

use zeroize::Zeroizing;

use super::gf256::GF256;
use super::share::Share;
use super::ShareError;

/// Reconstructs the secret bytes from `shares`.
///
/// The caller is responsible for supplying at least the threshold number of
/// shares; with fewer, interpolation silently yields an unrelated value.
pub fn reconstruct_secret(shares: &[Share]) -> Result<Zeroizing<Vec<u8>>, ShareError> {
    let first = shares
        .first()
        .ok_or_else(|| ShareError::MalformedShare("no shares provided".into()))?;
    let share_len = first.value.len();

    if shares.iter().any(|share| share.value.len() != share_len) {
        return Err(ShareError::InconsistentShares);
    }

    // O(n^2) is fine for n <= 255
    for (i, a) in shares.iter().enumerate() {
        if shares[i + 1..].iter().any(|b| b.identifier == a.identifier) {
            return Err(ShareError::InconsistentShares);
        }
    }

    // lambda_j = prod_{m != j} x_m / (x_m - x_j); subtraction is XOR
    let lambdas: Zeroizing<Vec<GF256>> = Zeroizing::new(
        shares
            .iter()
            .enumerate()
            .map(|(j, share_j)| {
                let xj = GF256(share_j.identifier);
                let mut numerator = GF256::ONE;
                let mut denominator = GF256::ONE;
                for (m, share_m) in shares.iter().enumerate() {
                    if m == j {
                        continue;
                    }
                    let xm = GF256(share_m.identifier);
                    numerator *= xm;
                    denominator *= xm + xj;
                }
                numerator * denominator.inv()
            })
            .collect(),
    );

    let mut secret = Zeroizing::new(Vec::with_capacity(share_len));
    for p in 0..share_len {
        let mut sum = GF256::ZERO;
        for (share, lambda) in shares.iter().zip(lambdas.iter()) {
            sum += GF256(share.value[p]) * *lambda;
        }
        secret.push(sum.0);
    }

    Ok(secret)
}
