//! Threshold secret sharing of hex secrets.
//!
//! Shamir's scheme over GF(256): a secret is split into `n` shares such that
//! any `m` of them reconstruct it and fewer reveal nothing about it.
//!
//! Secrets enter and leave as hex strings (a key's hex form). Before splitting
//! a four byte `sha256d` checksum is appended, so combining shares of
//! different secrets is detected instead of silently producing garbage.
//!
//! # Components
//! - `gf256`: field arithmetic.
//! - `split`: polynomial generation and evaluation.
//! - `combine`: Lagrange interpolation.
//! - `share`: the share type and its `"<m>c<base58>"` string form.

pub mod combine;
pub mod gf256;
pub(crate) mod polynomial;
pub mod share;
pub mod split;

use zeroize::Zeroizing;

use crate::encoding::{hash, is_hex};
use crate::entropy::{EntropyError, EntropySource};

pub use share::{is_possible_share, min_shares, Share};

/// Upper bound on shares; x-coordinates are the non-zero bytes.
pub const MAX_SHARES: usize = 255;

const CHECKSUM_LEN: usize = 4;

/// Errors for threshold sharing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShareError {
    /// Threshold configuration error (m > n, m < 2).
    #[error("invalid threshold: {min_shares} of {num_shares} shares")]
    InvalidThreshold { num_shares: usize, min_shares: usize },

    #[error("cannot create more than 255 shares (requested {0})")]
    TooManyShares(usize),

    /// Secret is empty or not hex.
    #[error("secret must be non-empty hex")]
    InvalidSecret,

    #[error("share has no minimum threshold prefix")]
    MissingThresholdPrefix,

    #[error("malformed share: {0}")]
    MalformedShare(String),

    #[error("shares have different minimum threshold prefixes")]
    InconsistentThreshold,

    /// Fewer distinct shares than the embedded threshold.
    #[error("need {additional} additional {} to reconstitute the secret", noun(.additional))]
    ThresholdNotMet { min_shares: usize, additional: usize },

    /// Shares come from different secrets or polynomials.
    #[error("shares do not belong to the same secret")]
    InconsistentShares,

    #[error(transparent)]
    Entropy(#[from] EntropyError),
}

fn noun(count: &usize) -> &'static str {
    if *count == 1 {
        "share"
    } else {
        "shares"
    }
}

/// Splits `secret_hex` into `num_shares` share strings, `min_shares` of which
/// reconstitute it.
pub fn share<R: EntropySource + ?Sized>(
    secret_hex: &str,
    num_shares: usize,
    min_shares: usize,
    rng: &mut R,
) -> Result<Vec<String>, ShareError> {
    if min_shares < 2 || min_shares > num_shares {
        return Err(ShareError::InvalidThreshold { num_shares, min_shares });
    }
    if num_shares > MAX_SHARES {
        return Err(ShareError::TooManyShares(num_shares));
    }
    if !is_hex(secret_hex) {
        return Err(ShareError::InvalidSecret);
    }

    let mut payload =
        Zeroizing::new(hex::decode(secret_hex).map_err(|_| ShareError::InvalidSecret)?);
    let check = hash::checksum(&payload);
    payload.extend_from_slice(&check);

    let shares = split::split_secret(&payload, min_shares as u8, num_shares as u8, rng)?;
    log::debug!(
        "split secret into {} shares (threshold {}, entropy from {})",
        num_shares,
        min_shares,
        rng.name()
    );
    Ok(shares.iter().map(|s| s.encode(min_shares)).collect())
}

/// Reconstitutes the hex secret from share strings.
///
/// Identical shares are counted once. All shares must carry the same
/// threshold prefix and there must be at least that many distinct shares.
pub fn combine<S: AsRef<str>>(shares: &[S]) -> Result<String, ShareError> {
    if shares.is_empty() {
        return Err(ShareError::MalformedShare("no shares provided".into()));
    }

    let mut threshold: Option<usize> = None;
    let mut distinct: Vec<Share> = Vec::with_capacity(shares.len());
    for encoded in shares {
        let (min, decoded) = Share::decode(encoded.as_ref())?;
        match threshold {
            None => threshold = Some(min),
            Some(expected) if expected != min => return Err(ShareError::InconsistentThreshold),
            Some(_) => {}
        }
        if !distinct.contains(&decoded) {
            distinct.push(decoded);
        }
    }

    let min_shares = threshold.unwrap_or_default();
    if distinct.len() < min_shares {
        return Err(ShareError::ThresholdNotMet {
            min_shares,
            additional: min_shares - distinct.len(),
        });
    }

    let payload = combine::reconstruct_secret(&distinct)?;
    if payload.len() <= CHECKSUM_LEN {
        return Err(ShareError::InconsistentShares);
    }
    let (secret, check) = payload.split_at(payload.len() - CHECKSUM_LEN);
    if check != hash::checksum(secret) {
        return Err(ShareError::InconsistentShares);
    }
    Ok(hex::encode(secret))
}
