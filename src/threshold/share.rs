//! A single share and its textual form.
//!
//! A share is a point `(x, y)` on the hiding polynomial, with one `y` per
//! secret byte. Its string form is the decimal threshold, a literal `c`, then
//! Base58 of `x || y...`, e.g. `2c3XyNwG...`. The prefix lets one share say how
//! many siblings are needed without any side channel.

use core::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use super::ShareError;
use crate::encoding::base58;

/// A share of a secret.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Share {
    /// The x-coordinate (1..=255).
    #[zeroize(skip)]
    pub identifier: u8,

    /// The y-coordinates, one per byte of the secret.
    pub value: Vec<u8>,
}

impl fmt::Debug for Share {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Share")
            .field("identifier", &self.identifier)
            .field("length", &self.value.len())
            .field("value", &"***SENSITIVE***")
            .finish()
    }
}

impl Share {
    /// Creates a share, rejecting the zero x-coordinate and empty values.
    pub fn new(identifier: u8, value: Vec<u8>) -> Result<Self, ShareError> {
        if identifier == 0 {
            return Err(ShareError::MalformedShare("share index must be non-zero".into()));
        }
        if value.is_empty() {
            return Err(ShareError::MalformedShare("share value is empty".into()));
        }
        Ok(Self { identifier, value })
    }

    /// Encodes the share with its threshold prefix.
    pub fn encode(&self, min_shares: usize) -> String {
        let mut bytes = zeroize::Zeroizing::new(Vec::with_capacity(self.value.len() + 1));
        bytes.push(self.identifier);
        bytes.extend_from_slice(&self.value);
        format!("{}c{}", min_shares, base58::encode(&bytes))
    }

    /// Parses `"<M>c<base58>"` into the threshold and the share.
    pub fn decode(encoded: &str) -> Result<(usize, Share), ShareError> {
        let min_shares = min_shares(encoded).ok_or(ShareError::MissingThresholdPrefix)?;
        let separator = encoded.find('c').ok_or(ShareError::MissingThresholdPrefix)?;
        let payload = &encoded[separator + 1..];
        let bytes = zeroize::Zeroizing::new(
            base58::decode(payload).map_err(|e| ShareError::MalformedShare(e.to_string()))?,
        );
        if bytes.len() < 2 {
            return Err(ShareError::MalformedShare("share payload too short".into()));
        }
        let share = Share::new(bytes[0], bytes[1..].to_vec())?;
        Ok((min_shares, share))
    }
}

/// Reads the minimum-threshold prefix of a share string.
///
/// Looks for the first lowercase `c` and parses the decimal digits before
/// it. Returns `None` when there is no such prefix.
pub fn min_shares(share: &str) -> Option<usize> {
    let idx = share.find('c')?;
    if idx == 0 {
        return None;
    }
    let prefix = &share[..idx];
    if !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    prefix.parse().ok()
}

/// True when `s` could be a share string: at least 47 characters, a numeric
/// threshold prefix and a Base58 payload.
pub fn is_possible_share(s: &str) -> bool {
    if s.len() < 47 || min_shares(s).is_none() {
        return false;
    }
    match s.find('c') {
        Some(idx) => base58::is_base58(&s[idx + 1..]),
        None => false,
    }
}
