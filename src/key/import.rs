//! Lenient key import from user-supplied text.
//!
//! Both entry points return `None` rather than an error: the caller is
//! probing whether some pasted text holds a key at all.

use std::sync::Arc;

use super::CryptoKey;
use crate::currency::CurrencyPlugin;
use crate::threshold::is_possible_share;

/// Parses `input` as a single key, or failing that as a set of split pieces
/// separated by whitespace, commas or semicolons.
pub fn parse_key(plugin: &Arc<dyn CurrencyPlugin>, input: &str) -> Option<CryptoKey> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(key) = CryptoKey::parse(plugin, trimmed) {
        return Some(key);
    }

    let tokens: Vec<&str> = trimmed
        .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .filter(|token| is_possible_share(token))
        .collect();
    if tokens.is_empty() {
        return None;
    }
    match CryptoKey::combine(plugin, &tokens) {
        Ok(key) => Some(key),
        Err(e) => {
            log::debug!("pasted {} pieces did not combine: {}", plugin.ticker(), e);
            None
        }
    }
}

/// One string is a key, several are split pieces.
pub fn get_key<S: AsRef<str>>(plugin: &Arc<dyn CurrencyPlugin>, inputs: &[S]) -> Option<CryptoKey> {
    match inputs {
        [] => None,
        [single] => CryptoKey::parse(plugin, single.as_ref().trim()).ok(),
        pieces => CryptoKey::combine(plugin, pieces).ok(),
    }
}
