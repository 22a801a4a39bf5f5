//! Pieces: the exportable unit of one or more keys.
//!
//! A piece is either a complete set of keys (no `pieceNum`) or one member of
//! a threshold-split set, in which case each wif is a share string. Keys are
//! positionally aligned across the members of a set.
//!
//! # Wire form
//! ```json
//! { "version": "0.1.1", "pieceNum": 1,
//!   "keys": [{ "ticker": "BTC", "address": "1...", "wif": "2c...", "encryption": null }] }
//! ```

pub mod codec;
pub mod validate;

use core::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::currency::{EncryptionScheme, PluginRegistry};
use crate::key::KeyError;

pub use codec::{check_split, PieceCodec};
pub use validate::validate_piece;

/// Version legacy pieces are read as.
const LEGACY_VERSION_ALIAS: &str = "0.0.1";

/// Which per-key field disagrees across sibling pieces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Divergence {
    Cryptocurrency,
    Address,
    Encryption,
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Divergence::Cryptocurrency => "Pieces are for different cryptocurrencies",
            Divergence::Address => "Pieces have different addresses",
            Divergence::Encryption => "Pieces have different encryption states",
        })
    }
}

/// Errors for piece validation and conversion. Display strings are shown to
/// users as is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PieceError {
    /// Structural validation failure naming the offending field.
    #[error("{0}")]
    Invalid(String),

    #[error("Need {additional} additional {} to import private keys", noun(.additional))]
    ThresholdNotMet { additional: usize },

    #[error("Pieces contain different number of keys")]
    KeyCountMismatch,

    #[error("{0}")]
    InconsistentPieces(Divergence),

    #[error("Pieces have different minimum threshold prefixes")]
    InconsistentThreshold,

    #[error("Could not import private keys from the given pieces.  Verify the pieces are correct.")]
    CombineFailed,

    /// A recorded field contradicts the private key it accompanies.
    #[error("piece.keys[{index}].{field} does not match its private key")]
    KeyMismatch { index: usize, field: &'static str },

    #[error("unknown cryptocurrency: {0}")]
    UnknownTicker(String),

    #[error("{0}")]
    InvalidArgument(&'static str),

    #[error("Cannot split piece without private key")]
    MissingPrivateKey,

    #[error("invalid piece json: {0}")]
    Json(String),

    #[error(transparent)]
    Key(#[from] KeyError),
}

fn noun(count: &usize) -> &'static str {
    if *count == 1 {
        "piece"
    } else {
        "pieces"
    }
}

impl From<serde_json::Error> for PieceError {
    fn from(e: serde_json::Error) -> Self {
        PieceError::Json(e.to_string())
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    pub version: String,
    #[serde(rename = "pieceNum", default, skip_serializing_if = "Option::is_none")]
    pub piece_num: Option<u32>,
    pub keys: Vec<PieceKey>,
}

/// One key's entry in a piece. `wif` is a share string when the piece is
/// part of a split set.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct PieceKey {
    pub ticker: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wif: Option<String>,
    /// Always written, as `null` when unencrypted.
    #[serde(default)]
    #[zeroize(skip)]
    pub encryption: Option<EncryptionScheme>,
}

impl Piece {
    pub fn is_split(&self) -> bool {
        self.piece_num.is_some()
    }

    /// Validates against the wire rules.
    pub fn validate(&self, allow_missing_public_or_private: bool) -> Result<(), PieceError> {
        let value = serde_json::to_value(self)?;
        validate_piece(&value, allow_missing_public_or_private)
    }

    pub fn to_json(&self) -> Result<String, PieceError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses and validates a piece. Public-only and private-only keys are
    /// accepted; a legacy "1.0" version is read as "0.0.1".
    pub fn from_json(json: &str) -> Result<Self, PieceError> {
        let mut value: Value = serde_json::from_str(json)?;
        validate_piece(&value, true)?;
        if let Some(version) = value.get_mut("version") {
            if version.as_str() == Some(validate::LEGACY_VERSION) {
                *version = Value::String(LEGACY_VERSION_ALIAS.to_string());
            }
        }
        Ok(serde_json::from_value(value)?)
    }

    /// CSV with one row per key. Columns are the fields present on the first
    /// key, in wire order, with uppercased names.
    pub fn to_csv(&self) -> Result<String, PieceError> {
        let first = self
            .keys
            .first()
            .ok_or_else(|| PieceError::Invalid("piece.keys is empty".to_string()))?;

        let mut columns: Vec<(&str, fn(&PieceKey) -> Option<String>)> = Vec::with_capacity(4);
        columns.push(("TICKER", |k| Some(k.ticker.clone())));
        if first.address.is_some() {
            columns.push(("ADDRESS", |k| k.address.clone()));
        }
        if first.wif.is_some() {
            columns.push(("WIF", |k| k.wif.clone()));
        }
        columns.push(("ENCRYPTION", |k| k.encryption.map(|s| s.to_string())));

        let mut csv = String::new();
        let header: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
        csv.push_str(&header.join(","));
        for key in &self.keys {
            csv.push('\n');
            let row: Vec<String> = columns
                .iter()
                .map(|(_, field)| csv_field(&field(key).unwrap_or_default()))
                .collect();
            csv.push_str(&row.join(","));
        }
        Ok(csv)
    }

    /// Human-readable listing of the piece's keys.
    pub fn to_text(&self, registry: &PluginRegistry) -> String {
        let mut text = String::new();
        for (i, key) in self.keys.iter().enumerate() {
            let name = registry
                .get(&key.ticker)
                .map(|plugin| plugin.name().to_string())
                .unwrap_or_else(|| key.ticker.clone());
            text.push_str(&format!("===== #{} {} =====\n\n", i + 1, name));
            if let Some(address) = &key.address {
                text.push_str(&format!("Public Address:\n{}\n\n", address));
            }
            if let Some(wif) = &key.wif {
                let kind = if self.is_split() {
                    "split"
                } else if key.encryption.is_some() {
                    "encrypted"
                } else {
                    "unencrypted"
                };
                text.push_str(&format!("Private Key ({}):\n{}\n\n", kind, wif));
            }
        }
        text.trim().to_string()
    }

    /// Copy with addresses and/or private keys removed.
    pub fn redacted(&self, show_public: bool, show_private: bool) -> Piece {
        let mut copy = self.clone();
        for key in &mut copy.keys {
            if !show_public {
                key.address = None;
            }
            if !show_private {
                key.wif = None;
                key.encryption = None;
            }
        }
        copy
    }

    /// The ticker shared by every key, `"mix"` when they differ.
    pub fn common_ticker(&self) -> Option<&str> {
        let first = self.keys.first()?.ticker.as_str();
        if self.keys.iter().all(|k| k.ticker == first) {
            Some(first)
        } else {
            Some("mix")
        }
    }
}

fn csv_field(value: &str) -> String {
    if value.contains(|c| matches!(c, ',' | '"' | '\n' | '\r')) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

impl fmt::Debug for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Piece")
            .field("version", &self.version)
            .field("piece_num", &self.piece_num)
            .field("keys", &self.keys)
            .finish()
    }
}

impl fmt::Debug for PieceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PieceKey")
            .field("ticker", &self.ticker)
            .field("address", &self.address)
            .field("wif", &self.wif.as_ref().map(|_| "***SENSITIVE***"))
            .field("encryption", &self.encryption)
            .finish()
    }
}
