//! Structural validation of a piece in its JSON form.
//!
//! Runs on the untyped value so that a malformed import is described field
//! by field instead of failing inside the deserializer. Messages are shown
//! to users verbatim.

use serde_json::{Map, Value};

use super::PieceError;
use crate::currency::EncryptionScheme;
use crate::threshold::min_shares;

/// Version written by early releases, read as "0.0.1".
pub const LEGACY_VERSION: &str = "1.0";

/// Checks `piece` and fails on the first violation.
///
/// Unless `allow_missing_public_or_private`, every key needs both an address
/// and a wif; otherwise one of the two suffices.
pub fn validate_piece(piece: &Value, allow_missing_public_or_private: bool) -> Result<(), PieceError> {
    let obj = piece
        .as_object()
        .ok_or_else(|| invalid("piece is not an object".to_string()))?;

    let version = obj
        .get("version")
        .ok_or_else(|| invalid("piece.version is not defined".to_string()))?;
    if !is_valid_version(version) {
        return Err(invalid(format!("piece.version is invalid version string: {}", display(version))));
    }

    let piece_num = obj.get("pieceNum");
    if let Some(num) = piece_num {
        let num = num
            .as_i64()
            .ok_or_else(|| invalid("piece.pieceNum is not an integer".to_string()))?;
        if num <= 0 {
            return Err(invalid("piece.pieceNum is not greater than 0".to_string()));
        }
        if num > i64::from(u32::MAX) {
            return Err(invalid(format!("piece.pieceNum is greater than {}", u32::MAX)));
        }
    }

    let keys = obj
        .get("keys")
        .ok_or_else(|| invalid("piece.keys is not defined".to_string()))?
        .as_array()
        .ok_or_else(|| invalid("piece.keys is not an array".to_string()))?;
    if keys.is_empty() {
        return Err(invalid("piece.keys is empty".to_string()));
    }

    let mut threshold: Option<Option<usize>> = None;
    for (i, key) in keys.iter().enumerate() {
        let key = key
            .as_object()
            .ok_or_else(|| invalid(format!("piece.keys[{}] is not an object", i)))?;

        if !key.contains_key("ticker") {
            return Err(invalid(format!("piece.keys[{}].ticker is not defined", i)));
        }
        match key.get("encryption") {
            None => return Err(invalid(format!("piece.keys[{}].encryption is not defined", i))),
            Some(Value::Null) => {}
            Some(Value::String(s)) if s.parse::<EncryptionScheme>().is_ok() => {}
            Some(other) => {
                return Err(invalid(format!(
                    "piece.keys[{}].encryption is invalid: {}",
                    i,
                    display(other)
                )));
            }
        }
        if allow_missing_public_or_private {
            if !is_present(key, "address") && !is_present(key, "wif") {
                return Err(invalid(format!(
                    "piece.keys[{}] is missing an address and private key",
                    i
                )));
            }
        } else {
            if !key.contains_key("address") {
                return Err(invalid(format!("piece.keys[{}].address is not defined", i)));
            }
            if !key.contains_key("wif") {
                return Err(invalid(format!("piece.keys[{}].wif is not defined", i)));
            }
        }

        if piece_num.is_some() {
            if let Some(wif) = key.get("wif").and_then(Value::as_str) {
                let prefix = min_shares(wif);
                match threshold {
                    None => threshold = Some(prefix),
                    Some(expected) if expected != prefix => {
                        return Err(invalid(format!(
                            "piece.keys[{}].wif has a different minimum threshold prefix",
                            i
                        )));
                    }
                    Some(_) => {}
                }
            }
        }
    }
    Ok(())
}

/// "N.N.N" of non-negative integers, not all zero, or the legacy "1.0".
pub fn is_valid_version(version: &Value) -> bool {
    let Some(version) = version.as_str() else {
        return false;
    };
    if version == LEGACY_VERSION {
        return true;
    }
    let parts: Vec<&str> = version.split('.').collect();
    if parts.len() != 3 {
        return false;
    }
    let mut sum: u64 = 0;
    for part in parts {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        match part.parse::<u64>() {
            Ok(n) => sum = sum.saturating_add(n),
            Err(_) => return false,
        }
    }
    sum > 0
}

fn is_present(key: &Map<String, Value>, field: &str) -> bool {
    matches!(key.get(field), Some(Value::String(s)) if !s.is_empty())
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn invalid(message: String) -> PieceError {
    PieceError::Invalid(message)
}
