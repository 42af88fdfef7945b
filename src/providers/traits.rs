/// Shared payload helpers: attribute lists, token ids, counts
use crate::logger::{self, LogTag};
use crate::types::Trait;
use alloy_primitives::U256;
use serde_json::Value;

/// Coerce a scalar JSON value to a string
///
/// `false` and `0` are real values. `null` counts as missing.
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Convert an attribute array into traits
///
/// Entries missing either key are logged and dropped; a payload that is
/// not an array yields no traits.
pub fn parse_traits(
    collection_id: &str,
    token_id: &str,
    attributes: &Value,
    type_key: &str,
    value_key: &str,
) -> Vec<Trait> {
    let Some(entries) = attributes.as_array() else {
        logger::warning(
            LogTag::Provider,
            &format!(
                "Could not read traits for {} #{}, attributes are not a list: {}",
                collection_id, token_id, attributes
            ),
        );
        return Vec::new();
    };

    let mut traits = Vec::with_capacity(entries.len());
    for entry in entries {
        let trait_type = entry.get(type_key).and_then(value_to_string);
        let value = entry.get(value_key).and_then(value_to_string);

        match (trait_type, value) {
            (Some(trait_type), Some(value)) => traits.push(Trait { trait_type, value }),
            _ => {
                logger::warning(
                    LogTag::Provider,
                    &format!(
                        "Dropping trait with missing type or value on {} #{}: {}",
                        collection_id, token_id, entry
                    ),
                );
            }
        }
    }
    traits
}

/// Token id as a decimal string; accepts strings and non-negative integers
pub fn token_id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => {
            let s = s.trim();
            if s.starts_with("0x") || s.starts_with("0X") {
                hex_token_id_to_decimal(s)
            } else {
                Some(s.to_string())
            }
        }
        Value::Number(n) => n.as_u64().map(|id| id.to_string()),
        _ => None,
    }
}

/// `0x`-prefixed hex (up to 256 bits) to decimal
pub fn hex_token_id_to_decimal(hex: &str) -> Option<String> {
    let digits = hex
        .trim()
        .trim_start_matches("0x")
        .trim_start_matches("0X");
    if digits.is_empty() {
        return None;
    }
    U256::from_str_radix(digits, 16)
        .ok()
        .map(|id| id.to_string())
}

/// Counts arrive both as numbers and numeric strings
pub fn value_to_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

/// Provider-supplied rank, when present and positive
pub fn value_to_rank(value: Option<&Value>) -> Option<u32> {
    value
        .and_then(value_to_count)
        .and_then(|rank| u32::try_from(rank).ok())
        .filter(|rank| *rank > 0)
}
