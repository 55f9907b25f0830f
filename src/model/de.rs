//! Lenient field decoders for provider payloads.
//!
//! The provider is inconsistent about scalar encodings: identifiers arrive as
//! numbers or strings and unassigned links arrive as `null`, `""` or not at
//! all. These helpers normalise such fields at the decoding boundary.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Decodes an optional string, mapping `null`, `""` and numbers sensibly.
pub(super) fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(text)) if !text.trim().is_empty() => Some(text),
        Some(Value::Number(number)) => Some(number.to_string()),
        Some(_) | None => None,
    })
}

/// Decodes a size or count that may be encoded as a number or numeric string.
pub(super) fn lenient_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(number)) => number
            .as_u64()
            .and_then(|raw| u32::try_from(raw).ok())
            .ok_or_else(|| serde::de::Error::custom(format!("{number} is not a valid size"))),
        Some(Value::String(text)) => text
            .trim()
            .parse::<u32>()
            .map_err(|err| serde::de::Error::custom(format!("'{text}': {err}"))),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a number, got {other}"
        ))),
    }
}
