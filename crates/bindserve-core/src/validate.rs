//! Boundary validation of raw `model_input` payloads.
//!
//! Both entry points are pure: they borrow the raw value, never mutate it, and
//! stop at the first rule that fails.
use base64::{
    Engine as _, alphabet,
    engine::{GeneralPurpose, GeneralPurposeConfig},
};
use bindserve_error::InputError;
use serde_json::Value;

use crate::{ModalityBatch, Modality, ModelInput};

/// Standard alphabet, padding required, trailing bits tolerated.
const STRICT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

const TEXT_ITEMS: &str = "a list of strings";
const BINARY_ITEMS: &str = "a list of Base64 encoded strings";

/// Validate a serializable request and decode its binary payloads.
///
/// Modalities are checked text, then vision, then audio, independent of the
/// key order in `raw`.
pub fn validate(raw: &Value) -> Result<ModelInput, InputError> {
    let map = raw.as_object().ok_or(InputError::InvalidShape {
        expected: "a JSON object",
        found: json_kind(raw),
    })?;

    if let Some(key) = map.keys().find(|k| Modality::from_key(k).is_none()) {
        return Err(InputError::UnknownKey {
            key: key.clone(),
            expected: Modality::valid_keys(),
        });
    }

    let mut input = ModelInput::new();
    for modality in Modality::ALL {
        let Some(value) = map.get(modality.as_str()) else {
            continue;
        };
        let batch = match modality {
            Modality::Text => {
                let items = string_items(modality, value, TEXT_ITEMS)?;
                ModalityBatch::Text(items.into_iter().map(str::to_owned).collect())
            }
            Modality::Vision => ModalityBatch::Vision(binary_items(modality, value)?),
            Modality::Audio => ModalityBatch::Audio(binary_items(modality, value)?),
        };
        tracing::trace!(modality = %modality, items = batch.len(), "validated batch");
        input.insert(batch);
    }
    Ok(input)
}

/// Validate a legacy request: a bare list of strings, embedded as text.
pub fn validate_legacy(raw: &Value) -> Result<Vec<String>, InputError> {
    if !raw.is_array() {
        return Err(InputError::InvalidShape {
            expected: "a JSON array of strings",
            found: json_kind(raw),
        });
    }
    let items = string_items(Modality::Text, raw, TEXT_ITEMS)?;
    Ok(items.into_iter().map(str::to_owned).collect())
}

/// True if `s` is strict, padded, standard-alphabet base64.
pub fn is_valid_base64(s: &str) -> bool {
    decode_base64(s).is_some()
}

pub fn decode_base64(s: &str) -> Option<Vec<u8>> {
    STRICT_BASE64.decode(s).ok()
}

fn string_items<'a>(
    modality: Modality,
    value: &'a Value,
    expected: &'static str,
) -> Result<Vec<&'a str>, InputError> {
    let mismatch = || InputError::TypeMismatch {
        key: modality.to_string(),
        expected,
    };
    value
        .as_array()
        .ok_or_else(mismatch)?
        .iter()
        .map(|item| item.as_str().ok_or_else(mismatch))
        .collect()
}

/// Type-check the whole list first, then decode; the first failure wins.
fn binary_items(modality: Modality, value: &Value) -> Result<Vec<Vec<u8>>, InputError> {
    string_items(modality, value, BINARY_ITEMS)?
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            decode_base64(item).ok_or_else(|| InputError::InvalidEncoding {
                key: modality.to_string(),
                index,
            })
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
