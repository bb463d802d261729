//! JSON transform - rewrite one text property in every element of an array.
//!
//! Used for translation blobs such as
//! `[{"language_code":"en","Description":"..."}, ...]`.

use super::text;
use crate::spec::FieldSpec;
use rand::Rng;
use serde_json::Value;

/// Rewrite `property` in each element of the JSON array `raw`.
///
/// Elements where the property is missing or blank are left alone, as are
/// non-object elements. Errors describe why `raw` could not be used.
pub fn rewrite<R: Rng>(
    raw: &str,
    property: &str,
    field: &FieldSpec,
    rng: &mut R,
) -> Result<String, String> {
    let mut value: Value = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    let items = value
        .as_array_mut()
        .ok_or_else(|| "expected a JSON array".to_string())?;

    for item in items.iter_mut() {
        let Some(object) = item.as_object_mut() else {
            continue;
        };
        let present = object.get(property).is_some_and(|v| !is_blank(v));
        if present {
            object.insert(property.to_string(), Value::String(text::generate(field, rng)));
        }
    }

    serde_json::to_string(&value).map_err(|e| e.to_string())
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Array(_) | Value::Object(_) => false,
    }
}
