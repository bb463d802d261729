//! Value transforms for anonymizing column data.
//!
//! One transform per field kind:
//! - `numbers`: zero-padded random digits of a fixed length
//! - `text`: lorem words, or one lorem sentence
//! - `date`: same year, random month and day
//! - `email`: `<sha256 prefix>@example.com`
//! - `username`: `<first name>-<sha256 prefix>`
//! - `hash`: truncated SHA-256 hex digest
//! - `name`: random first, last or full name
//! - `json`: rewrite a text property in each element of a JSON array
//! - `uuid`: fresh random UUID
//!
//! [`apply`] never logs and keeps no state. Randomness comes from the
//! caller's RNG, which makes seeded runs reproducible.

pub mod date;
pub mod digest;
pub mod json;
pub mod name;
pub mod numbers;
pub mod text;
pub mod uuid;

use crate::spec::{FieldKind, FieldSpec, Length};
use rand::Rng;

/// Result of transforming one column value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Leave the stored value as is (blank, skip-listed, or nothing to do)
    Keep,
    /// Write this value instead
    Replace(String),
    /// The field kind has no transform
    Unsupported,
    /// The stored value could not be parsed; it stays unchanged
    Invalid(String),
}

/// A stored column value as read from the database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value<'a> {
    Null,
    /// Character data, including dates and JSON
    Text(&'a str),
    /// Rendering of a numeric column
    Number(&'a str),
}

impl<'a> Value<'a> {
    pub fn as_str(&self) -> Option<&'a str> {
        match *self {
            Value::Null => None,
            Value::Text(v) | Value::Number(v) => Some(v),
        }
    }
}

/// Falsy column values are never anonymized: NULL, empty text, or a
/// numeric column holding zero. Text such as `"000"` is not falsy.
pub fn is_blank(value: Value<'_>) -> bool {
    match value {
        Value::Null => true,
        Value::Text(v) => v.is_empty(),
        Value::Number(v) => v.is_empty() || v.trim().parse::<f64>().is_ok_and(|n| n == 0.0),
    }
}

/// Transform `value` according to `kind` and the field's parameters
pub fn apply<R: Rng>(
    kind: &FieldKind,
    field: &FieldSpec,
    value: Value<'_>,
    rng: &mut R,
) -> Outcome {
    let current = match value.as_str() {
        Some(v) if !is_blank(value) => v,
        _ => return Outcome::Keep,
    };
    if field.skip.contains(current) {
        return Outcome::Keep;
    }
    if !kind.is_known() {
        return Outcome::Unsupported;
    }

    match kind {
        FieldKind::Numbers => Outcome::Replace(numbers::generate(field.count(), rng)),
        FieldKind::Text => Outcome::Replace(text::generate(field, rng)),
        FieldKind::Date => match date::randomize(current, rng) {
            Ok(v) => Outcome::Replace(v),
            Err(e) => Outcome::Invalid(e),
        },
        FieldKind::Email => Outcome::Replace(digest::email(current)),
        FieldKind::Username => Outcome::Replace(digest::username(current, rng)),
        FieldKind::Hash => {
            let length = match field.length {
                Some(Length::Count(n)) => Some(n),
                _ => None,
            };
            Outcome::Replace(digest::hash(current, length))
        }
        FieldKind::Name => {
            Outcome::Replace(name::generate(field.name_type.unwrap_or_default(), rng))
        }
        FieldKind::Json => {
            let Some(property) = field.property.as_deref().filter(|p| !p.is_empty()) else {
                return Outcome::Keep;
            };
            match json::rewrite(current, property, field, rng) {
                Ok(v) => Outcome::Replace(v),
                Err(e) => Outcome::Invalid(e),
            }
        }
        FieldKind::Uuid => Outcome::Replace(uuid::generate(rng)),
        FieldKind::Unknown(_) => Outcome::Unsupported,
    }
}
