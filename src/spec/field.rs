//! Field-level configuration: the transform kind and its parameters.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::convert::Infallible;

/// Transform kind declared for a group of columns.
///
/// Keys that do not name a known transform are kept as `Unknown` so that a
/// typo in the tables file only disables that group instead of failing the
/// whole run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Zero-padded random digits
    Numbers,
    /// Lorem words or a lorem sentence
    Text,
    /// Randomized month and day, year kept
    Date,
    /// `<sha256 prefix>@example.com`
    Email,
    /// `<first name>-<sha256 prefix>`
    Username,
    /// Truncated SHA-256 hex digest
    Hash,
    /// Random first, last or full name
    Name,
    /// Text property inside a JSON array of objects
    Json,
    /// Fresh random v4 UUID
    Uuid,
    /// Anything else found in the configuration
    Unknown(String),
}

impl FieldKind {
    pub fn as_str(&self) -> &str {
        match self {
            FieldKind::Numbers => "numbers",
            FieldKind::Text => "text",
            FieldKind::Date => "date",
            FieldKind::Email => "email",
            FieldKind::Username => "username",
            FieldKind::Hash => "hash",
            FieldKind::Name => "name",
            FieldKind::Json => "json",
            FieldKind::Uuid => "uuid",
            FieldKind::Unknown(name) => name,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, FieldKind::Unknown(_))
    }
}

impl std::str::FromStr for FieldKind {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "numbers" => FieldKind::Numbers,
            "text" => FieldKind::Text,
            "date" => FieldKind::Date,
            "email" => FieldKind::Email,
            "username" => FieldKind::Username,
            "hash" => FieldKind::Hash,
            "name" => FieldKind::Name,
            "json" => FieldKind::Json,
            "uuid" => FieldKind::Uuid,
            other => FieldKind::Unknown(other.to_string()),
        })
    }
}

impl From<&str> for FieldKind {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(kind) => kind,
            Err(never) => match never {},
        }
    }
}

impl From<String> for FieldKind {
    fn from(s: String) -> Self {
        FieldKind::from(s.as_str())
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for FieldKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Size of generated text: a word count, or one sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawLength")]
pub enum Length {
    Count(usize),
    Sentence,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLength {
    Count(usize),
    Keyword(String),
}

impl TryFrom<RawLength> for Length {
    type Error = String;

    fn try_from(raw: RawLength) -> Result<Self, Self::Error> {
        match raw {
            RawLength::Count(n) => Ok(Length::Count(n)),
            RawLength::Keyword(k) if k.eq_ignore_ascii_case("sentence") => Ok(Length::Sentence),
            RawLength::Keyword(k) => Err(format!(
                "Invalid length: {}. Use a number or \"sentence\"",
                k
            )),
        }
    }
}

/// Which part of a person's name the `name` transform produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameType {
    First,
    Last,
    #[default]
    Full,
}

/// One column to anonymize, with transform parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldSpec {
    /// Target column
    pub column: String,
    /// Digit count, word count, hash length, or `"sentence"`
    #[serde(default)]
    pub length: Option<Length>,
    /// Name part for the `name` transform
    #[serde(default, rename = "type")]
    pub name_type: Option<NameType>,
    /// JSON property to rewrite for the `json` transform
    #[serde(default)]
    pub property: Option<String>,
    /// Values that are never anonymized (e.g. `admin`)
    #[serde(default)]
    pub skip: HashSet<String>,
}

impl FieldSpec {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ..Default::default()
        }
    }

    pub fn with_length(mut self, length: Length) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_name_type(mut self, name_type: NameType) -> Self {
        self.name_type = Some(name_type);
        self
    }

    pub fn with_property(mut self, property: impl Into<String>) -> Self {
        self.property = Some(property.into());
        self
    }

    pub fn with_skip<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip.extend(values.into_iter().map(Into::into));
        self
    }

    /// Digit or word count; zero and unset both mean one.
    pub fn count(&self) -> usize {
        match self.length {
            Some(Length::Count(n)) if n > 0 => n,
            _ => 1,
        }
    }

    pub fn is_sentence(&self) -> bool {
        matches!(self.length, Some(Length::Sentence))
    }
}
