//! Table specification: which tables are anonymized, and how.
//!
//! The table plan is an ordered list of tables. Each table is either
//! truncated outright or carries groups of fields keyed by transform kind.
//! Order matters only for run ordering, so it is kept exactly as written in
//! the YAML file.

mod field;

pub use field::{FieldKind, FieldSpec, Length, NameType};

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fields sharing one transform kind
#[derive(Debug, Clone)]
pub struct FieldGroup {
    pub kind: FieldKind,
    pub fields: Vec<FieldSpec>,
}

/// What to do with one table
#[derive(Debug, Clone)]
pub enum TableEntry {
    /// Disposable operational state: empty the table
    Truncate,
    /// Anonymize the listed fields, in group order
    Fields(Vec<FieldGroup>),
}

/// A named table in the plan
#[derive(Debug, Clone)]
pub struct TableDef {
    pub name: String,
    pub entry: TableEntry,
}

impl TableDef {
    pub fn truncate(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entry: TableEntry::Truncate,
        }
    }

    pub fn fields(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entry: TableEntry::Fields(Vec::new()),
        }
    }

    /// Append a field under `kind`, merging with an existing group of that kind
    pub fn with_field(mut self, kind: impl Into<FieldKind>, field: FieldSpec) -> Self {
        let kind = kind.into();
        if let TableEntry::Fields(groups) = &mut self.entry {
            match groups.iter_mut().find(|g| g.kind == kind) {
                Some(group) => group.fields.push(field),
                None => groups.push(FieldGroup {
                    kind,
                    fields: vec![field],
                }),
            }
        }
        self
    }

    pub fn is_truncate(&self) -> bool {
        matches!(self.entry, TableEntry::Truncate)
    }

    pub fn groups(&self) -> &[FieldGroup] {
        match &self.entry {
            TableEntry::Truncate => &[],
            TableEntry::Fields(groups) => groups,
        }
    }

    /// Declared columns across all groups, de-duplicated, in declaration order
    pub fn columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = Vec::new();
        for group in self.groups() {
            for field in &group.fields {
                if !columns.contains(&field.column.as_str()) {
                    columns.push(&field.column);
                }
            }
        }
        columns
    }
}

/// Ordered table specification
#[derive(Debug, Clone, Default)]
pub struct TableSpec {
    tables: Vec<TableDef>,
}

impl TableSpec {
    pub fn new(tables: Vec<TableDef>) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &[TableDef] {
        &self.tables
    }

    pub fn get(&self, name: &str) -> Option<&TableDef> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TableDef> {
        self.tables.iter()
    }

    /// Number of declared fields across all tables
    pub fn field_count(&self) -> usize {
        self.tables
            .iter()
            .flat_map(|t| t.groups())
            .map(|g| g.fields.len())
            .sum()
    }

    /// Check the plan for mistakes that would silently disable work
    pub fn validate(&self) -> Vec<SpecIssue> {
        let mut issues = Vec::new();

        for table in &self.tables {
            let mut seen: Vec<&str> = Vec::new();

            for group in table.groups() {
                if !group.kind.is_known() {
                    issues.push(SpecIssue::new(
                        &table.name,
                        None,
                        format!("Unknown field type: {}", group.kind),
                    ));
                }

                for field in &group.fields {
                    let column = field.column.as_str();
                    if column.trim().is_empty() {
                        issues.push(SpecIssue::new(
                            &table.name,
                            None,
                            format!("Empty column name in '{}' fields", group.kind),
                        ));
                        continue;
                    }

                    if seen.contains(&column) {
                        issues.push(SpecIssue::new(
                            &table.name,
                            Some(column),
                            "Column is declared more than once".to_string(),
                        ));
                    }
                    seen.push(column);

                    match group.kind {
                        FieldKind::Numbers | FieldKind::Hash if field.is_sentence() => {
                            issues.push(SpecIssue::new(
                                &table.name,
                                Some(column),
                                format!("Length \"sentence\" is not valid for '{}'", group.kind),
                            ));
                        }
                        FieldKind::Json => {
                            let blank = field.property.as_deref().map_or(true, str::is_empty);
                            if blank {
                                issues.push(SpecIssue::new(
                                    &table.name,
                                    Some(column),
                                    "JSON field has no property to anonymize".to_string(),
                                ));
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        issues
    }
}

/// A problem found while validating the plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpecIssue {
    pub table: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub message: String,
}

impl SpecIssue {
    fn new(table: &str, column: Option<&str>, message: String) -> Self {
        Self {
            table: table.to_string(),
            column: column.map(str::to_string),
            message,
        }
    }
}

impl fmt::Display for SpecIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.column {
            Some(column) => write!(f, "{}.{}: {}", self.table, column, self.message),
            None => write!(f, "{}: {}", self.table, self.message),
        }
    }
}

impl<'de> Deserialize<'de> for TableSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TableSpecVisitor;

        impl<'de> Visitor<'de> for TableSpecVisitor {
            type Value = TableSpec;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of table names to table entries")
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(TableSpec::default())
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut tables: Vec<TableDef> = Vec::new();
                while let Some(name) = map.next_key::<String>()? {
                    if tables.iter().any(|t| t.name == name) {
                        return Err(de::Error::custom(format!("duplicate table: {}", name)));
                    }
                    let entry = map.next_value::<TableEntry>()?;
                    tables.push(TableDef { name, entry });
                }
                Ok(TableSpec { tables })
            }
        }

        deserializer.deserialize_any(TableSpecVisitor)
    }
}

impl<'de> Deserialize<'de> for TableEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TableEntryVisitor;

        impl<'de> Visitor<'de> for TableEntryVisitor {
            type Value = TableEntry;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of field types, or `truncate: true`")
            }

            // `SomeTable:` with nothing under it is a trigger-only entry
            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(TableEntry::Fields(Vec::new()))
            }

            fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(TableEntry::Fields(Vec::new()))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut truncate = false;
                let mut groups: Vec<FieldGroup> = Vec::new();

                while let Some(key) = map.next_key::<String>()? {
                    if key == "truncate" {
                        truncate = map.next_value::<bool>()?;
                        continue;
                    }
                    let fields = map.next_value::<Option<Vec<FieldSpec>>>()?;
                    groups.push(FieldGroup {
                        kind: FieldKind::from(key),
                        fields: fields.unwrap_or_default(),
                    });
                }

                if truncate {
                    Ok(TableEntry::Truncate)
                } else {
                    Ok(TableEntry::Fields(groups))
                }
            }
        }

        deserializer.deserialize_any(TableEntryVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_field_merges_groups() {
        let table = TableDef::fields("AB_Profile_Person")
            .with_field("name", FieldSpec::new("Given Name").with_name_type(NameType::First))
            .with_field("date", FieldSpec::new("Birth Date"))
            .with_field("name", FieldSpec::new("Surname").with_name_type(NameType::Last));

        assert_eq!(table.groups().len(), 2);
        assert_eq!(table.groups()[0].kind, FieldKind::Name);
        assert_eq!(table.groups()[0].fields.len(), 2);
        assert_eq!(table.columns(), vec!["Given Name", "Surname", "Birth Date"]);
    }

    #[test]
    fn test_truncate_has_no_columns() {
        let table = TableDef::truncate("AB_Feedback").with_field("text", FieldSpec::new("Body"));
        assert!(table.is_truncate());
        assert!(table.groups().is_empty());
        assert!(table.columns().is_empty());
    }

    #[test]
    fn test_columns_deduplicated() {
        let table = TableDef::fields("SITE_USER")
            .with_field("email", FieldSpec::new("login"))
            .with_field("hash", FieldSpec::new("login"));
        assert_eq!(table.columns(), vec!["login"]);
    }

    #[test]
    fn test_issue_display() {
        let spec = TableSpec::new(vec![
            TableDef::fields("T").with_field("phone", FieldSpec::new("c")),
        ]);
        let issues = spec.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].to_string(), "T: Unknown field type: phone");
    }
}
