//! Database access for the anonymizer.
//!
//! The pipeline talks to the target database only through the [`Database`]
//! trait. It covers the schema introspection and row mutation needed for
//! foreign-key repair, row fetch and write-back, truncation, and trigger
//! reactivation. [`MysqlDatabase`] is the production implementation.
//!
//! Calls are awaited one at a time on a single connection; `&mut self`
//! receivers make the exclusive ownership explicit.

mod mysql;

pub use mysql::MysqlDatabase;

use crate::transform::Value;
use ahash::{AHashMap, AHashSet};
use async_trait::async_trait;
use serde::Serialize;

/// Column holding the immutable row identifier in every anonymized table
pub const ROW_ID_COLUMN: &str = "uuid";

/// A fetched row: identifier plus current values of the declared columns.
///
/// Values arrive as text; `numeric` names the columns whose schema type is
/// numeric, so a stored zero there reads as blank.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    pub uuid: String,
    pub values: AHashMap<String, Option<String>>,
    pub numeric: AHashSet<String>,
}

impl Row {
    pub fn new(uuid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            values: AHashMap::new(),
            numeric: AHashSet::new(),
        }
    }

    pub fn with(mut self, column: impl Into<String>, value: Option<&str>) -> Self {
        self.values.insert(column.into(), value.map(str::to_string));
        self
    }

    /// Like [`Row::with`], for a column of numeric type
    pub fn with_number(mut self, column: impl Into<String>, value: Option<&str>) -> Self {
        let column = column.into();
        self.numeric.insert(column.clone());
        self.values.insert(column, value.map(str::to_string));
        self
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).and_then(|v| v.as_deref())
    }

    /// Current value of `column`, typed for the blank check
    pub fn value(&self, column: &str) -> Value<'_> {
        match self.get(column) {
            None => Value::Null,
            Some(v) if self.numeric.contains(column) => Value::Number(v),
            Some(v) => Value::Text(v),
        }
    }

    pub fn set(&mut self, column: &str, value: String) {
        self.values.insert(column.to_string(), Some(value));
    }
}

/// A foreign key referencing a column that is about to be rewritten
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKey {
    pub child_table: String,
    pub child_column: String,
    pub constraint_name: String,
    pub parent_table: String,
    pub parent_column: String,
    pub delete_rule: String,
    pub update_rule: String,
}

impl std::fmt::Display for ForeignKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}.{} -> {}.{}, ON DELETE {} ON UPDATE {})",
            self.constraint_name,
            self.child_table,
            self.child_column,
            self.parent_table,
            self.parent_column,
            self.delete_rule,
            self.update_rule
        )
    }
}

/// Database failures the pipeline distinguishes between
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A configured column does not exist in the live schema
    #[error("Unknown column in table '{table}': {message}")]
    UnknownColumn {
        table: String,
        column: Option<String>,
        message: String,
    },

    /// A configured table does not exist in the live schema
    #[error("Unknown table '{table}': {message}")]
    UnknownTable { table: String, message: String },

    /// A write referenced a parent row that is not there
    #[error("Foreign key referential integrity violated in '{table}': {message}")]
    MissingParent { table: String, message: String },

    /// Anything else
    #[error("{message}\nSQL: {sql}")]
    Query { message: String, sql: String },
}

impl DbError {
    pub fn query(message: impl Into<String>, sql: impl Into<String>) -> Self {
        DbError::Query {
            message: message.into(),
            sql: sql.into(),
        }
    }

    /// The tables config names a table or column the schema lacks
    pub fn is_config_error(&self) -> bool {
        matches!(self, DbError::UnknownColumn { .. } | DbError::UnknownTable { .. })
    }

    pub fn is_missing_parent(&self) -> bool {
        matches!(self, DbError::MissingParent { .. })
    }

    /// Offending column, when the server named one
    pub fn column(&self) -> Option<&str> {
        match self {
            DbError::UnknownColumn { column, .. } => column.as_deref(),
            _ => None,
        }
    }

    pub fn sql(&self) -> Option<&str> {
        match self {
            DbError::Query { sql, .. } => Some(sql),
            _ => None,
        }
    }
}

/// Capabilities the anonymizer needs from the target database
#[async_trait]
pub trait Database: Send {
    /// Foreign keys referencing `table.column` whose `ON UPDATE` is not `CASCADE`
    async fn referencing_foreign_keys(
        &mut self,
        table: &str,
        column: &str,
    ) -> Result<Vec<ForeignKey>, DbError>;

    /// Set the child column to NULL where no parent row matches; returns rows changed
    async fn null_orphans(&mut self, fk: &ForeignKey) -> Result<u64, DbError>;

    async fn drop_foreign_key(&mut self, fk: &ForeignKey) -> Result<(), DbError>;

    /// Recreate `fk` with `ON DELETE SET NULL ON UPDATE CASCADE`
    async fn add_cascading_foreign_key(&mut self, fk: &ForeignKey) -> Result<(), DbError>;

    async fn truncate(&mut self, table: &str) -> Result<(), DbError>;

    /// Row identifier plus `columns`, at most `limit` rows when set
    async fn fetch_rows(
        &mut self,
        table: &str,
        columns: &[&str],
        limit: Option<u64>,
    ) -> Result<Vec<Row>, DbError>;

    /// Write `changes` to the row addressed by `uuid`
    async fn update_row(
        &mut self,
        table: &str,
        uuid: &str,
        changes: &[(String, String)],
    ) -> Result<(), DbError>;

    async fn has_triggers(&mut self, table: &str) -> Result<bool, DbError>;

    /// No-op update of every row so row triggers fire; returns rows matched
    async fn touch_rows(&mut self, table: &str) -> Result<u64, DbError>;
}

/// Quote an identifier with backticks, doubling embedded backticks
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}
