//! Table processor: drives one table from configuration to written rows.
//!
//! A table is either truncated, or goes through
//! `repair -> fetch -> transform -> write-back`:
//!
//! - every declared column first gets its referencing foreign keys rebuilt
//!   to cascade (see [`crate::repair`]);
//! - rows are fetched in one batch, optionally capped by the row limit;
//! - each field is transformed in declaration order;
//! - only columns that changed to a non-blank value are written back, with
//!   one `UPDATE` per row.

use crate::db::{Database, DbError, Row};
use crate::repair::{repair_column, RepairError, RepairReport};
use crate::progress::Spinner;
use crate::spec::{FieldGroup, TableDef};
use crate::transform::{self, Outcome, Value};
use ahash::AHashSet;
use rand::Rng;
use serde::Serialize;

/// Failures that stop work on a table
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// Constraint repair failed; fatal for this table only
    #[error(transparent)]
    Repair(#[from] RepairError),

    /// Unclassified database failure; the run cannot continue
    #[error(transparent)]
    Database(#[from] DbError),
}

/// (table, field kind) pairs already warned about during this run
#[derive(Debug, Default)]
pub struct WarnedKinds(AHashSet<(String, String)>);

impl WarnedKinds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the pair, returning true the first time it is seen
    pub fn first_time(&mut self, table: &str, kind: &str) -> bool {
        self.0.insert((table.to_string(), kind.to_string()))
    }
}

/// Terminal state of a table in the anonymize pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    /// All rows removed
    Truncated,
    /// Nothing declared for this table
    NoFields,
    /// Rows fetched, transformed and written
    Anonymized,
    /// Rows could not be fetched; table left as is
    Skipped,
    /// Constraint repair failed
    Failed,
}

/// Per-table statistics
#[derive(Debug, Clone, Serialize)]
pub struct TableStats {
    pub name: String,
    pub status: TableStatus,
    pub rows_fetched: u64,
    pub rows_updated: u64,
    pub columns_written: u64,
    /// Write-backs rejected for a missing parent row
    pub integrity_violations: u64,
    /// Values left unchanged because they could not be parsed
    pub invalid_values: u64,
    /// Field kinds with no transform
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unknown_kinds: Vec<String>,
    pub constraints_repaired: Vec<String>,
    pub orphans_nulled: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TableStats {
    pub fn new(name: &str, status: TableStatus) -> Self {
        Self {
            name: name.to_string(),
            status,
            rows_fetched: 0,
            rows_updated: 0,
            columns_written: 0,
            integrity_violations: 0,
            invalid_values: 0,
            unknown_kinds: Vec::new(),
            constraints_repaired: Vec::new(),
            orphans_nulled: 0,
            error: None,
        }
    }
}

/// Result of transforming one row in memory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowChanges {
    /// Columns to write, in declaration order
    pub changes: Vec<(String, String)>,
    /// Fields whose stored value could not be parsed
    pub invalid: Vec<(String, String)>,
    /// Unknown field kinds seen for the first time in this run
    pub unsupported: Vec<String>,
}

/// Apply every declared transform to `row` and collect the change-set.
///
/// `row` is updated in place, so a column declared under two kinds sees the
/// first transform's output. Values that end up blank or the literal
/// `"null"` are left out of the change-set.
pub fn anonymize_row<R: Rng>(
    table: &str,
    groups: &[FieldGroup],
    row: &mut Row,
    rng: &mut R,
    warned: &mut WarnedKinds,
) -> RowChanges {
    let mut result = RowChanges::default();
    let mut changed: Vec<&str> = Vec::new();

    for group in groups {
        for field in &group.fields {
            let column = field.column.as_str();
            let current = row.value(column);

            match transform::apply(&group.kind, field, current, rng) {
                Outcome::Keep => {}
                Outcome::Replace(value) => {
                    if current.as_str() != Some(value.as_str()) {
                        row.set(column, value);
                        if !changed.contains(&column) {
                            changed.push(column);
                        }
                    }
                }
                Outcome::Unsupported => {
                    if warned.first_time(table, group.kind.as_str()) {
                        result.unsupported.push(group.kind.to_string());
                    }
                }
                Outcome::Invalid(reason) => {
                    result.invalid.push((column.to_string(), reason));
                }
            }
        }
    }

    for column in changed {
        match row.get(column) {
            Some(value) if !transform::is_blank(Value::Text(value)) && value != "null" => {
                result.changes.push((column.to_string(), value.to_string()));
            }
            _ => {}
        }
    }

    result
}

/// Runs one table through the anonymize pass
pub struct TableProcessor<'a, D: Database + ?Sized, R: Rng> {
    db: &'a mut D,
    rng: &'a mut R,
    row_limit: Option<u64>,
    progress: bool,
}

impl<'a, D: Database + ?Sized, R: Rng + Send> TableProcessor<'a, D, R> {
    pub fn new(db: &'a mut D, rng: &'a mut R) -> Self {
        Self {
            db,
            rng,
            row_limit: None,
            progress: false,
        }
    }

    pub fn with_row_limit(mut self, row_limit: Option<u64>) -> Self {
        self.row_limit = row_limit.filter(|&n| n > 0);
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Process `table`, returning its statistics.
    ///
    /// A fetch failure is reported and yields `TableStatus::Skipped`. Write
    /// rejections for missing parent rows are counted and skipped.
    pub async fn process(
        &mut self,
        table: &TableDef,
        warned: &mut WarnedKinds,
    ) -> Result<TableStats, ProcessError> {
        let name = table.name.as_str();
        let spinner = Spinner::start(name, 2, self.progress);

        if table.is_truncate() {
            match self.db.truncate(name).await {
                Ok(()) => {}
                Err(e) if e.is_config_error() => {
                    spinner.fail();
                    report_table_error(name, &e);
                    let mut stats = TableStats::new(name, TableStatus::Skipped);
                    stats.error = Some(e.to_string());
                    return Ok(stats);
                }
                Err(e) => {
                    spinner.fail();
                    return Err(e.into());
                }
            }
            spinner.succeed_with(format!("{} (truncated)", name));
            return Ok(TableStats::new(name, TableStatus::Truncated));
        }

        let columns = table.columns();
        if columns.is_empty() {
            spinner.succeed();
            return Ok(TableStats::new(name, TableStatus::NoFields));
        }

        let mut stats = TableStats::new(name, TableStatus::Anonymized);

        let mut repaired = RepairReport::default();
        for column in &columns {
            match repair_column(&mut *self.db, name, column).await {
                Ok(report) => repaired.merge(report),
                Err(e) => {
                    spinner.fail();
                    return Err(e.into());
                }
            }
        }
        stats.orphans_nulled = repaired.orphans_nulled;
        stats.constraints_repaired = repaired.constraints;

        let mut rows = match self.db.fetch_rows(name, &columns, self.row_limit).await {
            Ok(rows) => rows,
            Err(e) => {
                spinner.fail();
                report_table_error(name, &e);
                stats.status = TableStatus::Skipped;
                stats.error = Some(e.to_string());
                return Ok(stats);
            }
        };
        spinner.succeed();
        stats.rows_fetched = rows.len() as u64;

        let spinner = Spinner::start("Anonymizing", 4, self.progress);
        let mut row_count: u64 = 0;

        for row in rows.iter_mut() {
            let result = anonymize_row(name, table.groups(), row, &mut *self.rng, warned);

            for kind in result.unsupported {
                tracing::warn!(table = name, kind = %kind, "Unknown field type: {}", kind);
                stats.unknown_kinds.push(kind);
            }
            for (column, reason) in &result.invalid {
                tracing::error!(
                    table = name,
                    column = %column,
                    "Problem with {}.{} value, left unchanged: {}",
                    name,
                    column,
                    reason
                );
            }
            stats.invalid_values += result.invalid.len() as u64;

            if !result.changes.is_empty() {
                match self.db.update_row(name, &row.uuid, &result.changes).await {
                    Ok(()) => {
                        stats.rows_updated += 1;
                        stats.columns_written += result.changes.len() as u64;
                    }
                    Err(e) if e.is_missing_parent() => {
                        tracing::error!(
                            table = name,
                            uuid = %row.uuid,
                            "Problem with foreign key referential integrity. \
                             Maybe the export row limit was set too low. ({})",
                            e
                        );
                        stats.integrity_violations += 1;
                    }
                    Err(e) => {
                        spinner.fail();
                        return Err(e.into());
                    }
                }
            }

            row_count += 1;
            spinner.set_message(format!("Anonymizing [{}]", row_count));
        }

        spinner.succeed_with(format!("{} rows", row_count));
        Ok(stats)
    }
}

fn report_table_error(table: &str, err: &DbError) {
    match err {
        DbError::UnknownColumn { message, .. } => {
            tracing::error!(
                table,
                column = err.column().unwrap_or("?"),
                "Bad column in tables config: {}",
                message
            );
        }
        DbError::UnknownTable { message, .. } => {
            tracing::error!(table, "Bad table in tables config: {}", message);
        }
        other => {
            tracing::error!(table, sql = other.sql().unwrap_or(""), "Failed to fetch rows: {}", other);
        }
    }
}
