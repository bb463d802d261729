//! Foreign-key repair ahead of anonymizing a referenced column.
//!
//! Rewriting a column that other tables reference would leave child rows
//! pointing at values that no longer exist. Before a column is touched,
//! every foreign key referencing it without `ON UPDATE CASCADE` is rebuilt:
//!
//! 1. children with no matching parent are set to NULL, so the constraint
//!    can be recreated even on data that already violates it;
//! 2. the constraint is dropped;
//! 3. it is recreated with `ON DELETE SET NULL ON UPDATE CASCADE`.
//!
//! Once a key cascades it no longer matches the lookup, so repairing the
//! same column twice is a no-op.

use crate::db::{Database, DbError, ForeignKey};
use serde::Serialize;

/// A foreign key could not be inspected or rebuilt
#[derive(Debug, thiserror::Error)]
pub enum RepairError {
    #[error("Failed to look up foreign keys referencing {table}.{column}: {source}")]
    Lookup {
        table: String,
        column: String,
        #[source]
        source: DbError,
    },

    #[error("Failed to nullify orphans for foreign key {fk}: {source}")]
    Orphans {
        fk: ForeignKey,
        #[source]
        source: DbError,
    },

    #[error("Failed to rebuild foreign key {fk}: {source}")]
    Alter {
        fk: ForeignKey,
        #[source]
        source: DbError,
    },
}

/// What a repair changed
#[derive(Debug, Clone, Default, Serialize)]
pub struct RepairReport {
    /// Constraints recreated with cascading updates
    pub constraints: Vec<String>,
    /// Child rows set to NULL because their parent was missing
    pub orphans_nulled: u64,
}

impl RepairReport {
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn merge(&mut self, other: RepairReport) {
        self.constraints.extend(other.constraints);
        self.orphans_nulled += other.orphans_nulled;
    }
}

/// Make every foreign key referencing `table.column` cascade updates
pub async fn repair_column<D>(
    db: &mut D,
    table: &str,
    column: &str,
) -> Result<RepairReport, RepairError>
where
    D: Database + ?Sized,
{
    let keys = db
        .referencing_foreign_keys(table, column)
        .await
        .map_err(|source| RepairError::Lookup {
            table: table.to_string(),
            column: column.to_string(),
            source,
        })?;

    let mut report = RepairReport::default();

    for fk in keys {
        let orphans = match db.null_orphans(&fk).await {
            Ok(n) => n,
            Err(source) => return Err(RepairError::Orphans { fk, source }),
        };
        if orphans > 0 {
            tracing::warn!(
                table = %fk.child_table,
                column = %fk.child_column,
                constraint = %fk.constraint_name,
                orphans,
                "nullified child rows with no matching parent"
            );
        }

        if let Err(source) = db.drop_foreign_key(&fk).await {
            return Err(RepairError::Alter { fk, source });
        }
        if let Err(source) = db.add_cascading_foreign_key(&fk).await {
            return Err(RepairError::Alter { fk, source });
        }

        tracing::debug!(
            constraint = %fk.constraint_name,
            child = %fk.child_table,
            parent = %fk.parent_table,
            "foreign key now cascades updates"
        );
        report.constraints.push(fk.constraint_name);
        report.orphans_nulled += orphans;
    }

    Ok(report)
}
