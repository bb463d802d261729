//! In-memory `Database` used by the integration tests.
//!
//! Models just enough of MySQL for the pipeline: tables with a `uuid` key,
//! single-column foreign keys that either restrict or cascade on update,
//! per-table triggers, and the server errors the pipeline classifies.

#![allow(dead_code)]

use async_trait::async_trait;
use sql_anonymizer::db::{Database, DbError, ForeignKey, Row};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Default)]
pub struct MemTable {
    pub columns: Vec<String>,
    /// Columns declared with a numeric type
    pub numeric: HashSet<String>,
    pub rows: Vec<Row>,
    pub triggers: bool,
}

#[derive(Debug, Default)]
pub struct MemoryDatabase {
    pub tables: BTreeMap<String, MemTable>,
    pub foreign_keys: Vec<ForeignKey>,
    /// Every mutating call, in order
    pub log: Vec<String>,
    /// Constraint names whose re-creation fails
    pub fail_alter: HashSet<String>,
    /// Tables where every update fails with an unclassified error
    pub broken: HashSet<String>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, name: &str, columns: &[&str]) -> Self {
        self.tables.insert(
            name.to_string(),
            MemTable {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                ..Default::default()
            },
        );
        self
    }

    pub fn numeric(mut self, table: &str, columns: &[&str]) -> Self {
        let t = self
            .tables
            .get_mut(table)
            .expect("table must be declared before its column types");
        t.numeric.extend(columns.iter().map(|c| c.to_string()));
        self
    }

    pub fn row(mut self, table: &str, uuid: &str, values: &[(&str, Option<&str>)]) -> Self {
        let mut row = Row::new(uuid);
        for (column, value) in values {
            row = row.with(*column, *value);
        }
        self.tables
            .get_mut(table)
            .expect("table must be declared before its rows")
            .rows
            .push(row);
        self
    }

    /// Restricting single-column foreign key
    pub fn foreign_key(
        mut self,
        name: &str,
        child: (&str, &str),
        parent: (&str, &str),
    ) -> Self {
        self.foreign_keys.push(ForeignKey {
            child_table: child.0.to_string(),
            child_column: child.1.to_string(),
            constraint_name: name.to_string(),
            parent_table: parent.0.to_string(),
            parent_column: parent.1.to_string(),
            delete_rule: "RESTRICT".to_string(),
            update_rule: "RESTRICT".to_string(),
        });
        self
    }

    pub fn trigger(mut self, table: &str) -> Self {
        if let Some(t) = self.tables.get_mut(table) {
            t.triggers = true;
        }
        self
    }

    pub fn fail_alter(mut self, constraint: &str) -> Self {
        self.fail_alter.insert(constraint.to_string());
        self
    }

    pub fn broken(mut self, table: &str) -> Self {
        self.broken.insert(table.to_string());
        self
    }

    pub fn rows(&self, table: &str) -> &[Row] {
        &self.tables[table].rows
    }

    pub fn value(&self, table: &str, uuid: &str, column: &str) -> Option<&str> {
        self.tables[table]
            .rows
            .iter()
            .find(|r| r.uuid == uuid)
            .and_then(|r| r.get(column))
    }

    pub fn constraint(&self, name: &str) -> Option<&ForeignKey> {
        self.foreign_keys.iter().find(|fk| fk.constraint_name == name)
    }

    pub fn log_starting_with(&self, prefix: &str) -> Vec<&String> {
        self.log.iter().filter(|l| l.starts_with(prefix)).collect()
    }

    fn table_ref(&self, table: &str) -> Result<&MemTable, DbError> {
        self.tables.get(table).ok_or_else(|| DbError::UnknownTable {
            table: table.to_string(),
            message: format!("Table 'anon.{}' doesn't exist", table),
        })
    }

    fn table_mut(&mut self, table: &str) -> Result<&mut MemTable, DbError> {
        self.tables.get_mut(table).ok_or_else(|| DbError::UnknownTable {
            table: table.to_string(),
            message: format!("Table 'anon.{}' doesn't exist", table),
        })
    }

    fn parent_has(&self, fk: &ForeignKey, value: &str) -> bool {
        self.tables
            .get(&fk.parent_table)
            .is_some_and(|t| t.rows.iter().any(|r| r.get(&fk.parent_column) == Some(value)))
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn referencing_foreign_keys(
        &mut self,
        table: &str,
        column: &str,
    ) -> Result<Vec<ForeignKey>, DbError> {
        Ok(self
            .foreign_keys
            .iter()
            .filter(|fk| {
                fk.parent_table == table && fk.parent_column == column && fk.update_rule != "CASCADE"
            })
            .cloned()
            .collect())
    }

    async fn null_orphans(&mut self, fk: &ForeignKey) -> Result<u64, DbError> {
        let parent_values: HashSet<String> = self
            .table_ref(&fk.parent_table)?
            .rows
            .iter()
            .filter_map(|r| r.get(&fk.parent_column).map(str::to_string))
            .collect();

        let child = self.table_mut(&fk.child_table)?;
        let mut nulled = 0;
        for row in child.rows.iter_mut() {
            let orphan = row
                .get(&fk.child_column)
                .is_some_and(|v| !parent_values.contains(v));
            if orphan {
                row.values.insert(fk.child_column.clone(), None);
                nulled += 1;
            }
        }
        self.log.push(format!("NULL_ORPHANS {}", fk.constraint_name));
        Ok(nulled)
    }

    async fn drop_foreign_key(&mut self, fk: &ForeignKey) -> Result<(), DbError> {
        self.foreign_keys.retain(|k| {
            !(k.constraint_name == fk.constraint_name && k.child_table == fk.child_table)
        });
        self.log.push(format!("DROP_FK {}", fk.constraint_name));
        Ok(())
    }

    async fn add_cascading_foreign_key(&mut self, fk: &ForeignKey) -> Result<(), DbError> {
        if self.fail_alter.contains(&fk.constraint_name) {
            return Err(DbError::query(
                "Cannot add foreign key constraint",
                format!("ALTER TABLE `{}` ADD CONSTRAINT ...", fk.child_table),
            ));
        }
        self.foreign_keys.push(ForeignKey {
            delete_rule: "SET NULL".to_string(),
            update_rule: "CASCADE".to_string(),
            ..fk.clone()
        });
        self.log.push(format!("ADD_FK {}", fk.constraint_name));
        Ok(())
    }

    async fn truncate(&mut self, table: &str) -> Result<(), DbError> {
        self.table_mut(table)?.rows.clear();
        self.log.push(format!("TRUNCATE {}", table));
        Ok(())
    }

    async fn fetch_rows(
        &mut self,
        table: &str,
        columns: &[&str],
        limit: Option<u64>,
    ) -> Result<Vec<Row>, DbError> {
        let t = self.table_ref(table)?;
        if let Some(missing) = columns.iter().find(|c| !t.columns.iter().any(|tc| tc == *c)) {
            return Err(DbError::UnknownColumn {
                table: table.to_string(),
                column: Some(missing.to_string()),
                message: format!("Unknown column '{}' in 'field list'", missing),
            });
        }

        let take = limit.map_or(usize::MAX, |n| n as usize);
        Ok(t.rows
            .iter()
            .take(take)
            .map(|stored| {
                columns.iter().fold(Row::new(stored.uuid.clone()), |row, c| {
                    if t.numeric.contains(*c) {
                        row.with_number(*c, stored.get(c))
                    } else {
                        row.with(*c, stored.get(c))
                    }
                })
            })
            .collect())
    }

    async fn update_row(
        &mut self,
        table: &str,
        uuid: &str,
        changes: &[(String, String)],
    ) -> Result<(), DbError> {
        if self.broken.contains(table) {
            return Err(DbError::query("Lost connection to MySQL server", "UPDATE ..."));
        }

        for (column, value) in changes {
            let restricting = self
                .foreign_keys
                .iter()
                .find(|fk| fk.child_table == table && fk.child_column == *column);
            if let Some(fk) = restricting {
                if !self.parent_has(fk, value) {
                    return Err(DbError::MissingParent {
                        table: table.to_string(),
                        message: format!(
                            "Cannot add or update a child row: a foreign key constraint fails ({})",
                            fk.constraint_name
                        ),
                    });
                }
            }
        }

        let mut cascades: Vec<(String, String, String)> = Vec::new();
        {
            let row = self
                .table_mut(table)?
                .rows
                .iter_mut()
                .find(|r| r.uuid == uuid)
                .ok_or_else(|| DbError::query("row not found", "UPDATE ..."))?;
            for (column, value) in changes {
                if let Some(old) = row.get(column).map(str::to_string) {
                    cascades.push((column.clone(), old, value.clone()));
                }
                row.set(column, value.clone());
            }
        }

        for (column, old, new) in cascades {
            let children: Vec<ForeignKey> = self
                .foreign_keys
                .iter()
                .filter(|fk| {
                    fk.parent_table == table
                        && fk.parent_column == column
                        && fk.update_rule == "CASCADE"
                })
                .cloned()
                .collect();
            for fk in children {
                if let Some(child) = self.tables.get_mut(&fk.child_table) {
                    for row in child.rows.iter_mut() {
                        if row.get(&fk.child_column) == Some(old.as_str()) {
                            row.set(&fk.child_column, new.clone());
                        }
                    }
                }
            }
        }

        let columns: Vec<&str> = changes.iter().map(|(c, _)| c.as_str()).collect();
        self.log
            .push(format!("UPDATE {} {} {}", table, uuid, columns.join(",")));
        Ok(())
    }

    async fn has_triggers(&mut self, table: &str) -> Result<bool, DbError> {
        Ok(self.table_ref(table)?.triggers)
    }

    async fn touch_rows(&mut self, table: &str) -> Result<u64, DbError> {
        let count = self.table_ref(table)?.rows.len() as u64;
        self.log.push(format!("TOUCH {}", table));
        Ok(count)
    }
}
