//! MySQL / MariaDB implementation of [`Database`] on sqlx.

use super::{quote_ident, Database, DbError, ForeignKey, Row, ROW_ID_COLUMN};
use crate::config::DbInfo;
use ahash::{AHashMap, AHashSet};
use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlDatabaseError, MySqlPoolOptions};
use sqlx::{ConnectOptions, MySql, Pool, Row as _};
use std::time::Duration;

// Server error numbers the pipeline reacts to
const ER_BAD_FIELD_ERROR: u16 = 1054;
const ER_NO_SUCH_TABLE: u16 = 1146;
const ER_NO_REFERENCED_ROW: u16 = 1216;
const ER_NO_REFERENCED_ROW_2: u16 = 1452;

const REFERENCING_FK_SQL: &str = r#"
    SELECT
        k.TABLE_NAME,
        k.COLUMN_NAME,
        k.CONSTRAINT_NAME,
        k.REFERENCED_TABLE_NAME,
        k.REFERENCED_COLUMN_NAME,
        r.DELETE_RULE,
        r.UPDATE_RULE
    FROM
        INFORMATION_SCHEMA.KEY_COLUMN_USAGE k
        JOIN INFORMATION_SCHEMA.REFERENTIAL_CONSTRAINTS r
            USING (CONSTRAINT_CATALOG, CONSTRAINT_SCHEMA, CONSTRAINT_NAME)
    WHERE
        k.TABLE_SCHEMA = ?
        AND k.TABLE_NAME IS NOT NULL
        AND k.REFERENCED_TABLE_NAME = ?
        AND k.REFERENCED_COLUMN_NAME = ?
        AND r.UPDATE_RULE != 'CASCADE'
    ORDER BY k.TABLE_NAME
"#;

const TRIGGER_COUNT_SQL: &str = r#"
    SELECT COUNT(*)
    FROM INFORMATION_SCHEMA.TRIGGERS
    WHERE EVENT_OBJECT_SCHEMA = ? AND EVENT_OBJECT_TABLE = ?
"#;

const NUMERIC_COLUMNS_SQL: &str = r#"
    SELECT COLUMN_NAME
    FROM INFORMATION_SCHEMA.COLUMNS
    WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
        AND DATA_TYPE IN (
            'tinyint', 'smallint', 'mediumint', 'int', 'integer', 'bigint',
            'decimal', 'numeric', 'float', 'double', 'real', 'bit', 'year'
        )
"#;

/// Connection to the anonymization target
pub struct MysqlDatabase {
    pool: Pool<MySql>,
    schema: String,
}

impl MysqlDatabase {
    /// Connect to `schema` on the server described by `info`.
    ///
    /// The pool holds a single connection: no two statements are ever in
    /// flight. Statement logging is only enabled for debug/trace runs.
    pub async fn connect(info: &DbInfo, schema: &str, log_statements: bool) -> anyhow::Result<Self> {
        tracing::info!(host = %info.host, port = info.port, schema, "connecting to mysql");

        let mut options = MySqlConnectOptions::new()
            .host(&info.host)
            .port(info.port)
            .username(&info.user)
            .database(schema)
            .log_slow_statements(log::LevelFilter::Info, Duration::from_secs(1));
        if let Some(password) = &info.password {
            options = options.password(password);
        }
        if !log_statements {
            options = options.disable_statement_logging();
        }

        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Ok(Self {
            pool,
            schema: schema.to_string(),
        })
    }

    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Columns of `table` declared with a numeric type
    async fn numeric_columns(&self, table: &str) -> Result<AHashSet<String>, DbError> {
        let names: Vec<String> = sqlx::query_scalar(NUMERIC_COLUMNS_SQL)
            .bind(&self.schema)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| classify(e, table, NUMERIC_COLUMNS_SQL))?;
        Ok(names.into_iter().collect())
    }

    async fn execute(&self, sql: &str, table: &str) -> Result<u64, DbError> {
        sqlx::query(sql)
            .execute(&self.pool)
            .await
            .map(|r| r.rows_affected())
            .map_err(|e| classify(e, table, sql))
    }
}

#[async_trait]
impl Database for MysqlDatabase {
    async fn referencing_foreign_keys(
        &mut self,
        table: &str,
        column: &str,
    ) -> Result<Vec<ForeignKey>, DbError> {
        let rows = sqlx::query(REFERENCING_FK_SQL)
            .bind(&self.schema)
            .bind(table)
            .bind(column)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| classify(e, table, REFERENCING_FK_SQL))?;

        let mut keys = Vec::with_capacity(rows.len());
        for row in rows {
            let get = |name: &str| -> Result<String, DbError> {
                row.try_get::<String, _>(name)
                    .map_err(|e| DbError::query(e.to_string(), REFERENCING_FK_SQL))
            };
            keys.push(ForeignKey {
                child_table: get("TABLE_NAME")?,
                child_column: get("COLUMN_NAME")?,
                constraint_name: get("CONSTRAINT_NAME")?,
                parent_table: get("REFERENCED_TABLE_NAME")?,
                parent_column: get("REFERENCED_COLUMN_NAME")?,
                delete_rule: get("DELETE_RULE")?,
                update_rule: get("UPDATE_RULE")?,
            });
        }
        Ok(keys)
    }

    async fn null_orphans(&mut self, fk: &ForeignKey) -> Result<u64, DbError> {
        let child_col = quote_ident(&fk.child_column);
        let parent_col = quote_ident(&fk.parent_column);
        let sql = format!(
            "UPDATE {child} a LEFT JOIN {parent} b ON a.{cc} = b.{pc} \
             SET a.{cc} = NULL \
             WHERE a.{cc} IS NOT NULL AND b.{pc} IS NULL",
            child = quote_ident(&fk.child_table),
            parent = quote_ident(&fk.parent_table),
            cc = child_col,
            pc = parent_col,
        );
        self.execute(&sql, &fk.child_table).await
    }

    async fn drop_foreign_key(&mut self, fk: &ForeignKey) -> Result<(), DbError> {
        let sql = format!(
            "ALTER TABLE {} DROP FOREIGN KEY {}",
            quote_ident(&fk.child_table),
            quote_ident(&fk.constraint_name)
        );
        self.execute(&sql, &fk.child_table).await.map(|_| ())
    }

    async fn add_cascading_foreign_key(&mut self, fk: &ForeignKey) -> Result<(), DbError> {
        let sql = format!(
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) \
             ON DELETE SET NULL ON UPDATE CASCADE",
            quote_ident(&fk.child_table),
            quote_ident(&fk.constraint_name),
            quote_ident(&fk.child_column),
            quote_ident(&fk.parent_table),
            quote_ident(&fk.parent_column)
        );
        self.execute(&sql, &fk.child_table).await.map(|_| ())
    }

    async fn truncate(&mut self, table: &str) -> Result<(), DbError> {
        let sql = format!("TRUNCATE TABLE {}", quote_ident(table));
        self.execute(&sql, table).await.map(|_| ())
    }

    async fn fetch_rows(
        &mut self,
        table: &str,
        columns: &[&str],
        limit: Option<u64>,
    ) -> Result<Vec<Row>, DbError> {
        let sql = select_sql(table, columns, limit);
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| classify(e, table, &sql))?;

        let declared = self.numeric_columns(table).await?;
        let numeric: AHashSet<String> = columns
            .iter()
            .filter(|c| declared.contains(**c))
            .map(|c| c.to_string())
            .collect();

        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            let uuid: Option<String> = row
                .try_get(0)
                .map_err(|e| DbError::query(e.to_string(), sql.as_str()))?;
            let Some(uuid) = uuid else {
                tracing::warn!(table, "row without {} skipped", ROW_ID_COLUMN);
                continue;
            };

            let mut values = AHashMap::with_capacity(columns.len());
            for (i, column) in columns.iter().enumerate() {
                let value: Option<String> = row
                    .try_get(i + 1)
                    .map_err(|e| DbError::query(e.to_string(), sql.as_str()))?;
                values.insert(column.to_string(), value);
            }
            result.push(Row {
                uuid,
                values,
                numeric: numeric.clone(),
            });
        }
        Ok(result)
    }

    async fn update_row(
        &mut self,
        table: &str,
        uuid: &str,
        changes: &[(String, String)],
    ) -> Result<(), DbError> {
        let assignments: Vec<String> = changes
            .iter()
            .map(|(column, _)| format!("{} = ?", quote_ident(column)))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            quote_ident(table),
            assignments.join(", "),
            quote_ident(ROW_ID_COLUMN)
        );

        let mut query = sqlx::query(&sql);
        for (_, value) in changes {
            query = query.bind(value);
        }
        query
            .bind(uuid)
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| classify(e, table, &sql))
    }

    async fn has_triggers(&mut self, table: &str) -> Result<bool, DbError> {
        let count: i64 = sqlx::query_scalar(TRIGGER_COUNT_SQL)
            .bind(&self.schema)
            .bind(table)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| classify(e, table, TRIGGER_COUNT_SQL))?;
        Ok(count > 0)
    }

    async fn touch_rows(&mut self, table: &str) -> Result<u64, DbError> {
        let id = quote_ident(ROW_ID_COLUMN);
        let sql = format!("UPDATE {} SET {} = {}", quote_ident(table), id, id);
        self.execute(&sql, table).await
    }
}

/// Values are read as text so every column type flows through the same
/// transforms; MySQL converts them back on write. Numeric columns are
/// looked up separately so their zeros still read as blank.
fn select_sql(table: &str, columns: &[&str], limit: Option<u64>) -> String {
    let mut select = vec![format!(
        "CAST({id} AS CHAR) AS {id}",
        id = quote_ident(ROW_ID_COLUMN)
    )];
    select.extend(columns.iter().map(|c| {
        let c = quote_ident(c);
        format!("CAST({c} AS CHAR) AS {c}")
    }));

    let mut sql = format!("SELECT {} FROM {}", select.join(", "), quote_ident(table));
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    sql
}

/// Map server errors onto the cases the pipeline handles differently
fn classify(err: sqlx::Error, table: &str, sql: &str) -> DbError {
    if let sqlx::Error::Database(db_err) = &err {
        if let Some(mysql_err) = db_err.try_downcast_ref::<MySqlDatabaseError>() {
            let message = mysql_err.message().to_string();
            match mysql_err.number() {
                ER_BAD_FIELD_ERROR => {
                    return DbError::UnknownColumn {
                        table: table.to_string(),
                        column: first_quoted(&message),
                        message,
                    }
                }
                ER_NO_SUCH_TABLE => {
                    return DbError::UnknownTable {
                        table: table.to_string(),
                        message,
                    }
                }
                ER_NO_REFERENCED_ROW | ER_NO_REFERENCED_ROW_2 => {
                    return DbError::MissingParent {
                        table: table.to_string(),
                        message,
                    }
                }
                _ => {}
            }
        }
    }
    DbError::query(err.to_string(), sql)
}

/// `Unknown column 'Phone' in 'field list'` -> `Phone`
fn first_quoted(message: &str) -> Option<String> {
    let start = message.find('\'')? + 1;
    let len = message[start..].find('\'')?;
    Some(message[start..start + len].to_string())
}
