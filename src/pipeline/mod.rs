//! Two-pass anonymization run over the whole tables config.
//!
//! Pass 1 runs the [`TableProcessor`] for each table in file order. Pass 2
//! re-touches every row of tables that own triggers, so that columns derived
//! by those triggers are recomputed from the anonymized data.

use crate::db::{Database, DbError};
use crate::processor::{ProcessError, TableProcessor, TableStats, TableStatus, WarnedKinds};
use crate::progress::Spinner;
use crate::spec::TableSpec;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

/// Knobs for a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Max rows per table (`None` = unbounded)
    pub row_limit: Option<u64>,
    /// Seed for reproducible output
    pub seed: Option<u64>,
    /// Abort on the first table whose constraints could not be repaired
    pub fail_fast: bool,
    /// Draw spinners on stderr
    pub progress: bool,
}

/// Statistics for a whole run
#[derive(Debug, Default, Serialize)]
pub struct RunStats {
    /// Number of tables processed in pass 1
    pub tables_processed: usize,
    /// Number of rows written back
    pub rows_updated: u64,
    /// Per-table statistics, in run order
    pub table_stats: Vec<TableStats>,
    /// Tables whose rows were re-touched in pass 2
    pub triggers_touched: Vec<String>,
    /// Warning messages
    pub warnings: Vec<String>,
    /// Tables that failed constraint repair
    pub failed_tables: Vec<String>,
    /// Both passes ran to the end
    pub completed: bool,
}

impl RunStats {
    /// Both passes completed without a table failure
    pub fn is_success(&self) -> bool {
        self.completed && self.failed_tables.is_empty()
    }
}

/// Runs both passes against one target database
pub struct Pipeline<'a, D: Database + ?Sized> {
    db: &'a mut D,
    tables: &'a TableSpec,
    options: PipelineOptions,
    stats: RunStats,
}

impl<'a, D: Database + ?Sized> Pipeline<'a, D> {
    pub fn new(db: &'a mut D, tables: &'a TableSpec, options: PipelineOptions) -> Self {
        Self {
            db,
            tables,
            options,
            stats: RunStats::default(),
        }
    }

    /// Run pass 1 then pass 2.
    ///
    /// Table failures are recorded in the returned stats unless `fail_fast`
    /// is set. Unclassified database errors end the run with `Err`.
    pub async fn run(&mut self) -> anyhow::Result<RunStats> {
        let mut rng = match self.options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        self.phase("1st pass: Anonymizing...");
        self.anonymize_pass(&mut rng).await?;

        self.phase("2nd pass: Activating triggers...");
        self.trigger_pass().await?;

        self.stats.completed = true;
        Ok(std::mem::take(&mut self.stats))
    }

    async fn anonymize_pass(&mut self, rng: &mut StdRng) -> anyhow::Result<()> {
        let tables = self.tables;
        let mut warned = WarnedKinds::new();

        for table in tables.iter() {
            let mut processor = TableProcessor::new(&mut *self.db, &mut *rng)
                .with_row_limit(self.options.row_limit)
                .with_progress(self.options.progress);

            match processor.process(table, &mut warned).await {
                Ok(table_stats) => self.record(table_stats),
                Err(ProcessError::Repair(e)) => {
                    tracing::error!(table = %table.name, "{}", e);
                    if self.options.fail_fast {
                        return Err(anyhow::Error::new(e)
                            .context(format!("Aborting run at table '{}'", table.name)));
                    }
                    let mut failed = TableStats::new(&table.name, TableStatus::Failed);
                    failed.error = Some(e.to_string());
                    self.stats.failed_tables.push(table.name.clone());
                    self.stats.table_stats.push(failed);
                }
                Err(ProcessError::Database(e)) => {
                    return Err(anyhow::Error::new(e)
                        .context(format!("Database error while processing '{}'", table.name)));
                }
            }
        }

        Ok(())
    }

    async fn trigger_pass(&mut self) -> anyhow::Result<()> {
        let tables = self.tables;
        for table in tables.iter() {
            let name = table.name.as_str();

            let has_triggers = match self.db.has_triggers(name).await {
                Ok(found) => found,
                Err(e @ DbError::UnknownTable { .. }) => {
                    tracing::error!(table = name, "{}", e);
                    continue;
                }
                Err(e) => {
                    return Err(anyhow::Error::new(e)
                        .context(format!("Failed to look up triggers on '{}'", name)))
                }
            };
            if !has_triggers {
                continue;
            }

            let spinner = Spinner::start(name, 2, self.options.progress);
            match self.db.touch_rows(name).await {
                Ok(rows) => {
                    spinner.succeed_with(format!("{} ({} rows touched)", name, rows));
                    self.stats.triggers_touched.push(name.to_string());
                }
                Err(e) => {
                    spinner.fail();
                    return Err(anyhow::Error::new(e)
                        .context(format!("Failed to reactivate triggers on '{}'", name)));
                }
            }
        }

        Ok(())
    }

    fn record(&mut self, table_stats: TableStats) {
        match table_stats.status {
            TableStatus::Skipped => {
                self.stats.warnings.push(format!(
                    "Table '{}' skipped: {}",
                    table_stats.name,
                    table_stats.error.as_deref().unwrap_or("fetch failed")
                ));
            }
            TableStatus::Anonymized => {
                for kind in &table_stats.unknown_kinds {
                    self.stats.warnings.push(format!(
                        "Table '{}': unknown field type '{}' ignored",
                        table_stats.name, kind
                    ));
                }
                if table_stats.integrity_violations > 0 {
                    self.stats.warnings.push(format!(
                        "Table '{}': {} rows rejected for missing parent rows; \
                         the row limit may be too low",
                        table_stats.name, table_stats.integrity_violations
                    ));
                }
                if table_stats.invalid_values > 0 {
                    self.stats.warnings.push(format!(
                        "Table '{}': {} values could not be parsed and were left unchanged",
                        table_stats.name, table_stats.invalid_values
                    ));
                }
            }
            _ => {}
        }

        self.stats.tables_processed += 1;
        self.stats.rows_updated += table_stats.rows_updated;
        self.stats.table_stats.push(table_stats);
    }

    fn phase(&self, message: &str) {
        if self.options.progress {
            eprintln!("{}", message);
        } else {
            tracing::info!("{}", message);
        }
    }
}
