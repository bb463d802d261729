//! CLI handler for the anonymize command.

use crate::clone::{clone_target, MysqlDumpCloner};
use crate::config::{AnonymizeConfig, DbInfo};
use crate::db::MysqlDatabase;
use crate::pipeline::{Pipeline, RunStats};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Instant;
use tracing::level_filters::LevelFilter;

/// Run the anonymize command with the given options
#[allow(clippy::too_many_arguments)]
pub async fn run(
    config: PathBuf,
    db: DbInfo,
    limit: Option<u64>,
    seed: Option<u64>,
    schema_only: Vec<String>,
    skip_clone: bool,
    fail_fast: bool,
    no_progress: bool,
    json: bool,
) -> anyhow::Result<()> {
    let progress = !no_progress && !json && std::io::stderr().is_terminal();

    let config = AnonymizeConfig::builder()
        .db(db)
        .config_file(config)
        .schema_only(schema_only)
        .row_limit(limit)
        .seed(seed)
        .skip_clone(skip_clone)
        .fail_fast(fail_fast)
        .progress(progress)
        .build()?;
    config.validate()?;

    for issue in config.tables.validate() {
        tracing::warn!("{}", issue);
    }

    let start_time = Instant::now();

    if config.skip_clone {
        tracing::info!(target_db = %config.db.target, "skipping clone, anonymizing in place");
    } else {
        let cloner = MysqlDumpCloner::new(config.db.clone());
        clone_target(&cloner, &config).await?;
    }

    let log_statements = LevelFilter::current() >= LevelFilter::DEBUG;
    let mut database = MysqlDatabase::connect(&config.db, &config.db.target, log_statements).await?;

    let result = Pipeline::new(&mut database, &config.tables, config.pipeline_options())
        .run()
        .await;
    database.close().await;
    let stats = result?;

    output_stats(&stats, json, start_time.elapsed().as_secs_f64());

    if !stats.is_success() {
        anyhow::bail!(
            "Anonymization finished with {} failed table(s): {}",
            stats.failed_tables.len(),
            stats.failed_tables.join(", ")
        );
    }
    Ok(())
}

fn output_stats(stats: &RunStats, json: bool, elapsed: f64) {
    if json {
        match serde_json::to_string_pretty(stats) {
            Ok(out) => println!("{}", out),
            Err(e) => eprintln!("Failed to serialize stats: {}", e),
        }
        return;
    }

    println!("\nAnonymization complete:");
    println!("  Tables processed: {}", stats.tables_processed);
    println!("  Rows updated: {}", stats.rows_updated);
    println!("  Triggers reactivated: {}", stats.triggers_touched.len());
    println!("  Elapsed: {:.3}s", elapsed);

    if !stats.warnings.is_empty() {
        eprintln!("\nWarnings:");
        for warning in &stats.warnings {
            eprintln!("  - {}", warning);
        }
    }
    if !stats.failed_tables.is_empty() {
        eprintln!("\nFailed tables:");
        for table in &stats.failed_tables {
            eprintln!("  - {}", table);
        }
    }
}
