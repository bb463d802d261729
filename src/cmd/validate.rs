//! CLI handler for the validate command.

use crate::config::AnonymizeYamlConfig;
use crate::spec::SpecIssue;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct ValidateSummary<'a> {
    valid: bool,
    tables: usize,
    fields: usize,
    issues: &'a [SpecIssue],
}

pub fn run(config: PathBuf, json: bool) -> anyhow::Result<()> {
    if !config.exists() {
        anyhow::bail!("config file does not exist: {}", config.display());
    }

    let yaml = AnonymizeYamlConfig::load(&config)?;
    let issues = yaml.tables.validate();

    if json {
        let summary = ValidateSummary {
            valid: issues.is_empty(),
            tables: yaml.tables.len(),
            fields: yaml.tables.field_count(),
            issues: &issues,
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        eprintln!("Validating tables config: {}", config.display());
        for issue in &issues {
            eprintln!("  {}", issue);
        }
        eprintln!();
        eprintln!(
            "{} tables, {} fields, {} issue(s)",
            yaml.tables.len(),
            yaml.tables.field_count(),
            issues.len()
        );
    }

    if !issues.is_empty() {
        anyhow::bail!("{} issue(s) found in {}", issues.len(), config.display());
    }
    Ok(())
}
