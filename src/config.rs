//! Configuration for an anonymization run.
//!
//! The tables file (YAML) describes what to anonymize. Connection details and
//! run options come from the command line, which also overrides the file's
//! `seed`, `row_limit` and `schema_only` settings.

use crate::pipeline::PipelineOptions;
use crate::spec::TableSpec;
use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Server and database names for the clone source and anonymized target
#[derive(Debug, Clone)]
pub struct DbInfo {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    /// Database holding the real data
    pub source: String,
    /// Database that receives the clone and is anonymized in place
    pub target: String,
}

impl Default for DbInfo {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: None,
            source: String::new(),
            target: String::new(),
        }
    }
}

/// YAML tables file structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnonymizeYamlConfig {
    /// Random seed for reproducible output
    #[serde(default)]
    pub seed: Option<u64>,

    /// Max rows cloned and anonymized per table (0 = unbounded)
    #[serde(default)]
    pub row_limit: Option<u64>,

    /// Huge or volatile tables cloned without their data
    #[serde(default)]
    pub schema_only: Vec<String>,

    /// Tables to anonymize, in run order
    #[serde(default)]
    pub tables: TableSpec,
}

impl AnonymizeYamlConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml_ng::from_str(content)?;
        Ok(config)
    }
}

/// Runtime configuration for an anonymization run
#[derive(Debug, Clone)]
pub struct AnonymizeConfig {
    pub db: DbInfo,
    pub tables: TableSpec,
    pub schema_only: Vec<String>,
    /// `None` means unbounded
    pub row_limit: Option<u64>,
    pub seed: Option<u64>,
    /// Anonymize an existing target without cloning first
    pub skip_clone: bool,
    /// Abort the run on the first table failure
    pub fail_fast: bool,
    pub progress: bool,
}

impl AnonymizeConfig {
    pub fn builder() -> AnonymizeConfigBuilder {
        AnonymizeConfigBuilder::default()
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.db.target.is_empty() {
            anyhow::bail!("Target database name is required");
        }
        if !self.skip_clone {
            if self.db.source.is_empty() {
                anyhow::bail!("Source database name is required unless --skip-clone is set");
            }
            if self.db.source == self.db.target {
                anyhow::bail!(
                    "Source and target database are both '{}'; refusing to clone onto the source",
                    self.db.source
                );
            }
        }
        if self.tables.is_empty() {
            anyhow::bail!("No tables configured");
        }
        Ok(())
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            row_limit: self.row_limit,
            seed: self.seed,
            fail_fast: self.fail_fast,
            progress: self.progress,
        }
    }
}

/// Builder for AnonymizeConfig
#[derive(Default)]
pub struct AnonymizeConfigBuilder {
    db: DbInfo,
    config_file: Option<PathBuf>,
    yaml: Option<AnonymizeYamlConfig>,
    schema_only: Vec<String>,
    row_limit: Option<u64>,
    seed: Option<u64>,
    skip_clone: bool,
    fail_fast: bool,
    progress: bool,
}

impl AnonymizeConfigBuilder {
    pub fn db(mut self, db: DbInfo) -> Self {
        self.db = db;
        self
    }

    pub fn config_file(mut self, path: PathBuf) -> Self {
        self.config_file = Some(path);
        self
    }

    /// Use an already parsed tables file instead of reading one
    pub fn yaml(mut self, yaml: AnonymizeYamlConfig) -> Self {
        self.yaml = Some(yaml);
        self
    }

    pub fn schema_only(mut self, tables: Vec<String>) -> Self {
        self.schema_only = tables;
        self
    }

    pub fn row_limit(mut self, limit: Option<u64>) -> Self {
        self.row_limit = limit;
        self
    }

    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn skip_clone(mut self, skip_clone: bool) -> Self {
        self.skip_clone = skip_clone;
        self
    }

    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Build the AnonymizeConfig
    pub fn build(self) -> anyhow::Result<AnonymizeConfig> {
        let yaml = match (self.yaml, &self.config_file) {
            (Some(yaml), _) => yaml,
            (None, Some(path)) => AnonymizeYamlConfig::load(path)?,
            (None, None) => anyhow::bail!("A tables config file is required"),
        };

        // CLI overrides YAML; an explicit 0 on either side means unbounded
        let row_limit = self
            .row_limit
            .or(yaml.row_limit)
            .filter(|&limit| limit > 0);

        let seed = self.seed.or(yaml.seed);

        let schema_only = if self.schema_only.is_empty() {
            yaml.schema_only
        } else {
            self.schema_only
        };

        Ok(AnonymizeConfig {
            db: self.db,
            tables: yaml.tables,
            schema_only,
            row_limit,
            seed,
            skip_clone: self.skip_clone,
            fail_fast: self.fail_fast,
            progress: self.progress,
        })
    }
}
