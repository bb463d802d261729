//! Cloning the source database into the anonymization target.
//!
//! The target is created if missing, then filled in two dumps:
//! - structure only for the `schema_only` tables;
//! - structure and data for everything else, optionally capped per table.

use crate::config::{AnonymizeConfig, DbInfo};
use crate::db::quote_ident;
use crate::progress::Spinner;
use async_trait::async_trait;
use std::io::Read;
use std::process::{Command, Stdio};

/// A dump/restore step failed
#[derive(Debug, thiserror::Error)]
pub enum CloneError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: &'static str,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("Clone task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Copies the source database into the target
#[async_trait]
pub trait Cloner: Send + Sync {
    /// Create the target database if it does not exist
    async fn create_database(&self) -> Result<(), CloneError>;

    /// Copy the structure of `tables`, without rows
    async fn clone_schema(&self, tables: &[String]) -> Result<(), CloneError>;

    /// Copy structure and rows of every table except `excluded`
    async fn clone_data(&self, excluded: &[String], row_limit: Option<u64>)
        -> Result<(), CloneError>;
}

/// Shells out to `mysqldump ... | mysql ...`
pub struct MysqlDumpCloner {
    info: DbInfo,
}

impl MysqlDumpCloner {
    pub fn new(info: DbInfo) -> Self {
        Self { info }
    }

    fn connection_args(&self) -> Vec<String> {
        vec![
            format!("-u{}", self.info.user),
            format!("-h{}", self.info.host),
            format!("-P{}", self.info.port),
        ]
    }

    fn schema_dump_args(&self, tables: &[String]) -> Vec<String> {
        let mut args = self.connection_args();
        args.push("--no-data".to_string());
        args.push("--column-statistics=0".to_string());
        args.push(self.info.source.clone());
        args.extend(tables.iter().cloned());
        args
    }

    fn data_dump_args(&self, excluded: &[String], row_limit: Option<u64>) -> Vec<String> {
        let mut args = self.connection_args();
        for table in excluded {
            args.push(format!("--ignore-table={}.{}", self.info.source, table));
        }
        args.push("--column-statistics=0".to_string());
        if let Some(limit) = row_limit.filter(|&n| n > 0) {
            args.push(format!("--where=1 LIMIT {}", limit));
        }
        args.push(self.info.source.clone());
        args
    }

    fn restore_args(&self) -> Vec<String> {
        let mut args = self.connection_args();
        args.push(self.info.target.clone());
        args
    }

    fn create_args(&self) -> Vec<String> {
        let mut args = self.connection_args();
        args.push("-e".to_string());
        args.push(format!(
            "CREATE DATABASE IF NOT EXISTS {}",
            quote_ident(&self.info.target)
        ));
        args
    }

    fn command(&self, program: &str, args: Vec<String>) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(password) = &self.info.password {
            cmd.env("MYSQL_PWD", password);
        }
        cmd
    }

    async fn pipe(&self, dump_args: Vec<String>) -> Result<(), CloneError> {
        let dump = self.command("mysqldump", dump_args);
        let restore = self.command("mysql", self.restore_args());
        tokio::task::spawn_blocking(move || pipe_blocking(dump, restore)).await?
    }
}

#[async_trait]
impl Cloner for MysqlDumpCloner {
    async fn create_database(&self) -> Result<(), CloneError> {
        let cmd = self.command("mysql", self.create_args());
        tokio::task::spawn_blocking(move || run_blocking("mysql", cmd)).await?
    }

    async fn clone_schema(&self, tables: &[String]) -> Result<(), CloneError> {
        if tables.is_empty() {
            return Ok(());
        }
        self.pipe(self.schema_dump_args(tables)).await
    }

    async fn clone_data(
        &self,
        excluded: &[String],
        row_limit: Option<u64>,
    ) -> Result<(), CloneError> {
        self.pipe(self.data_dump_args(excluded, row_limit)).await
    }
}

/// Create the target and copy the source into it
pub async fn clone_target<C: Cloner + ?Sized>(
    cloner: &C,
    config: &AnonymizeConfig,
) -> Result<(), CloneError> {
    let spinner = Spinner::start(
        format!("Creating database {}", config.db.target),
        0,
        config.progress,
    );
    if let Err(e) = cloner.create_database().await {
        spinner.fail();
        return Err(e);
    }
    spinner.succeed();

    let spinner = Spinner::start(
        format!("Cloning DB structure to {}", config.db.target),
        0,
        config.progress,
    );
    if let Err(e) = cloner.clone_schema(&config.schema_only).await {
        spinner.fail();
        return Err(e);
    }
    spinner.succeed();

    if let Some(limit) = config.row_limit {
        tracing::info!("Limiting exported rows to {} per table", limit);
    }
    let spinner = Spinner::start(
        format!("Cloning data from {} to {}", config.db.source, config.db.target),
        0,
        config.progress,
    );
    if let Err(e) = cloner.clone_data(&config.schema_only, config.row_limit).await {
        spinner.fail();
        return Err(e);
    }
    spinner.succeed();

    Ok(())
}

fn run_blocking(program: &'static str, mut cmd: Command) -> Result<(), CloneError> {
    let output = cmd
        .stdin(Stdio::null())
        .output()
        .map_err(|source| CloneError::Spawn { program, source })?;
    if !output.status.success() {
        return Err(CloneError::Failed {
            program,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

fn pipe_blocking(mut dump: Command, mut restore: Command) -> Result<(), CloneError> {
    let mut dump = dump
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| CloneError::Spawn {
            program: "mysqldump",
            source,
        })?;

    let Some(dump_out) = dump.stdout.take() else {
        let _ = dump.kill();
        return Err(CloneError::Spawn {
            program: "mysqldump",
            source: std::io::Error::other("stdout not captured"),
        });
    };

    let restore = restore
        .stdin(Stdio::from(dump_out))
        .stderr(Stdio::piped())
        .spawn();
    let mut restore = match restore {
        Ok(child) => child,
        Err(source) => {
            let _ = dump.kill();
            let _ = dump.wait();
            return Err(CloneError::Spawn {
                program: "mysql",
                source,
            });
        }
    };

    // Both stderr pipes must be read while the dump streams, or a chatty
    // mysql stalls the pipeline
    let restore_err = restore.stderr.take().map(|mut stderr| {
        std::thread::spawn(move || {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf);
            buf
        })
    });

    let mut dump_err = String::new();
    if let Some(mut stderr) = dump.stderr.take() {
        let _ = stderr.read_to_string(&mut dump_err);
    }
    let dump_status = dump.wait().map_err(|source| CloneError::Spawn {
        program: "mysqldump",
        source,
    })?;
    let restore_status = restore.wait().map_err(|source| CloneError::Spawn {
        program: "mysql",
        source,
    })?;
    let restore_err = restore_err
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();

    if !dump_status.success() {
        return Err(CloneError::Failed {
            program: "mysqldump",
            status: dump_status,
            stderr: dump_err.trim().to_string(),
        });
    }
    if !restore_status.success() {
        return Err(CloneError::Failed {
            program: "mysql",
            status: restore_status,
            stderr: restore_err.trim().to_string(),
        });
    }
    Ok(())
}
