mod anonymize;
mod validate;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sql-anonymizer")]
#[command(author = "Helge Sverre <helge.sverre@gmail.com>")]
#[command(version)]
#[command(about = "Clone a MySQL database and anonymize sensitive columns in place", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Clone the source database and anonymize the copy
    Anonymize {
        /// YAML tables config describing what to anonymize
        #[arg(short, long)]
        config: PathBuf,

        /// MySQL server host
        #[arg(long, env = "MYSQL_HOST", default_value = "localhost")]
        host: String,

        /// MySQL server port
        #[arg(short = 'P', long, env = "MYSQL_TCP_PORT", default_value_t = 3306)]
        port: u16,

        /// MySQL user
        #[arg(short, long, env = "MYSQL_USER", default_value = "root")]
        user: String,

        /// MySQL password
        #[arg(long, env = "MYSQL_PWD", hide_env_values = true)]
        password: Option<String>,

        /// Database holding the real data
        #[arg(short, long, env = "ANON_SOURCE_DB", default_value = "")]
        source: String,

        /// Database to clone into and anonymize
        #[arg(short, long, env = "ANON_TARGET_DB")]
        target: String,

        /// Max rows cloned and anonymized per table (0 = unbounded, overrides config)
        #[arg(short, long)]
        limit: Option<u64>,

        /// Random seed for reproducible output (overrides config)
        #[arg(long)]
        seed: Option<u64>,

        /// Tables cloned without data (comma-separated, overrides config)
        #[arg(long, value_delimiter = ',')]
        schema_only: Vec<String>,

        /// Anonymize an existing target database without cloning first
        #[arg(long)]
        skip_clone: bool,

        /// Abort on the first table whose foreign keys cannot be repaired
        #[arg(long)]
        fail_fast: bool,

        /// Disable progress spinners
        #[arg(long)]
        no_progress: bool,

        /// Output run statistics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check a YAML tables config without touching any database
    Validate {
        /// YAML tables config to check
        config: PathBuf,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Anonymize {
            config,
            host,
            port,
            user,
            password,
            source,
            target,
            limit,
            seed,
            schema_only,
            skip_clone,
            fail_fast,
            no_progress,
            json,
        } => {
            let db = crate::config::DbInfo {
                host,
                port,
                user,
                password,
                source,
                target,
            };
            anonymize::run(
                config,
                db,
                limit,
                seed,
                schema_only,
                skip_clone,
                fail_fast,
                no_progress,
                json,
            )
            .await
        }
        Commands::Validate { config, json } => validate::run(config, json),
        Commands::Completions { shell } => {
            generate(
                shell,
                &mut Cli::command(),
                "sql-anonymizer",
                &mut io::stdout(),
            );
            Ok(())
        }
    }
}
