//! Interactive MySQL zero-date repair tool.
//!
//! This binary connects to a MySQL server, inventories TIMESTAMP and
//! DATETIME columns holding the `0000-00-00` zero-date sentinel, and walks
//! an operator through repairing them and retiring TIMESTAMP columns ahead
//! of the year-2038 limit.
//!
//! # Security Guarantees
//! - Credentials come from the environment or an interactive prompt
//! - No credentials stored or logged
//! - MySQL system schemas are never scanned or modified
//! - Nothing is modified without an explicit confirmation

mod ui;
mod workflow;

use clap::{Args, Parser, ValueEnum};
use datemend_core::{ConnectionSettings, Result, connection, error::DatemendError, init_logging};
use std::io::Write;
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::workflow::Action;

#[derive(Parser)]
#[command(name = "datemend")]
#[command(about = "Interactive MySQL zero-date repair tool")]
#[command(version)]
#[command(long_about = "
datemend - zero-date inventory and repair for MySQL

This tool connects to a MySQL server, finds TIMESTAMP and DATETIME columns
holding the `0000-00-00` zero-date sentinel, and interactively:
- reports the damage per column
- sets zero-date rows to NULL where the column allows it
- makes NOT NULL date columns nullable where it does not
- converts TIMESTAMP columns to DATETIME ahead of the 2038 limit

SAFETY FEATURES:
- Nothing is modified without an explicit confirmation
- Changes are limited to the tables you select
- System schemas are never scanned or modified
- Credentials never appear in logs or output

EXAMPLES:
  datemend
  MYSQL_HOST=db1.internal MYSQL_PASSWORD=secret datemend --action report
  datemend --host 127.0.0.1 --user audit --ask-password --action scan
")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// MySQL host
    #[arg(long, env = "MYSQL_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// MySQL port
    #[arg(long, env = "MYSQL_PORT", default_value_t = 3306)]
    pub port: u16,

    /// MySQL user
    #[arg(long, env = "MYSQL_USER", default_value = "root")]
    pub user: String,

    /// MySQL password
    #[arg(
        long,
        env = "MYSQL_PASSWORD",
        hide_env_values = true,
        help = "MySQL password (prefer --ask-password or the environment)"
    )]
    pub password: Option<String>,

    /// Prompt for the password instead of reading it from the environment
    #[arg(long)]
    pub ask_password: bool,

    /// Scan cache location
    #[arg(
        long,
        default_value = "datemend-cache.json",
        help = "Where the scan inventory is cached between sessions"
    )]
    pub cache_file: PathBuf,

    /// Run one action before showing the menu
    #[arg(long, value_enum)]
    pub action: Option<CliAction>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

#[derive(Args)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, help = "Suppress all output except errors")]
    pub quiet: bool,
}

/// Actions reachable from the command line.
///
/// Multi-word actions also accept their underscore spellings, so shell
/// history from other tooling keeps working.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliAction {
    /// Scan schemas and rebuild the inventory
    Scan,
    /// Print the inventory report
    Report,
    /// Set zero-date rows to NULL in nullable columns
    #[value(alias = "fix_nulls")]
    FixNulls,
    /// Make NOT NULL date columns nullable
    #[value(alias = "allow_nulls")]
    AllowNulls,
    /// Convert TIMESTAMP columns to DATETIME
    #[value(alias = "convert_timestamps")]
    ConvertTimestamps,
}

impl From<CliAction> for Action {
    fn from(action: CliAction) -> Self {
        match action {
            CliAction::Scan => Self::Scan,
            CliAction::Report => Self::Report,
            CliAction::FixNulls => Self::FixNulls,
            CliAction::AllowNulls => Self::AllowNulls,
            CliAction::ConvertTimestamps => Self::ConvertTimestamps,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.global.verbose, cli.global.quiet)?;

    if cli.no_color {
        colored::control::set_override(false);
    }

    let settings = resolve_settings(&cli)?;

    if settings.password_is_empty() {
        warn!("Connecting with an empty password; set MYSQL_PASSWORD or use --ask-password");
    }

    info!("Connecting to MySQL at {}", settings);
    let pool = connection::connect(&settings).map_err(|e| {
        error!("Failed to set up the connection: {}", e);
        e
    })?;

    if let Err(e) = connection::ping(&pool).await {
        error!("Cannot reach MySQL at {}: {}", settings, e);
        eprintln!("Cannot reach MySQL at {settings}");
        eprintln!("Check the host, port, and credentials, then try again.");
        std::process::exit(1);
    }

    match connection::server_version(&pool).await {
        Ok(version) => info!("✓ Connected to MySQL {}", version),
        Err(e) => warn!("Connected, but the server version is unreadable: {}", e),
    }

    let inventory =
        datemend_core::cache::load(&cli.cache_file, &settings.host, settings.port).await;
    if inventory.is_some() {
        info!("Loaded cached inventory from {}", cli.cache_file.display());
    }

    let initial_action = cli.action.map(Action::from);
    workflow::run(&pool, &settings, &cli.cache_file, inventory, initial_action).await
}

/// Builds connection settings from flags, environment, and prompts.
///
/// `--ask-password` wins over both `--password` and `MYSQL_PASSWORD`, so
/// an operator can override a stale environment without editing it.
fn resolve_settings(cli: &Cli) -> Result<ConnectionSettings> {
    let password = if cli.ask_password {
        print!("Password for {}@{}: ", cli.user, cli.host);
        std::io::stdout().flush().map_err(|e| {
            DatemendError::configuration(format!(
                "Failed to flush stdout before reading password: {e}"
            ))
        })?;
        rpassword::read_password().map_err(|e| {
            DatemendError::configuration(format!("Failed to read password: {e}"))
        })?
    } else {
        cli.password.clone().unwrap_or_default()
    };

    let settings = ConnectionSettings::new(cli.host.clone(), cli.port, cli.user.clone(), password);
    settings.validate()?;
    Ok(settings)
}
