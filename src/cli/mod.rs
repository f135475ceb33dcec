pub mod catalog;
pub mod classify;
pub mod export;
pub mod init;
pub mod report;
pub mod review;
pub mod rules;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use rusqlite::Connection;
use rust_decimal::Decimal;

use euer::db::{get_connection, init_db};
use euer::events::{parse_date, DateRange};
use euer::settings::default_db_path;
use euer::Result;

/// Open the database at `db` (or the configured default), creating the
/// schema if it is missing.
pub(crate) fn open_db(db: Option<&Path>) -> Result<Connection> {
    let path = match db {
        Some(path) => path.to_path_buf(),
        None => default_db_path()?,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let conn = get_connection(&path)?;
    init_db(&conn)?;
    Ok(conn)
}

/// `--from`/`--to` fill in from the tax year's bounds when only one is given.
pub(crate) fn parse_range(year: i32, from: Option<&str>, to: Option<&str>) -> Result<Option<DateRange>> {
    if from.is_none() && to.is_none() {
        return Ok(None);
    }
    let year_range = DateRange::calendar_year(year)?;
    let from = from.map(parse_date).transpose()?.unwrap_or(year_range.from);
    let to = to.map(parse_date).transpose()?.unwrap_or(year_range.to);
    DateRange::new(from, to).map(Some)
}

#[derive(Parser)]
#[command(name = "euer", about = "Classify bank transactions and invoices onto Anlage EÜR lines.")]
pub struct Cli {
    /// Path to the SQLite database (default: {data_dir}/euer.db)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write the settings file and create the database schema.
    Init {
        /// Directory holding euer.db (default: ~/Documents/euer)
        #[arg(long = "data-dir")]
        data_dir: Option<PathBuf>,
        /// Apply the §19 UStG small-business rule (true or false)
        #[arg(long = "small-business")]
        small_business: Option<bool>,
        /// VAT rate in percent extracted from amounts with VAT mode default
        #[arg(long = "vat-rate")]
        vat_rate: Option<Decimal>,
    },
    /// List the lines of a tax year's schedule.
    Catalog {
        #[arg(long)]
        year: i32,
    },
    /// Manage suggestion rules.
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
    /// Record a decision for one event.
    Classify {
        /// transaction or invoice
        #[arg(long = "source-type")]
        source_type: String,
        #[arg(long = "source-id")]
        source_id: String,
        #[arg(long)]
        year: i32,
        /// Target line id (e.g. 2025-edv)
        #[arg(long)]
        line: Option<String>,
        /// Keep the event out of the report
        #[arg(long, conflicts_with = "line")]
        excluded: bool,
        /// VAT mode: none or default
        #[arg(long, default_value = "none")]
        vat: String,
        #[arg(long)]
        note: Option<String>,
    },
    /// List events of a year with their decision or a suggestion.
    Review {
        #[arg(long)]
        year: i32,
        #[arg(long = "from")]
        from_date: Option<String>,
        #[arg(long = "to")]
        to_date: Option<String>,
        /// Store every suggestion shown
        #[arg(long)]
        accept: bool,
    },
    /// Show line totals for a year.
    Report {
        #[arg(long)]
        year: i32,
        #[arg(long = "from")]
        from_date: Option<String>,
        #[arg(long = "to")]
        to_date: Option<String>,
    },
    /// Write the report as semicolon CSV.
    Export {
        #[arg(long)]
        year: i32,
        #[arg(long = "from")]
        from_date: Option<String>,
        #[arg(long = "to")]
        to_date: Option<String>,
        /// Output file (default: stdout)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum RulesCommands {
    /// Add a rule.
    Add {
        #[arg(long)]
        year: i32,
        /// Value to match (normalized before comparison)
        value: String,
        /// Target line id
        #[arg(long)]
        line: String,
        /// counterparty, purpose or any
        #[arg(long, default_value = "any")]
        field: String,
        /// contains, equals or starts_with
        #[arg(long = "operator", default_value = "contains")]
        operator: String,
        /// Lower runs first
        #[arg(long, default_value_t = 100)]
        priority: i64,
    },
    /// List rules of a year.
    List {
        #[arg(long)]
        year: i32,
    },
    /// Delete a rule by id.
    Delete { id: i64 },
}
