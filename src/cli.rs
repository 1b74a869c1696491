//! Command-line interface definitions.
//!
//! Credentials can be passed as flags but are normally read from the
//! environment (or a `.env` file loaded at startup).

use crate::config::Credentials;
use crate::error::CollectError;
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Collect a single (keyword, quarter) pair
    Single,
    /// Collect every configured keyword for every quarter
    All,
    /// Merge part files into one deduplicated dataset
    Merge,
    /// Write task lists and worker scripts for multi-process runs
    Tasks,
}

/// Command-line arguments.
///
/// Running with no arguments at all collects every pair and then merges.
///
/// # Examples
///
/// ```sh
/// # One pair; dates derived from the quarter label
/// quarterly_news --mode single --keyword 청도군 --quarter 2022_Q1
///
/// # Everything since 2023 with two concurrent workers
/// quarterly_news --mode all --start-year 2023 --workers 2
///
/// # Merge part files
/// quarterly_news --mode merge
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Operation to run
    #[arg(long, value_enum, default_value_t = Mode::All)]
    pub mode: Mode,

    /// Search keyword (single mode)
    #[arg(long)]
    pub keyword: Option<String>,

    /// Quarter label such as 2022_Q1 (single mode)
    #[arg(long)]
    pub quarter: Option<String>,

    /// First day of the window, YYYY-MM-DD (single mode; defaults to the quarter start)
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// Last day of the window, YYYY-MM-DD (single mode; defaults to the quarter end)
    #[arg(long)]
    pub end_date: Option<NaiveDate>,

    /// Part file directory for single/all/merge, script directory for tasks
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// First year to collect (all and tasks modes)
    #[arg(long)]
    pub start_year: Option<i32>,

    /// Concurrent pairs in all mode, or number of worker scripts in tasks mode
    #[arg(long)]
    pub workers: Option<usize>,

    /// Path to config.yaml
    #[arg(long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Search API client id
    #[arg(long, env = "NAVER_CLIENT_ID", hide_env_values = true)]
    pub client_id: Option<String>,

    /// Search API client secret
    #[arg(long, env = "NAVER_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,
}

impl Cli {
    /// Whether this mode issues search requests and so needs credentials.
    pub fn needs_credentials(&self) -> bool {
        matches!(self.mode, Mode::Single | Mode::All)
    }

    /// Resolve API credentials for modes that search.
    ///
    /// # Returns
    ///
    /// `None` for modes that never call the search API.
    ///
    /// # Errors
    ///
    /// [`CollectError::MissingCredentials`] when this mode searches and either
    /// value is missing or blank.
    pub fn credentials(&self) -> Result<Option<Credentials>, CollectError> {
        if !self.needs_credentials() {
            return Ok(None);
        }
        Credentials::resolve(self.client_id.clone(), self.client_secret.clone()).map(Some)
    }
}
