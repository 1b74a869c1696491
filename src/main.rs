//! # Quarterly News
//!
//! Collects news search results for a fixed set of keywords, one calendar
//! quarter at a time, and merges them into a single deduplicated CSV dataset.
//!
//! ## Usage
//!
//! ```sh
//! # Collect everything since collection.start_year, then merge
//! quarterly_news
//!
//! # One (keyword, quarter) pair
//! quarterly_news --mode single --keyword 청도군 --quarter 2022_Q1
//!
//! # Merge existing part files
//! quarterly_news --mode merge
//!
//! # Write task lists and worker scripts for multi-process runs
//! quarterly_news --mode tasks --workers 4 --output-dir ./scripts
//! ```
//!
//! ## Architecture
//!
//! 1. **Partitioning**: split the collection period into calendar quarters
//! 2. **Collection**: page through the search API for each (keyword, quarter)
//! 3. **Filtering**: keep hits inside the quarter that contain the keyword verbatim
//! 4. **Parts**: write one CSV part file per pair
//! 5. **Merge**: concatenate every part file and deduplicate

use chrono::Local;
use clap::Parser;
use std::error::Error;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod collector;
mod config;
mod error;
mod filter;
mod models;
mod outputs;
mod pipeline;
mod pool;
mod quarters;
mod tasks;
mod utils;

use api::NaverSearch;
use cli::{Cli, Mode};
use config::{Config, Credentials};
use error::CollectError;
use outputs::merge::Merger;
use pipeline::{PairOutcome, Pipeline};
use pool::WorkerPool;
use quarters::{QuarterRange, quarterly_ranges_until_today};
use tasks::{ScriptGenerator, build_task_list};
use utils::ensure_writable_dir;

/// Default number of worker scripts generated in tasks mode.
const DEFAULT_SCRIPT_WORKERS: usize = 4;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();

    // A bare invocation collects everything and then merges.
    let bare_run = std::env::args_os().len() <= 1;
    let args = Cli::parse();
    let (config, source) = Config::load(&args.config)?;
    let credentials = args.credentials()?;

    let log_file = init_tracing(&config);
    let start_time = std::time::Instant::now();
    info!(mode = ?args.mode, bare_run, "quarterly_news starting up");
    if let Some(path) = &log_file {
        info!(path = %path.display(), "Logging to file");
    }
    config.log_summary(&source);
    debug!(?args.keyword, ?args.quarter, ?args.output_dir, "Parsed CLI arguments");

    let result = run(&args, &config, credentials, bare_run).await;

    let elapsed = start_time.elapsed();
    match &result {
        Ok(()) => info!(
            ?elapsed,
            secs = elapsed.as_secs(),
            millis = elapsed.subsec_millis(),
            "Execution complete"
        ),
        Err(e) => error!(error = %e, ?elapsed, "Execution failed"),
    }
    result
}

/// Stdout layer plus an ANSI-free file layer under `logging.dir`.
///
/// `RUST_LOG` overrides `logging.level`. When the log file cannot be created
/// only stdout is used. Returns the log file path if one was opened.
fn init_tracing(config: &Config) -> Option<PathBuf> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.filter_directive().unwrap_or("info")));

    let file_name = format!("collection_{}.log", Local::now().format("%Y%m%d_%H%M%S"));
    let log_path = config.logging.dir.join(file_name);
    let opened = std::fs::create_dir_all(&config.logging.dir).and_then(|_| File::create(&log_path));
    let (file_layer, file_error) = match opened {
        Ok(file) => (
            Some(
                tfmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_timer(UtcTime::rfc_3339())
                    .with_writer(Mutex::new(file)),
            ),
            None,
        ),
        Err(e) => (None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tfmt::layer()
                .with_target(true)
                .with_file(false)
                .with_line_number(false)
                .with_timer(UtcTime::rfc_3339()),
        )
        .with(file_layer)
        .init();

    match file_error {
        Some(e) => {
            warn!(path = %log_path.display(), error = %e, "Could not open log file; logging to stdout only");
            None
        }
        None => Some(log_path),
    }
}

async fn run(
    args: &Cli,
    config: &Config,
    credentials: Option<Credentials>,
    bare_run: bool,
) -> Result<(), Box<dyn Error>> {
    match args.mode {
        Mode::Single => run_single(args, config, search_client(config, credentials)?).await,
        Mode::All => {
            run_all(args, config, search_client(config, credentials)?).await?;
            if bare_run {
                run_merge(args, config).await?;
            }
            Ok(())
        }
        Mode::Merge => run_merge(args, config).await,
        Mode::Tasks => run_tasks(args, config).await,
    }
}

fn search_client(
    config: &Config,
    credentials: Option<Credentials>,
) -> Result<NaverSearch, CollectError> {
    let credentials = credentials.ok_or(CollectError::MissingCredentials("NAVER_CLIENT_ID"))?;
    debug!(?credentials, "Using API credentials");
    NaverSearch::new(&config.api, config.collection.request_timeout(), credentials)
}

fn parts_dir(args: &Cli, config: &Config) -> PathBuf {
    args.output_dir
        .clone()
        .unwrap_or_else(|| config.output.parts_dir.clone())
}

/// Window for single mode: the quarter label's range, with explicit dates
/// taking precedence.
fn single_range(args: &Cli, label: &str) -> Result<QuarterRange, CollectError> {
    let today = Local::now().date_naive();
    match (args.start_date, args.end_date) {
        (Some(start_date), Some(end_date)) => Ok(QuarterRange {
            label: label.to_string(),
            start_date,
            end_date,
        }),
        (start, end) => {
            let mut range = QuarterRange::from_label(label, today)?;
            range.start_date = start.unwrap_or(range.start_date);
            range.end_date = end.unwrap_or(range.end_date);
            Ok(range)
        }
    }
}

#[instrument(level = "info", skip_all)]
async fn run_single(args: &Cli, config: &Config, client: NaverSearch) -> Result<(), Box<dyn Error>> {
    let keyword = args
        .keyword
        .as_deref()
        .ok_or(CollectError::MissingArgument("--keyword"))?;
    let label = args
        .quarter
        .as_deref()
        .ok_or(CollectError::MissingArgument("--quarter"))?;
    let range = single_range(args, label)?;

    let dir = parts_dir(args, config);
    ensure_output_dir(&dir).await?;

    let pipeline = Pipeline::new(client, config, &dir);
    match pipeline.collect_pair(keyword, &range).await? {
        PairOutcome::Saved { path, records } => {
            info!(path = %path.display(), records, "Pair collected")
        }
        PairOutcome::NoData => warn!(%keyword, quarter = %range, "Pair produced no data"),
    }
    Ok(())
}

#[instrument(level = "info", skip_all)]
async fn run_all(args: &Cli, config: &Config, client: NaverSearch) -> Result<(), Box<dyn Error>> {
    let start_year = args.start_year.unwrap_or(config.collection.start_year);
    let quarters = quarterly_ranges_until_today(start_year);
    info!(
        start_year,
        quarters = quarters.len(),
        first = ?quarters.first().map(|q| &q.label),
        last = ?quarters.last().map(|q| &q.label),
        "Quarter ranges built"
    );

    let dir = parts_dir(args, config);
    ensure_output_dir(&dir).await?;

    let pool = WorkerPool::new(
        args.workers.unwrap_or(config.collection.workers),
        config.collection.task_timeout(),
    );
    let pipeline = Pipeline::new(client, config, &dir);
    let saved = pipeline.collect_all(&config.keywords, &quarters, &pool).await;
    info!(part_files = saved.len(), "All pairs processed");
    Ok(())
}

#[instrument(level = "info", skip_all)]
async fn run_merge(args: &Cli, config: &Config) -> Result<(), Box<dyn Error>> {
    let source_dir = parts_dir(args, config);
    let merged_path = config.output.merged_path();

    let dataset = Merger::new(config.dedup_key())?
        .excluding(&merged_path)
        .merge_into(&source_dir, &merged_path, config.output.encoding)
        .await?;
    info!(path = %merged_path.display(), records = dataset.records.len(), "Merged dataset written");
    Ok(())
}

#[instrument(level = "info", skip_all)]
async fn run_tasks(args: &Cli, config: &Config) -> Result<(), Box<dyn Error>> {
    let start_year = args.start_year.unwrap_or(config.collection.start_year);
    let quarters = quarterly_ranges_until_today(start_year);
    let tasks = build_task_list(&config.keywords, &quarters);

    let program = std::env::args()
        .next()
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());
    let dir = args.output_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    let workers = args.workers.unwrap_or(DEFAULT_SCRIPT_WORKERS);

    let written = ScriptGenerator::new(program, &args.config)
        .write_all(&dir, &tasks, workers)
        .await?;
    info!(
        tasks = tasks.len(),
        workers,
        files = written.len(),
        dir = %dir.display(),
        "Task files generated"
    );
    Ok(())
}

async fn ensure_output_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    if let Err(e) = ensure_writable_dir(path).await {
        error!(
            path = %path.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }
    Ok(())
}
