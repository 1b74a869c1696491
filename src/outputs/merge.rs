//! Merge stage: combine all part files into one deduplicated dataset.
//!
//! Runs after every collection worker has finished. Part files are read in
//! file-name order, concatenated, and deduplicated on a configurable column,
//! keeping the first occurrence of each value.

use crate::config::OutputEncoding;
use crate::error::{CollectError, Result};
use crate::models::NewsRecord;
use crate::outputs::parts::{encode_records, read_part};
use itertools::Itertools;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument, warn};

/// Number of most recent quarters listed in the merge summary.
const QUARTER_SUMMARY_LEN: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub files_found: usize,
    pub files_loaded: usize,
    pub records_before: usize,
    pub duplicates_removed: usize,
    pub records_after: usize,
    pub per_keyword: BTreeMap<String, usize>,
    pub per_quarter: BTreeMap<String, usize>,
}

impl MergeStats {
    pub fn files_skipped(&self) -> usize {
        self.files_found - self.files_loaded
    }

    pub fn log_summary(&self) {
        info!(
            files_found = self.files_found,
            files_loaded = self.files_loaded,
            files_skipped = self.files_skipped(),
            records_before = self.records_before,
            duplicates_removed = self.duplicates_removed,
            records_after = self.records_after,
            "Merge summary"
        );
        for (keyword, count) in &self.per_keyword {
            info!(%keyword, count, "Records per keyword");
        }
        let skip = self.per_quarter.len().saturating_sub(QUARTER_SUMMARY_LEN);
        for (quarter, count) in self.per_quarter.iter().skip(skip) {
            info!(%quarter, count, "Records per quarter");
        }
    }
}

/// The merged, deduplicated records with their statistics.
#[derive(Debug, Clone)]
pub struct MergedDataset {
    pub records: Vec<NewsRecord>,
    pub stats: MergeStats,
}

#[derive(Debug, Clone)]
pub struct Merger {
    dedup_key: Option<String>,
    exclude: Option<PathBuf>,
}

impl Merger {
    /// `dedup_key` names the column to deduplicate on; `None` keeps duplicates.
    pub fn new(dedup_key: Option<&str>) -> Result<Self> {
        if let Some(key) = dedup_key {
            if !NewsRecord::has_column(key) {
                return Err(CollectError::UnknownColumn(key.to_string()));
            }
        }
        Ok(Self {
            dedup_key: dedup_key.map(String::from),
            exclude: None,
        })
    }

    /// Never read `path` as input, e.g. the merged file when it lives in the
    /// parts directory.
    pub fn excluding(mut self, path: impl Into<PathBuf>) -> Self {
        self.exclude = Some(path.into());
        self
    }

    /// Load and merge every part file in `source_dir`.
    ///
    /// # Arguments
    ///
    /// * `source_dir` - Directory holding the `*.csv` part files
    ///
    /// # Returns
    ///
    /// The deduplicated records in file-name order, with their [`MergeStats`].
    /// Unreadable files are skipped with a warning and counted as skipped.
    ///
    /// # Errors
    ///
    /// [`CollectError::EmptyInput`] when the directory is missing or no file
    /// could be loaded at all. Directory listing failures surface as
    /// [`CollectError::Io`].
    #[instrument(level = "info", skip(self), fields(source_dir = %source_dir.display()))]
    pub async fn merge(&self, source_dir: &Path) -> Result<MergedDataset> {
        let files = self.part_files(source_dir).await?;
        let mut stats = MergeStats {
            files_found: files.len(),
            ..MergeStats::default()
        };
        info!(files = files.len(), "Found part files");

        let mut records = Vec::new();
        for (i, path) in files.iter().enumerate() {
            match read_part(path).await {
                Ok(part) => {
                    stats.files_loaded += 1;
                    records.extend(part);
                }
                Err(e) => {
                    let e = CollectError::PartFileLoad {
                        path: path.clone(),
                        reason: e.to_string(),
                    };
                    warn!(error = %e, "Skipping unreadable part file");
                }
            }
            if (i + 1) % 10 == 0 {
                info!(read = i + 1, total = files.len(), "Reading part files");
            }
        }

        if stats.files_loaded == 0 {
            return Err(CollectError::EmptyInput(source_dir.to_path_buf()));
        }

        stats.records_before = records.len();
        let records = match &self.dedup_key {
            Some(key) => dedup_by_column(records, key),
            None => records,
        };
        stats.records_after = records.len();
        stats.duplicates_removed = stats.records_before - stats.records_after;

        for record in &records {
            *stats.per_keyword.entry(record.keyword.clone()).or_default() += 1;
            *stats.per_quarter.entry(record.quarter.clone()).or_default() += 1;
        }

        Ok(MergedDataset { records, stats })
    }

    /// [`Merger::merge`] followed by [`write_merged`] to `merged_path`.
    ///
    /// Nothing is written, and no directory is created, when the merge fails.
    pub async fn merge_into(
        &self,
        source_dir: &Path,
        merged_path: &Path,
        encoding: OutputEncoding,
    ) -> Result<MergedDataset> {
        let dataset = self.merge(source_dir).await?;
        dataset.stats.log_summary();
        write_merged(&dataset.records, merged_path, encoding).await?;
        Ok(dataset)
    }

    async fn part_files(&self, source_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = match fs::read_dir(source_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CollectError::EmptyInput(source_dir.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        let exclude = self
            .exclude
            .as_ref()
            .and_then(|p| std::fs::canonicalize(p).ok());
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "csv") || !path.is_file() {
                continue;
            }
            if exclude.is_some() && std::fs::canonicalize(&path).ok() == exclude {
                continue;
            }
            files.push(path);
        }
        files.sort();
        Ok(files)
    }
}

/// Drop records whose `column` value was already seen, keeping the first.
///
/// `column` must be one of [`crate::models::COLUMNS`].
pub fn dedup_by_column(records: Vec<NewsRecord>, column: &str) -> Vec<NewsRecord> {
    records
        .into_iter()
        .unique_by(|r| r.column(column).unwrap_or_default())
        .collect()
}

/// Write the merged dataset. Creates the parent directory if needed.
#[instrument(level = "info", skip(records), fields(path = %path.display(), count = records.len()))]
pub async fn write_merged(
    records: &[NewsRecord],
    path: &Path,
    encoding: OutputEncoding,
) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let bytes = encode_records(records, encoding)?;
    fs::write(path, bytes).await?;
    info!("Wrote merged file");
    Ok(())
}
