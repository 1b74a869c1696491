//! Part files: one CSV per (keyword, quarter) pair.
//!
//! # Output Structure
//!
//! ```text
//! parts_dir/
//! ├── 청도군_2022_Q1.csv
//! ├── 청도군_2022_Q2.csv
//! └── 경북시민재단_2022_Q1.csv
//! ```
//!
//! File names depend only on the pair, so re-running a pair overwrites its
//! previous file and concurrent workers never collide.

use crate::config::OutputEncoding;
use crate::error::{CollectError, Result};
use crate::models::{COLUMNS, NewsRecord};
use crate::utils::sanitize_file_component;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub fn part_file_name(keyword: &str, quarter: &str) -> String {
    format!(
        "{}_{}.csv",
        sanitize_file_component(keyword),
        sanitize_file_component(quarter)
    )
}

/// Serialize records to CSV bytes with a header row.
///
/// The header is written even when `records` is empty.
pub fn encode_records(records: &[NewsRecord], encoding: OutputEncoding) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    if encoding == OutputEncoding::Utf8Sig {
        buf.extend_from_slice(UTF8_BOM);
    }
    let mut writer = csv::Writer::from_writer(buf);
    if records.is_empty() {
        writer.write_record(COLUMNS)?;
    }
    for record in records {
        writer.serialize(record)?;
    }
    writer
        .into_inner()
        .map_err(|e| CollectError::Io(e.into_error()))
}

/// Parse CSV bytes produced by [`encode_records`], with or without a BOM.
pub fn decode_records(bytes: &[u8]) -> Result<Vec<NewsRecord>> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = csv::Reader::from_reader(bytes);
    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}

pub async fn read_part(path: &Path) -> Result<Vec<NewsRecord>> {
    let bytes = fs::read(path).await?;
    decode_records(&bytes)
}

/// Writes the records of one (keyword, quarter) pair to its part file.
#[derive(Debug, Clone)]
pub struct PartWriter {
    dir: PathBuf,
    encoding: OutputEncoding,
}

impl PartWriter {
    pub fn new(dir: impl Into<PathBuf>, encoding: OutputEncoding) -> Self {
        Self {
            dir: dir.into(),
            encoding,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Tag `records` with `keyword` and `quarter` and write them to
    /// `{keyword}_{quarter}.csv`, replacing any earlier file for the pair.
    ///
    /// # Arguments
    ///
    /// * `records` - Filtered records of one pair
    /// * `keyword` - Search keyword stamped into every record
    /// * `quarter` - Quarter label stamped into every record
    ///
    /// # Returns
    ///
    /// The written path, or `Ok(None)` without touching the filesystem when
    /// there is nothing to write.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the file cannot
    /// be encoded or written.
    #[instrument(level = "info", skip(self, records), fields(count = records.len()))]
    pub async fn write(
        &self,
        mut records: Vec<NewsRecord>,
        keyword: &str,
        quarter: &str,
    ) -> Result<Option<PathBuf>> {
        if records.is_empty() {
            return Ok(None);
        }
        for record in &mut records {
            record.keyword = keyword.to_string();
            record.quarter = quarter.to_string();
        }

        fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(part_file_name(keyword, quarter));
        let bytes = encode_records(&records, self.encoding)?;
        fs::write(&path, bytes).await?;
        info!(path = %path.display(), count = records.len(), "Wrote part file");
        Ok(Some(path))
    }
}
