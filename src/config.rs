//! Runtime configuration loaded from a YAML file.
//!
//! The configuration is read once at startup into a [`Config`] value that is
//! passed by reference into every component constructor. Every section and
//! field is optional; anything left out takes the value from [`Default`].
//!
//! ```yaml
//! keywords: ["청도군", "경북시민재단"]
//! collection:
//!   start_year: 2022
//!   display_per_page: 100
//!   max_items_per_query: 1000
//!   api_call_delay: 0.1
//! output:
//!   parts_dir: output_parts
//!   encoding: utf-8-sig
//! filtering:
//!   duplicate_check_column: url
//! ```

use crate::error::{CollectError, Result};
use crate::models::NewsRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Largest page size the search API accepts.
pub const MAX_DISPLAY_PER_PAGE: u32 = 100;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub keywords: Vec<String>,
    pub collection: CollectionConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
    pub filtering: FilteringConfig,
    pub api: ApiConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            keywords: ["청도혁신센터", "경북시민재단", "로컬임팩트랩", "경북지속가능캠프", "청도군"]
                .into_iter()
                .map(String::from)
                .collect(),
            collection: CollectionConfig::default(),
            output: OutputConfig::default(),
            logging: LoggingConfig::default(),
            filtering: FilteringConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

/// Pagination, pacing, and worker settings for the collection stage.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CollectionConfig {
    pub start_year: i32,
    pub display_per_page: u32,
    pub max_items_per_query: usize,
    /// Seconds slept before every follow-up page request.
    pub api_call_delay: f64,
    /// Per-request timeout in seconds.
    pub request_timeout: f64,
    /// Number of (keyword, quarter) pairs collected concurrently in `all` mode.
    pub workers: usize,
    /// Optional wall-clock limit in seconds for one (keyword, quarter) pair.
    pub task_timeout: Option<f64>,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            start_year: 2022,
            display_per_page: MAX_DISPLAY_PER_PAGE,
            max_items_per_query: 1000,
            api_call_delay: 0.1,
            request_timeout: 10.0,
            workers: 1,
            task_timeout: None,
        }
    }
}

impl CollectionConfig {
    pub fn api_call_delay(&self) -> Duration {
        Duration::from_secs_f64(self.api_call_delay)
    }

    /// Pause between two (keyword, quarter) pairs.
    pub fn pair_delay(&self) -> Duration {
        Duration::from_secs_f64(self.api_call_delay * 5.0)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.request_timeout)
    }

    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout.map(Duration::from_secs_f64)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub parts_dir: PathBuf,
    pub merged_dir: PathBuf,
    pub merged_filename: String,
    pub encoding: OutputEncoding,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            parts_dir: PathBuf::from("output_parts"),
            merged_dir: PathBuf::from("output"),
            merged_filename: "news_merged.csv".to_string(),
            encoding: OutputEncoding::Utf8Sig,
        }
    }
}

impl OutputConfig {
    pub fn merged_path(&self) -> PathBuf {
        self.merged_dir.join(&self.merged_filename)
    }
}

/// Text encoding of part and merged files.
///
/// `utf-8-sig` prefixes the file with a byte-order mark so spreadsheet tools
/// detect UTF-8 and render Korean text correctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum OutputEncoding {
    #[serde(rename = "utf-8", alias = "utf8", alias = "UTF-8")]
    Utf8,
    #[serde(rename = "utf-8-sig", alias = "utf8-sig", alias = "UTF-8-SIG")]
    Utf8Sig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            level: "INFO".to_string(),
        }
    }
}

impl LoggingConfig {
    /// `level` as a filter directive, accepting `WARNING` and `CRITICAL` as
    /// aliases for `warn` and `error`. `None` for anything unrecognized.
    pub fn filter_directive(&self) -> Option<&'static str> {
        match self.level.trim().to_ascii_lowercase().as_str() {
            "trace" => Some("trace"),
            "debug" => Some("debug"),
            "info" => Some("info"),
            "warn" | "warning" => Some("warn"),
            "error" | "critical" => Some("error"),
            "off" => Some("off"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FilteringConfig {
    pub exact_phrase_match: bool,
    pub remove_duplicates: bool,
    pub duplicate_check_column: String,
}

impl Default for FilteringConfig {
    fn default() -> Self {
        Self {
            exact_phrase_match: true,
            remove_duplicates: true,
            duplicate_check_column: "url".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    pub search_endpoint: String,
    pub sort: String,
    /// Total number of attempts per request, including the first one.
    pub retry_count: usize,
    /// Seconds slept between two attempts.
    pub retry_delay: f64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            search_endpoint: "https://openapi.naver.com/v1/search".to_string(),
            sort: "date".to_string(),
            retry_count: 3,
            retry_delay: 1.0,
        }
    }
}

impl ApiConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs_f64(self.retry_delay)
    }
}

/// Where the active configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// The file did not exist; built-in defaults are in use.
    Defaults(PathBuf),
}

impl Config {
    /// Load and validate the configuration at `path`.
    ///
    /// A missing file yields the defaults (reported through [`ConfigSource::Defaults`]);
    /// a file that exists but cannot be parsed or fails validation is an error.
    pub fn load(path: &Path) -> Result<(Self, ConfigSource)> {
        let (config, source) = match std::fs::read_to_string(path) {
            Ok(raw) => {
                let config = Self::from_yaml(&raw)
                    .map_err(|e| CollectError::Config(format!("{}: {e}", path.display())))?;
                (config, ConfigSource::File(path.to_path_buf()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                (Self::default(), ConfigSource::Defaults(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        config.validate()?;
        Ok((config, source))
    }

    pub fn from_yaml(raw: &str) -> std::result::Result<Self, serde_yaml::Error> {
        // An empty document deserializes to unit, not to a mapping.
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    pub fn validate(&self) -> Result<()> {
        let c = &self.collection;
        if c.display_per_page == 0 || c.display_per_page > MAX_DISPLAY_PER_PAGE {
            return Err(CollectError::Config(format!(
                "collection.display_per_page must be between 1 and {MAX_DISPLAY_PER_PAGE}, got {}",
                c.display_per_page
            )));
        }
        if c.max_items_per_query == 0 {
            return Err(CollectError::Config(
                "collection.max_items_per_query must be at least 1".to_string(),
            ));
        }
        if c.workers == 0 {
            return Err(CollectError::Config("collection.workers must be at least 1".to_string()));
        }
        for (name, secs) in [
            ("collection.api_call_delay", Some(c.api_call_delay)),
            ("collection.request_timeout", Some(c.request_timeout)),
            ("collection.task_timeout", c.task_timeout),
            ("api.retry_delay", Some(self.api.retry_delay)),
        ] {
            if let Some(secs) = secs {
                if !secs.is_finite() || secs < 0.0 {
                    return Err(CollectError::Config(format!(
                        "{name} must be a non-negative number of seconds, got {secs}"
                    )));
                }
            }
        }
        if self.logging.filter_directive().is_none() {
            return Err(CollectError::Config(format!(
                "logging.level must be one of TRACE, DEBUG, INFO, WARNING, ERROR, CRITICAL, got '{}'",
                self.logging.level
            )));
        }
        if self.api.retry_count == 0 {
            return Err(CollectError::Config("api.retry_count must be at least 1".to_string()));
        }
        if !NewsRecord::has_column(&self.filtering.duplicate_check_column) {
            return Err(CollectError::UnknownColumn(
                self.filtering.duplicate_check_column.clone(),
            ));
        }
        Ok(())
    }

    /// Dedup column for the merge stage, or `None` when deduplication is off.
    pub fn dedup_key(&self) -> Option<&str> {
        self.filtering
            .remove_duplicates
            .then_some(self.filtering.duplicate_check_column.as_str())
    }

    pub fn log_summary(&self, source: &ConfigSource) {
        match source {
            ConfigSource::File(path) => info!(path = %path.display(), "Loaded configuration"),
            ConfigSource::Defaults(path) => {
                warn!(path = %path.display(), "Configuration file not found; using defaults")
            }
        }
        info!(
            keywords = self.keywords.len(),
            start_year = self.collection.start_year,
            display_per_page = self.collection.display_per_page,
            max_items_per_query = self.collection.max_items_per_query,
            workers = self.collection.workers,
            exact_phrase_match = self.filtering.exact_phrase_match,
            "Configuration summary"
        );
    }
}

/// The two credential strings sent as request headers.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    /// Build credentials, refusing blank or missing values.
    pub fn resolve(client_id: Option<String>, client_secret: Option<String>) -> Result<Self> {
        let client_id = client_id
            .filter(|v| !v.trim().is_empty())
            .ok_or(CollectError::MissingCredentials("NAVER_CLIENT_ID"))?;
        let client_secret = client_secret
            .filter(|v| !v.trim().is_empty())
            .ok_or(CollectError::MissingCredentials("NAVER_CLIENT_SECRET"))?;
        Ok(Self {
            client_id,
            client_secret,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &format!("...({} chars)", self.client_id.len()))
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.keywords.len(), 5);
        assert_eq!(config.collection.start_year, 2022);
        assert_eq!(config.collection.display_per_page, 100);
        assert_eq!(config.collection.max_items_per_query, 1000);
        assert_eq!(config.collection.pair_delay(), Duration::from_millis(500));
        assert_eq!(config.output.encoding, OutputEncoding::Utf8Sig);
        assert_eq!(config.output.merged_path(), PathBuf::from("output/news_merged.csv"));
        assert_eq!(config.api.retry_count, 3);
        assert_eq!(config.dedup_key(), Some("url"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let yaml = r#"
keywords: ["청도군"]
collection:
  start_year: 2024
  display_per_page: 50
output:
  encoding: utf-8
filtering:
  remove_duplicates: false
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.keywords, vec!["청도군".to_string()]);
        assert_eq!(config.collection.start_year, 2024);
        assert_eq!(config.collection.display_per_page, 50);
        assert_eq!(config.collection.max_items_per_query, 1000);
        assert_eq!(config.output.encoding, OutputEncoding::Utf8);
        assert_eq!(config.output.parts_dir, PathBuf::from("output_parts"));
        assert_eq!(config.dedup_key(), None);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config = Config::from_yaml("   \n").unwrap();
        assert_eq!(config.collection.start_year, 2022);
    }

    #[test]
    fn test_validate_rejects_oversized_page() {
        let mut config = Config::default();
        config.collection.display_per_page = 150;
        assert!(matches!(config.validate(), Err(CollectError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_unknown_dedup_column() {
        let mut config = Config::default();
        config.filtering.duplicate_check_column = "link".to_string();
        assert!(matches!(config.validate(), Err(CollectError::UnknownColumn(c)) if c == "link"));
    }

    #[test]
    fn test_validate_rejects_negative_delay() {
        let mut config = Config::default();
        config.api.retry_delay = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_level_aliases_map_to_filter_levels() {
        use tracing_subscriber::EnvFilter;
        use tracing_subscriber::filter::LevelFilter;

        let mut config = Config::default();
        for (level, directive, hint) in [
            ("INFO", "info", LevelFilter::INFO),
            ("WARNING", "warn", LevelFilter::WARN),
            ("Critical", "error", LevelFilter::ERROR),
            ("debug", "debug", LevelFilter::DEBUG),
        ] {
            config.logging.level = level.to_string();
            assert!(config.validate().is_ok(), "{level} should validate");
            assert_eq!(config.logging.filter_directive(), Some(directive));
            assert_eq!(EnvFilter::new(directive).max_level_hint(), Some(hint));
        }
    }

    #[test]
    fn test_validate_rejects_unknown_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert_eq!(config.logging.filter_directive(), None);
        assert!(matches!(config.validate(), Err(CollectError::Config(msg)) if msg.contains("verbose")));
    }

    #[test]
    fn test_load_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");
        let (config, source) = Config::load(&path).unwrap();
        assert_eq!(source, ConfigSource::Defaults(path));
        assert_eq!(config.collection.start_year, 2022);
    }

    #[test]
    fn test_load_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "collection: [not, a, mapping").unwrap();
        assert!(matches!(Config::load(&path), Err(CollectError::Config(_))));
    }

    #[test]
    fn test_credentials_require_both_values() {
        let missing_id = Credentials::resolve(None, Some("secret".into()));
        assert!(matches!(missing_id, Err(CollectError::MissingCredentials("NAVER_CLIENT_ID"))));

        let blank_secret = Credentials::resolve(Some("id".into()), Some("  ".into()));
        assert!(matches!(
            blank_secret,
            Err(CollectError::MissingCredentials("NAVER_CLIENT_SECRET"))
        ));

        let creds = Credentials::resolve(Some("id".into()), Some("secret".into())).unwrap();
        assert!(!format!("{creds:?}").contains("\"secret\""));
    }
}
