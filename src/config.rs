//! Configuration types for tubeshelf
//!
//! Configuration is a TOML file with one required section (`[channel]`) and optional
//! `[filters]`, `[download]`, `[storage]` and `[logging]` sections. `${VAR}` references in
//! string values are expanded from the environment (after an optional `.env` file has been
//! applied) and a leading `~` in the library directory is expanded to the home directory.
//! The result is validated once and treated as immutable afterwards.

use crate::error::{Error, Result};
use crate::source::ChannelRef;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info};

/// Channel to watch and credentials for the metered video API
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Video API key (empty = feed-only operation)
    #[serde(default)]
    pub api_key: String,

    /// Channel reference (`https://www.youtube.com/@handle`, `/channel/UC...`, `/c/name`,
    /// `/user/name`, or a bare `@handle`)
    pub channel_url: String,

    /// Daily API quota in units (default: 10000)
    #[serde(default = "default_quota_limit")]
    pub quota_limit: u32,
}

/// One title pattern of the filter chain
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitlePattern {
    /// Text to look for in the title (case-insensitive)
    pub pattern: String,

    /// Minimum fuzzy score, 0-100 (default: 80)
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: u32,
}

/// Filter chain settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FiltersConfig {
    /// Maximum upload age in days; 0 disables the recency filter (default: 7)
    #[serde(default = "default_upload_window_days")]
    pub upload_window_days: i64,

    /// Title patterns; an upload passes when any pattern matches
    #[serde(default)]
    pub title_patterns: Vec<TitlePattern>,

    /// Minimum duration in minutes (None = no lower bound)
    #[serde(default)]
    pub min_duration_minutes: Option<u64>,

    /// Maximum duration in minutes (None = no upper bound)
    #[serde(default)]
    pub max_duration_minutes: Option<u64>,

    /// Uploads whose title or description contains any of these are dropped
    #[serde(default)]
    pub exclude_keywords: Vec<String>,
}

impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            upload_window_days: default_upload_window_days(),
            title_patterns: Vec::new(),
            min_duration_minutes: None,
            max_duration_minutes: None,
            exclude_keywords: Vec::new(),
        }
    }
}

/// Download tool settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// yt-dlp format selector (default: "best[height<=1080]")
    #[serde(default = "default_quality")]
    pub quality: String,

    /// Download audio only (`bestaudio/best`), ignoring `quality`
    #[serde(default)]
    pub audio_only: bool,

    /// Subtitle languages to fetch (empty = no subtitles)
    #[serde(default = "default_subtitle_languages")]
    pub subtitle_languages: Vec<String>,

    /// Path to the yt-dlp executable (auto-detected on PATH if None)
    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            quality: default_quality(),
            audio_only: false,
            subtitle_languages: default_subtitle_languages(),
            ytdlp_path: None,
        }
    }
}

/// Library layout settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Library root (default: "~/tv-shows")
    #[serde(default = "default_base_directory")]
    pub base_directory: PathBuf,

    /// Put episodes under `Season NN` directories
    #[serde(default = "default_true")]
    pub organize_by_season: bool,

    /// Write `.nfo` sidecars next to downloaded media
    #[serde(default = "default_true")]
    pub generate_metadata: bool,

    /// Remove `.part`/`.tmp`/`.ytdl` leftovers after each batch
    #[serde(default = "default_true")]
    pub cleanup_partial_downloads: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_directory: default_base_directory(),
            organize_by_season: true,
            generate_metadata: true,
            cleanup_partial_downloads: true,
        }
    }
}

/// Logging settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// One of DEBUG, INFO, WARNING, ERROR, CRITICAL (default: INFO)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file; rotated daily (default: "logs/tubeshelf.log")
    #[serde(default = "default_log_file")]
    pub file_path: PathBuf,

    /// Rotated files to keep (default: 5)
    #[serde(default = "default_backup_count")]
    pub backup_count: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_path: default_log_file(),
            backup_count: default_backup_count(),
        }
    }
}

/// Main configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Channel and API credentials
    pub channel: ChannelConfig,

    /// Filter chain
    #[serde(default)]
    pub filters: FiltersConfig,

    /// Download tool
    #[serde(default)]
    pub download: DownloadConfig,

    /// Library layout
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Result of [`Config::check_environment`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnvironmentReport {
    /// Environment variables that still need to be provided
    pub missing: Vec<String>,
}

impl EnvironmentReport {
    /// Whether everything needed is present
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Accepted log level names
pub const LOG_LEVELS: &[&str] = &["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"];

static ENV_REF: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").ok());

impl Config {
    /// Load configuration from a TOML file
    ///
    /// When `env_file` exists it is loaded into the process environment first, so
    /// `${VAR}` references can be satisfied from it. Variables already set in the
    /// environment take precedence over the file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the file is missing or a setting is invalid, and
    /// [`Error::ConfigParse`] when the TOML is malformed.
    pub fn load(path: &Path, env_file: Option<&Path>) -> Result<Self> {
        if let Some(env_file) = env_file
            && env_file.exists()
        {
            dotenvy::from_path(env_file).map_err(|e| Error::Config {
                message: format!("failed to load {}: {}", env_file.display(), e),
                key: None,
            })?;
            debug!(path = ?env_file, "loaded environment file");
        }

        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read configuration file {}: {}", path.display(), e),
            key: None,
        })?;

        let config = Self::from_toml_str(&content)?;
        info!(path = ?path, channel = %config.channel.channel_url, "configuration loaded");
        Ok(config)
    }

    /// Parse, expand and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(content)?;
        let mut value = toml::Value::Table(table);
        expand_env_in_value(&mut value);

        let mut config: Config = value.try_into()?;
        config.storage.base_directory = expand_home(&config.storage.base_directory);
        config.validate()?;
        Ok(config)
    }

    /// Check every setting, returning the first problem found
    pub fn validate(&self) -> Result<()> {
        ChannelRef::parse(&self.channel.channel_url).map_err(|_| {
            Error::config(
                "channel.channel_url",
                format!(
                    "invalid channel reference '{}' (expected a youtube.com @handle, /channel/, /c/ or /user/ URL)",
                    self.channel.channel_url
                ),
            )
        })?;

        if self.channel.quota_limit < 1 {
            return Err(Error::config("channel.quota_limit", "must be at least 1"));
        }

        if self.filters.upload_window_days < 0 {
            return Err(Error::config(
                "filters.upload_window_days",
                format!(
                    "must be 0 or more, got {}",
                    self.filters.upload_window_days
                ),
            ));
        }

        for (i, pattern) in self.filters.title_patterns.iter().enumerate() {
            if pattern.fuzzy_threshold > 100 {
                return Err(Error::config(
                    format!("filters.title_patterns[{i}].fuzzy_threshold"),
                    format!("must be between 0 and 100, got {}", pattern.fuzzy_threshold),
                ));
            }
        }

        if let Some(max) = self.filters.max_duration_minutes {
            if max < 1 {
                return Err(Error::config(
                    "filters.max_duration_minutes",
                    "must be at least 1",
                ));
            }
            if let Some(min) = self.filters.min_duration_minutes
                && max <= min
            {
                return Err(Error::config(
                    "filters.max_duration_minutes",
                    format!(
                        "must be greater than min_duration_minutes ({max} <= {min})"
                    ),
                ));
            }
        }

        if !LOG_LEVELS
            .iter()
            .any(|l| l.eq_ignore_ascii_case(&self.logging.level))
        {
            return Err(Error::config(
                "logging.level",
                format!(
                    "unknown level '{}' (expected one of {})",
                    self.logging.level,
                    LOG_LEVELS.join(", ")
                ),
            ));
        }

        let base = &self.storage.base_directory;
        let parent_exists = match base.parent() {
            Some(parent) if parent.as_os_str().is_empty() => true,
            Some(parent) => parent.exists(),
            None => true,
        };
        if !parent_exists {
            return Err(Error::config(
                "storage.base_directory",
                format!("parent directory of {} does not exist", base.display()),
            ));
        }

        Ok(())
    }

    /// Report environment variables the configuration still depends on
    ///
    /// The API key counts as missing when empty or still an unexpanded `${...}`
    /// placeholder.
    pub fn check_environment(&self) -> EnvironmentReport {
        let mut missing = Vec::new();
        let key = self.channel.api_key.trim();
        if key.is_empty() || key.contains("${") {
            missing.push("YOUTUBE_API_KEY".to_string());
        }
        EnvironmentReport { missing }
    }

    /// Whether an API key is configured and expanded
    pub fn has_api_key(&self) -> bool {
        self.check_environment().is_complete()
    }
}

/// Replace `${VAR}` with the variable's value; unknown variables stay verbatim
pub fn expand_env_vars(text: &str) -> String {
    let Some(re) = ENV_REF.as_ref() else {
        return text.to_string();
    };
    re.replace_all(text, |caps: &regex::Captures<'_>| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}

fn expand_env_in_value(value: &mut toml::Value) {
    match value {
        toml::Value::String(s) => *s = expand_env_vars(s),
        toml::Value::Array(items) => items.iter_mut().for_each(expand_env_in_value),
        toml::Value::Table(table) => table.iter_mut().for_each(|(_, v)| expand_env_in_value(v)),
        _ => {}
    }
}

/// Expand a leading `~` to the user's home directory
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match directories::BaseDirs::new() {
        Some(dirs) => dirs.home_dir().join(rest),
        None => path.to_path_buf(),
    }
}

fn default_quota_limit() -> u32 {
    10_000
}

fn default_fuzzy_threshold() -> u32 {
    80
}

fn default_upload_window_days() -> i64 {
    7
}

fn default_quality() -> String {
    "best[height<=1080]".to_string()
}

fn default_subtitle_languages() -> Vec<String> {
    vec!["en".to_string(), "en-US".to_string()]
}

fn default_base_directory() -> PathBuf {
    PathBuf::from("~/tv-shows")
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "INFO".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("logs/tubeshelf.log")
}

fn default_backup_count() -> usize {
    5
}
