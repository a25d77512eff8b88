//! Configuration for the context optimizer
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! environment variables prefixed with `CONTEXT_OPTIMIZER` (sections separated
//! by `__`, e.g. `CONTEXT_OPTIMIZER__SCORING__MAX_FILES=30`).

use crate::error::{ContextError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "CONTEXT_OPTIMIZER";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub optimizer: OptimizerConfig,

    #[serde(default)]
    pub scan: ScanConfig,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from defaults, an optional TOML file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // A missing .env file is normal
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("scan.ignore"),
        );

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string (no environment layering)
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate that the configuration is consistent
    pub fn validate(&self) -> Result<()> {
        if self.cache.ttl_hours == 0 {
            return Err(ContextError::Configuration(
                "cache.ttl_hours must be greater than zero".to_string(),
            ));
        }
        if self.scoring.max_files == 0 {
            return Err(ContextError::Configuration(
                "scoring.max_files must be greater than zero".to_string(),
            ));
        }
        if self.scoring.size_ceiling_bytes == 0 {
            return Err(ContextError::Configuration(
                "scoring.size_ceiling_bytes must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.scoring.min_score) {
            return Err(ContextError::Configuration(format!(
                "scoring.min_score must be within [0, 1], got {}",
                self.scoring.min_score
            )));
        }
        if self.optimizer.history_capacity == 0 || self.optimizer.result_cache_capacity == 0 {
            return Err(ContextError::Configuration(
                "optimizer capacities must be greater than zero".to_string(),
            ));
        }
        if self.scan.read_concurrency == 0 {
            return Err(ContextError::Configuration(
                "scan.read_concurrency must be greater than zero".to_string(),
            ));
        }
        if self.limits.daily_tokens == 0 || self.limits.monthly_tokens == 0 {
            return Err(ContextError::Configuration(
                "token limits must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Snapshot cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Location of the persisted cache document
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,

    /// Validity window of a cached snapshot
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u64,

    /// Write the cache to disk after every mutation
    #[serde(default = "default_true")]
    pub persist: bool,
}

fn default_cache_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("context-optimizer")
        .join("cache.json")
}

fn default_ttl_hours() -> u64 {
    24
}

fn default_true() -> bool {
    true
}

impl CacheConfig {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.ttl_hours as i64)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
            ttl_hours: default_ttl_hours(),
            persist: default_true(),
        }
    }
}

/// Relevance scoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Default number of files returned by context selection
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// Files scoring at or below this are never selected
    #[serde(default = "default_min_score")]
    pub min_score: f64,

    /// Files at or above this size earn no size score
    #[serde(default = "default_size_ceiling")]
    pub size_ceiling_bytes: u64,

    /// Freshness decays linearly to zero over this many days
    #[serde(default = "default_freshness_days")]
    pub freshness_days: u32,
}

fn default_max_files() -> usize {
    20
}

fn default_min_score() -> f64 {
    0.1
}

fn default_size_ceiling() -> u64 {
    100_000
}

fn default_freshness_days() -> u32 {
    30
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            min_score: default_min_score(),
            size_ceiling_bytes: default_size_ceiling(),
            freshness_days: default_freshness_days(),
        }
    }
}

/// Which token estimator to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerKind {
    /// Fixed four characters per token
    CharRatio,
    /// cl100k_base BPE
    Cl100k,
}

/// Optimizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Maximum number of task signatures kept in history
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Maximum number of results kept by adaptive caching
    #[serde(default = "default_result_cache_capacity")]
    pub result_cache_capacity: usize,

    /// Time budgets below this favour extreme compression
    #[serde(default = "default_realtime_threshold_ms")]
    pub realtime_threshold_ms: u64,

    /// Quality requirements above this favour smart summarization
    #[serde(default = "default_high_quality_threshold")]
    pub high_quality_threshold: f64,

    /// Number of previous tasks carried into constraints
    #[serde(default = "default_previous_tasks_limit")]
    pub previous_tasks_limit: usize,

    #[serde(default = "default_tokenizer")]
    pub tokenizer: TokenizerKind,
}

fn default_history_capacity() -> usize {
    256
}

fn default_result_cache_capacity() -> usize {
    64
}

fn default_realtime_threshold_ms() -> u64 {
    2000
}

fn default_high_quality_threshold() -> f64 {
    0.8
}

fn default_previous_tasks_limit() -> usize {
    10
}

fn default_tokenizer() -> TokenizerKind {
    TokenizerKind::CharRatio
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            result_cache_capacity: default_result_cache_capacity(),
            realtime_threshold_ms: default_realtime_threshold_ms(),
            high_quality_threshold: default_high_quality_threshold(),
            previous_tasks_limit: default_previous_tasks_limit(),
            tokenizer: default_tokenizer(),
        }
    }
}

/// Project scanning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Files larger than this are listed but not read
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,

    /// Glob patterns excluded from scans
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,

    /// Maximum concurrent file reads
    #[serde(default = "default_read_concurrency")]
    pub read_concurrency: usize,
}

fn default_max_file_bytes() -> u64 {
    1024 * 1024
}

fn default_ignore() -> Vec<String> {
    [
        "**/node_modules/**",
        "**/.git/**",
        "**/target/**",
        "**/dist/**",
        "**/build/**",
        "**/__pycache__/**",
        "**/.build/**",
        "**/venv/**",
        "**/.venv/**",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_read_concurrency() -> usize {
    8
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: default_max_file_bytes(),
            ignore: default_ignore(),
            read_concurrency: default_read_concurrency(),
        }
    }
}

/// Token usage limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_daily_tokens")]
    pub daily_tokens: u64,

    #[serde(default = "default_monthly_tokens")]
    pub monthly_tokens: u64,
}

fn default_daily_tokens() -> u64 {
    1_000_000
}

fn default_monthly_tokens() -> u64 {
    20_000_000
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            daily_tokens: default_daily_tokens(),
            monthly_tokens: default_monthly_tokens(),
        }
    }
}

/// Package registry configuration used for update checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_npm_url")]
    pub npm_url: String,

    #[serde(default = "default_pypi_url")]
    pub pypi_url: String,

    #[serde(default = "default_crates_url")]
    pub crates_url: String,

    #[serde(default = "default_registry_timeout")]
    pub timeout_secs: u64,
}

fn default_npm_url() -> String {
    "https://registry.npmjs.org".to_string()
}

fn default_pypi_url() -> String {
    "https://pypi.org/pypi".to_string()
}

fn default_crates_url() -> String {
    "https://crates.io/api/v1/crates".to_string()
}

fn default_registry_timeout() -> u64 {
    10
}

impl RegistryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            npm_url: default_npm_url(),
            pypi_url: default_pypi_url(),
            crates_url: default_crates_url(),
            timeout_secs: default_registry_timeout(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache.ttl_hours, 24);
        assert_eq!(config.scoring.max_files, 20);
        assert_eq!(config.optimizer.tokenizer, TokenizerKind::CharRatio);
    }

    #[test]
    fn test_from_toml_overrides_sections() {
        let config = Config::from_toml_str(
            r#"
            [scoring]
            max_files = 7

            [optimizer]
            tokenizer = "cl100k"

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.scoring.max_files, 7);
        assert_eq!(config.scoring.min_score, 0.1);
        assert_eq!(config.optimizer.tokenizer, TokenizerKind::Cl100k);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.cache.ttl_hours, 24);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = Config::from_toml_str(
            r#"
            [scoring]
            max_files = 0
            "#,
        );
        assert!(matches!(result, Err(ContextError::Configuration(_))));
    }

    #[test]
    fn test_default_ignore_covers_vendor_dirs() {
        let scan = ScanConfig::default();
        assert!(scan.ignore.iter().any(|p| p.contains("node_modules")));
        assert!(scan.ignore.iter().any(|p| p.contains(".git")));
    }
}
