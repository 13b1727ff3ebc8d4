//! Configuration loading and validation.
//!
//! Settings come from an optional TOML file, overridden by `USAGE_TRACKER__*`
//! environment variables (`USAGE_TRACKER__SERVER__PORT=9000`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fetch::FetcherConfig;
use crate::resolve::{ResolverOptions, DEFAULT_CUTOFF, DEFAULT_MAX_CANDIDATES};
use crate::storage::StorageConfig;

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "USAGE_TRACKER";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to load config: {0}")]
    Layered(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Upstream snapshot source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Document slug with `{year}` and `{reg}` placeholders
    #[serde(default = "default_slug_template")]
    pub slug_template: String,

    /// Regulation letters in the order they are tried
    #[serde(default = "default_regulations")]
    pub regulations: String,

    /// Timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_base_url() -> String {
    "https://www.smogon.com/stats".to_string()
}

fn default_slug_template() -> String {
    "gen9vgc{year}reg{reg}bo3-1760.json".to_string()
}

fn default_regulations() -> String {
    "zyxwvutsrqponmlkjihgfedcba".to_string()
}

fn default_timeout() -> u64 {
    60
}

fn default_user_agent() -> String {
    "usage-tracker/0.1.0".to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            slug_template: default_slug_template(),
            regulations: default_regulations(),
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl SourceConfig {
    /// Fetcher settings saving raw documents under `raw_dir`.
    pub fn fetcher_config(&self, raw_dir: PathBuf) -> FetcherConfig {
        FetcherConfig {
            base_url: self.base_url.clone(),
            slug_template: self.slug_template.clone(),
            regulations: self.regulations.clone(),
            raw_dir,
            timeout: Duration::from_secs(self.timeout_seconds),
            user_agent: self.user_agent.clone(),
        }
    }
}

/// Name resolution tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Maximum candidates returned
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    /// Minimum fuzzy score, 0.0 - 1.0
    #[serde(default = "default_cutoff")]
    pub cutoff: f64,
}

fn default_max_candidates() -> usize {
    DEFAULT_MAX_CANDIDATES
}

fn default_cutoff() -> f64 {
    DEFAULT_CUTOFF
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_candidates: default_max_candidates(),
            cutoff: default_cutoff(),
        }
    }
}

impl From<&ResolverConfig> for ResolverOptions {
    fn from(config: &ResolverConfig) -> Self {
        ResolverOptions {
            max_candidates: config.max_candidates,
            cutoff: config.cutoff,
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "*".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            source: SourceConfig::default(),
            resolver: ResolverConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load an optional TOML file layered under environment overrides.
    ///
    /// A missing file is not an error; every setting then has its default.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config: AppConfig = config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn storage(&self) -> StorageConfig {
        StorageConfig::new(self.data_dir.clone())
    }

    pub fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions::from(&self.resolver)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "Source timeout must be greater than 0".to_string(),
            ));
        }

        if self.source.regulations.is_empty() {
            return Err(ConfigError::ValidationError(
                "At least one regulation letter is required".to_string(),
            ));
        }

        if !self.source.slug_template.contains("{reg}") {
            return Err(ConfigError::ValidationError(
                "Slug template must contain {reg}".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.resolver.cutoff) {
            return Err(ConfigError::ValidationError(
                "Resolver cutoff must be between 0 and 1".to_string(),
            ));
        }

        if self.resolver.max_candidates == 0 {
            return Err(ConfigError::ValidationError(
                "Resolver must return at least one candidate".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "Server port must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
