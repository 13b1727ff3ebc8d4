//! Snapshot document retrieval.
//!
//! A [`SnapshotSource`] produces the raw document for one period. [`HttpSource`]
//! probes an ordered list of document slugs on the stats server and saves the first
//! hit under the raw data directory; [`LocalSource`] reads documents saved earlier.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

use crate::models::{period_year, PeriodError};

/// Errors that can occur during fetching.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("No snapshot found for {period}. Tried: {tried}")]
    NotFound { period: String, tried: String },

    #[error(transparent)]
    Period(#[from] PeriodError),

    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

/// A raw snapshot document for one period.
#[derive(Debug, Clone)]
pub struct RawSnapshot {
    pub period: String,
    /// Document identifier, e.g. "gen9vgc2025regibo3-1760.json"
    pub slug: String,
    /// Where the document is stored locally
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

impl RawSnapshot {
    /// Parse the document as JSON.
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.bytes)
    }
}

/// Something that can produce the raw document for a period.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_period(&self, period: &str) -> Result<RawSnapshot, FetchError>;
}

/// Configuration for the HTTP source.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Stats server root; documents live at `{base_url}/{period}/chaos/{slug}`
    pub base_url: String,

    /// Slug template with `{year}` and `{reg}` placeholders
    pub slug_template: String,

    /// Regulation letters, tried in order
    pub regulations: String,

    /// Directory to save raw documents
    pub raw_dir: PathBuf,

    /// Request timeout
    pub timeout: Duration,

    /// User agent string
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.smogon.com/stats".to_string(),
            slug_template: "gen9vgc{year}reg{reg}bo3-1760.json".to_string(),
            regulations: "zyxwvutsrqponmlkjihgfedcba".to_string(),
            raw_dir: PathBuf::from("./data/raw"),
            timeout: Duration::from_secs(60),
            user_agent: "usage-tracker/0.1.0".to_string(),
        }
    }
}

impl FetcherConfig {
    /// Slugs to try for a period, most recent regulation first.
    pub fn candidate_slugs(&self, period: &str) -> Result<Vec<String>, FetchError> {
        let year = period_year(period)?.to_string();
        Ok(self
            .regulations
            .chars()
            .map(|reg| {
                self.slug_template
                    .replace("{year}", &year)
                    .replace("{reg}", &reg.to_string())
            })
            .collect())
    }

    /// Document URL for a period and slug.
    pub fn document_url(&self, period: &str, slug: &str) -> Result<Url, FetchError> {
        let raw = format!("{}/{}/chaos/{}", self.base_url.trim_end_matches('/'), period, slug);
        Url::parse(&raw).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", raw, e)))
    }
}

/// Short list of tried slugs for error messages.
fn preview(slugs: &[String]) -> String {
    let mut out = slugs.iter().take(6).cloned().collect::<Vec<_>>().join(", ");
    if slugs.len() > 6 {
        out.push_str(" ...");
    }
    out
}

/// Downloads snapshot documents over HTTP.
pub struct HttpSource {
    client: Client,
    config: FetcherConfig,
}

impl HttpSource {
    /// Create a new source with the given configuration.
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static("usage-tracker/0.1.0")),
        );

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// Fetch one document. Non-success statuses and empty bodies are errors.
    async fn download(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url.as_str()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let content = response.bytes().await?;
        if content.is_empty() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                message: "empty body".to_string(),
            });
        }
        Ok(content.to_vec())
    }

    async fn save(&self, period: &str, slug: &str, bytes: &[u8]) -> Result<PathBuf, FetchError> {
        let dir = self.config.raw_dir.join(period);
        fs::create_dir_all(&dir).await?;

        let path = dir.join(slug);
        let mut file = fs::File::create(&path).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        Ok(path)
    }
}

#[async_trait]
impl SnapshotSource for HttpSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch_period(&self, period: &str) -> Result<RawSnapshot, FetchError> {
        let slugs = self.config.candidate_slugs(period)?;

        for slug in &slugs {
            let url = self.config.document_url(period, slug)?;
            let bytes = match self.download(&url).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    debug!("Skipping {}: {}", url, e);
                    continue;
                }
            };
            match self.save(period, slug, &bytes).await {
                Ok(path) => {
                    info!("Downloaded {} ({} bytes) -> {:?}", url, bytes.len(), path);
                    return Ok(RawSnapshot {
                        period: period.to_string(),
                        slug: slug.clone(),
                        path,
                        bytes,
                    });
                }
                Err(e) => warn!("Downloaded {} but could not save it: {}", url, e),
            }
        }

        warn!("No snapshot found for {} after {} candidates", period, slugs.len());
        Err(FetchError::NotFound {
            period: period.to_string(),
            tried: preview(&slugs),
        })
    }
}

/// Reads documents previously saved under `<raw_dir>/<period>/`.
///
/// When several documents exist for a period, the one with the greatest file name
/// wins, which for the default slug template is the latest regulation.
pub struct LocalSource {
    raw_dir: PathBuf,
}

impl LocalSource {
    pub fn new(raw_dir: impl Into<PathBuf>) -> Self {
        Self {
            raw_dir: raw_dir.into(),
        }
    }

    fn pick(&self, period: &str) -> Result<Option<PathBuf>, FetchError> {
        let pattern = self.raw_dir.join(period).join("*.json");
        let pattern = pattern.to_string_lossy();

        let best = glob::glob(&pattern)?
            .filter_map(Result::ok)
            .filter(|p| p.is_file())
            .max_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(best)
    }
}

#[async_trait]
impl SnapshotSource for LocalSource {
    fn name(&self) -> &str {
        "local"
    }

    async fn fetch_period(&self, period: &str) -> Result<RawSnapshot, FetchError> {
        let Some(path) = self.pick(period)? else {
            return Err(FetchError::NotFound {
                period: period.to_string(),
                tried: self.raw_dir.join(period).join("*.json").display().to_string(),
            });
        };

        let bytes = fs::read(&path).await?;
        let slug = file_name(&path);
        debug!("Read {} ({} bytes) from {:?}", slug, bytes.len(), path);

        Ok(RawSnapshot {
            period: period.to_string(),
            slug,
            path,
            bytes,
        })
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
