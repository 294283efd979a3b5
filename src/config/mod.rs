use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;

use defaults::*;

/// Environment variable prefix for configuration overrides
///
/// Nested keys are separated by a double underscore, e.g.
/// `FOLDER_PUBLISHER_PUBLISHER__ACCESS_TOKEN`.
pub const ENV_PREFIX: &str = "FOLDER_PUBLISHER_";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub publisher: PublisherConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub web: WebConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SeaORM connection URL, or `memory:` for a volatile ledger
    #[serde(default = "default_database_url")]
    pub url: String,
    pub max_connections: Option<u32>,
}

/// Which publishing API client to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PublisherKind {
    #[serde(rename = "youtube")]
    YouTube,
    #[serde(rename = "dry_run")]
    DryRun,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    #[serde(default = "default_publisher_kind")]
    pub kind: PublisherKind,
    /// Bearer token for the publishing API (obtained out of band)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default = "default_upload_base_url")]
    pub upload_base_url: String,
    #[serde(default = "default_request_timeout", with = "duration_serde::duration")]
    pub request_timeout: Duration,
    /// Simulated upload time for the dry-run publisher
    #[serde(default = "default_dry_run_delay", with = "duration_serde::duration")]
    pub dry_run_delay: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum outbound calls granted per window
    #[serde(default = "default_rate_limit_max_requests")]
    pub max_requests: usize,
    /// Sliding window length
    #[serde(default = "default_rate_limit_window", with = "duration_serde::duration")]
    pub window: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    #[serde(default = "default_metadata_file")]
    pub metadata_file: String,
    /// Extensions (without dot, case-insensitive) of files to publish
    #[serde(default = "default_media_extensions")]
    pub media_extensions: Vec<String>,
    #[serde(default = "default_thumbnail_extensions")]
    pub thumbnail_extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Total publish attempts for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay; attempt `n` waits `retry_delay * 2^(n-1)` before attempt `n+1`
    #[serde(default = "default_retry_delay", with = "duration_serde::duration")]
    pub retry_delay: Duration,
    /// Move items that fail validation to `<folder>/.quarantine/`
    #[serde(default = "default_quarantine_invalid_items")]
    pub quarantine_invalid_items: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_status_interval", with = "duration_serde::duration")]
    pub status_interval: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_web_enabled")]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

fn default_publisher_kind() -> PublisherKind {
    PublisherKind::DryRun
}

fn default_upload_base_url() -> String {
    DEFAULT_UPLOAD_BASE_URL.to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
}

fn default_dry_run_delay() -> Duration {
    Duration::from_millis(DEFAULT_DRY_RUN_DELAY_MS)
}

fn default_rate_limit_max_requests() -> usize {
    DEFAULT_RATE_LIMIT_MAX_REQUESTS
}

fn default_rate_limit_window() -> Duration {
    Duration::from_millis(DEFAULT_RATE_LIMIT_WINDOW_MS)
}

fn default_metadata_file() -> String {
    DEFAULT_METADATA_FILE.to_string()
}

fn default_media_extensions() -> Vec<String> {
    DEFAULT_MEDIA_EXTENSIONS.iter().map(|s| s.to_string()).collect()
}

fn default_thumbnail_extensions() -> Vec<String> {
    DEFAULT_THUMBNAIL_EXTENSIONS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_retry_delay() -> Duration {
    Duration::from_millis(DEFAULT_RETRY_DELAY_MS)
}

fn default_quarantine_invalid_items() -> bool {
    DEFAULT_QUARANTINE_INVALID_ITEMS
}

fn default_status_interval() -> Duration {
    Duration::from_secs(DEFAULT_STATUS_INTERVAL_SECS)
}

fn default_web_enabled() -> bool {
    DEFAULT_WEB_ENABLED
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: Some(DEFAULT_MAX_CONNECTIONS),
        }
    }
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            kind: default_publisher_kind(),
            access_token: None,
            upload_base_url: default_upload_base_url(),
            request_timeout: default_request_timeout(),
            dry_run_delay: default_dry_run_delay(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_rate_limit_max_requests(),
            window: default_rate_limit_window(),
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            metadata_file: default_metadata_file(),
            media_extensions: default_media_extensions(),
            thumbnail_extensions: default_thumbnail_extensions(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
            quarantine_invalid_items: default_quarantine_invalid_items(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            status_interval: default_status_interval(),
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: default_web_enabled(),
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Config {
    /// Load configuration, writing a default file first if none exists
    ///
    /// Values are layered: built-in defaults, then the TOML file, then
    /// `FOLDER_PUBLISHER_*` environment variables.
    pub fn load_from_file(config_file: &str) -> Result<Self> {
        if !std::path::Path::new(config_file).exists() {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(config_file, contents)
                .with_context(|| format!("Failed to write default config to {config_file}"))?;
            info!("Created default config file: {}", config_file);
        }

        let config: Config = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to load configuration from {config_file}"))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the runtime cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit.max_requests == 0 {
            anyhow::bail!("rate_limit.max_requests must be at least 1");
        }
        if self.rate_limit.window.is_zero() {
            anyhow::bail!("rate_limit.window must be greater than zero");
        }
        if self.pipeline.max_retries == 0 {
            anyhow::bail!("pipeline.max_retries must be at least 1");
        }
        if self.scheduler.status_interval.is_zero() {
            anyhow::bail!("scheduler.status_interval must be greater than zero");
        }
        if self.scanner.media_extensions.is_empty() {
            anyhow::bail!("scanner.media_extensions must not be empty");
        }
        if self.publisher.kind == PublisherKind::YouTube && self.publisher.access_token.is_none() {
            anyhow::bail!(
                "publisher.access_token is required for the youtube publisher (or set {}PUBLISHER__ACCESS_TOKEN)",
                ENV_PREFIX
            );
        }
        Ok(())
    }
}
