/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Database defaults
pub const DEFAULT_DATABASE_URL: &str = "sqlite://./data/folder-publisher.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

// Publisher defaults
pub const DEFAULT_UPLOAD_BASE_URL: &str = "https://www.googleapis.com/upload/youtube/v3/";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_DRY_RUN_DELAY_MS: u64 = 2000;

// Rate limiting defaults: 10 requests per minute
pub const DEFAULT_RATE_LIMIT_MAX_REQUESTS: usize = 10;
pub const DEFAULT_RATE_LIMIT_WINDOW_MS: u64 = 60_000;

// Scanner defaults
pub const DEFAULT_METADATA_FILE: &str = "metadata.json";
pub const DEFAULT_MEDIA_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v", "mkv", "webm", "avi"];
pub const DEFAULT_THUMBNAIL_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

// Pipeline defaults
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 5000;
pub const DEFAULT_QUARANTINE_INVALID_ITEMS: bool = true;

// Scheduler defaults
pub const DEFAULT_STATUS_INTERVAL_SECS: u64 = 60;

// Web server defaults
pub const DEFAULT_WEB_ENABLED: bool = false;
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;
