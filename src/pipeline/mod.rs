//! Upload pipeline for a single pending item
//!
//! `Resolved -> Uploading -> {Completed | Failed | QuotaSuspended}`
//!
//! Expected outcomes are returned as [`UploadOutcome`]; only ledger failures
//! and unexpected filesystem errors surface as `Err`.
//!
//! Publication success is final. Archival runs afterwards as best-effort
//! cleanup and its failure never turns a completed upload into a failed one.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::errors::{AppResult, PublishError, ScanError};
use crate::ledger::Ledger;
use crate::models::{FolderConfig, ItemMetadata, PendingItem, UploadRecord};
use crate::publisher::Publisher;
use crate::scanner::{ARCHIVE_DIR, FolderScanner, ItemFiles, QUARANTINE_DIR};
use crate::utils::RateLimiter;

mod fs_ops;

/// Bounded exponential backoff for transient publish failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total publish attempts, including the first
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl RetryPolicy {
    /// Wait after failed attempt `attempt` (1-based): `retry_delay * 2^(attempt-1)`
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.retry_delay.saturating_mul(1u32 << exponent)
    }
}

impl From<&PipelineConfig> for RetryPolicy {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            max_retries: config.max_retries.max(1),
            retry_delay: config.retry_delay,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    /// Item contents missing or malformed; never retried
    InvalidItem,
    /// Publishing API rejected the request
    Rejected,
    /// Every attempt hit a transient error
    RetriesExhausted,
}

#[derive(Debug, Clone)]
pub enum UploadOutcome {
    Completed {
        record: UploadRecord,
        archived: bool,
    },
    /// A completed record already existed; the API was not called
    AlreadyPublished {
        record: UploadRecord,
        archived: bool,
    },
    Failed {
        kind: FailureKind,
        message: String,
        attempts: u32,
        quarantined: bool,
    },
    /// Quota exhausted; the folder should not be triggered before `resume_at`
    QuotaSuspended {
        resume_at: DateTime<Utc>,
        message: String,
    },
}

/// Item whose files have been located and whose metadata parsed
struct ResolvedItem {
    media_path: PathBuf,
    files: ItemFiles,
    metadata: ItemMetadata,
}

pub struct UploadPipeline {
    ledger: Arc<dyn Ledger>,
    publisher: Arc<dyn Publisher>,
    rate_limiter: Arc<RateLimiter>,
    scanner: FolderScanner,
    retry_policy: RetryPolicy,
    quarantine_invalid_items: bool,
}

impl UploadPipeline {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        publisher: Arc<dyn Publisher>,
        rate_limiter: Arc<RateLimiter>,
        scanner: FolderScanner,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            ledger,
            publisher,
            rate_limiter,
            scanner,
            retry_policy: RetryPolicy::from(config),
            quarantine_invalid_items: config.quarantine_invalid_items,
        }
    }

    /// Publish one item of `folder`
    pub async fn process(
        &self,
        folder: &FolderConfig,
        item: &PendingItem,
    ) -> AppResult<UploadOutcome> {
        let item_path = item.item_path();

        if let Some(record) = self.ledger.find_completed_by_item_path(&item_path).await? {
            info!(
                "Item {} already published as {:?}, skipping upload",
                item_path, record.external_id
            );
            let archived = self.archive_item(folder, &item.dir).await;
            return Ok(UploadOutcome::AlreadyPublished { record, archived });
        }

        let resolved = match self.resolve(item).await {
            Ok(resolved) => resolved,
            Err(ResolveError::Invalid { message, metadata }) => {
                return self
                    .fail_invalid_item(folder, &item.name, &item.dir, &message, metadata.as_ref())
                    .await;
            }
            Err(ResolveError::Io(e)) => return Err(e.into()),
        };

        let record = self
            .ledger
            .create_upload_entry(folder.id, &item.name, &item_path, &resolved.metadata)
            .await?;
        debug!("Created upload record {} for {}", record.id, item_path);

        let max_attempts = self.retry_policy.max_retries;
        let mut attempt = 1;
        let receipt = loop {
            self.rate_limiter.acquire().await;

            match self
                .publisher
                .publish(&resolved.media_path, &resolved.metadata)
                .await
            {
                Ok(receipt) => break receipt,
                Err(PublishError::QuotaExceeded { resume_at, message }) => {
                    warn!(
                        "Publishing quota exceeded while uploading {}, suspended until {}",
                        item_path, resume_at
                    );
                    self.ledger
                        .mark_failed(record.id, &format!("Quota exceeded: {message}"))
                        .await?;
                    return Ok(UploadOutcome::QuotaSuspended { resume_at, message });
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.retry_policy.delay_after(attempt);
                    warn!(
                        "Upload of {} failed (attempt {}/{}), retrying in {:?}: {}",
                        item_path, attempt, max_attempts, delay, e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    let kind = if e.is_retryable() {
                        FailureKind::RetriesExhausted
                    } else {
                        FailureKind::Rejected
                    };
                    let message = e.to_string();
                    error!(
                        "Upload of {} failed after {} attempt(s): {}",
                        item_path, attempt, message
                    );

                    self.ledger.mark_failed(record.id, &message).await?;
                    self.ledger
                        .create_failure_entry(
                            folder.id,
                            &item.name,
                            &item_path,
                            &message,
                            Some(&resolved.metadata),
                        )
                        .await?;

                    return Ok(UploadOutcome::Failed {
                        kind,
                        message,
                        attempts: attempt,
                        quarantined: false,
                    });
                }
            }
        };

        let record = self
            .ledger
            .mark_completed(record.id, &receipt.external_id)
            .await?;
        info!(
            "Published {} as {} after {} attempt(s)",
            item_path, receipt.external_id, attempt
        );

        if let Some(thumbnail) = &resolved.files.thumbnail_path {
            self.rate_limiter.acquire().await;
            if let Err(e) = self
                .publisher
                .attach_thumbnail(&receipt.external_id, thumbnail)
                .await
            {
                warn!(
                    "Thumbnail {} not attached to {}: {}",
                    thumbnail.display(),
                    receipt.external_id,
                    e
                );
            }
        }

        let archived = self.archive_item(folder, &item.dir).await;
        Ok(UploadOutcome::Completed { record, archived })
    }

    /// Publish the item in `dir`, which need not have come from a scan
    pub async fn process_dir(&self, folder: &FolderConfig, dir: &Path) -> AppResult<UploadOutcome> {
        match self.scanner.inspect_item(dir).await {
            Ok(item) => self.process(folder, &item).await,
            Err(e @ ScanError::Io { .. }) => Err(e.into()),
            Err(e) => {
                let name = dir
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.fail_invalid_item(folder, &name, dir, &e.to_string(), None)
                    .await
            }
        }
    }

    /// Re-verify the item on disk and load its metadata
    async fn resolve(&self, item: &PendingItem) -> Result<ResolvedItem, ResolveError> {
        let current = self.scanner.inspect_item(&item.dir).await?;
        let files = self.scanner.find_metadata(&item.dir).await?;
        let metadata = self.scanner.load_metadata(&files.metadata_path).await?;

        if metadata.title.trim().is_empty() {
            return Err(ResolveError::Invalid {
                message: format!("Metadata title is empty in {}", files.metadata_path.display()),
                metadata: Some(metadata),
            });
        }

        Ok(ResolvedItem {
            media_path: current.media_path,
            files,
            metadata,
        })
    }

    async fn fail_invalid_item(
        &self,
        folder: &FolderConfig,
        name: &str,
        dir: &Path,
        message: &str,
        metadata: Option<&ItemMetadata>,
    ) -> AppResult<UploadOutcome> {
        let item_path = dir.to_string_lossy();
        error!("Item {} is invalid: {}", item_path, message);

        self.ledger
            .create_failure_entry(folder.id, name, &item_path, message, metadata)
            .await?;

        let quarantined = if self.quarantine_invalid_items {
            self.quarantine_item(folder, name, dir).await
        } else {
            false
        };

        Ok(UploadOutcome::Failed {
            kind: FailureKind::InvalidItem,
            message: message.to_string(),
            attempts: 0,
            quarantined,
        })
    }

    /// Move a published item under `<folder>/archive/`, logging any failure
    async fn archive_item(&self, folder: &FolderConfig, dir: &Path) -> bool {
        let folder_root = Path::new(&folder.path);
        let relative = dir
            .strip_prefix(folder_root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| dir.file_name().map(PathBuf::from).unwrap_or_default());
        let destination = folder_root.join(ARCHIVE_DIR).join(relative);

        match fs_ops::move_dir(dir, &destination).await {
            Ok(()) => {
                info!("Archived {} to {}", dir.display(), destination.display());
                true
            }
            Err(e) => {
                error!(
                    "Failed to archive {} to {}: {}",
                    dir.display(),
                    destination.display(),
                    e
                );
                false
            }
        }
    }

    /// Move an invalid item under `<folder>/.quarantine/` so scans skip it
    async fn quarantine_item(&self, folder: &FolderConfig, name: &str, dir: &Path) -> bool {
        let quarantine_root = Path::new(&folder.path).join(QUARANTINE_DIR);
        let mut destination = quarantine_root.join(name);
        if tokio::fs::try_exists(&destination).await.unwrap_or(false) {
            destination = quarantine_root.join(format!("{}-{}", name, Utc::now().timestamp()));
        }

        match fs_ops::move_dir(dir, &destination).await {
            Ok(()) => {
                warn!("Quarantined {} to {}", dir.display(), destination.display());
                true
            }
            Err(e) => {
                error!("Failed to quarantine {}: {}", dir.display(), e);
                false
            }
        }
    }
}

enum ResolveError {
    Invalid {
        message: String,
        metadata: Option<ItemMetadata>,
    },
    Io(ScanError),
}

impl From<ScanError> for ResolveError {
    fn from(e: ScanError) -> Self {
        match e {
            ScanError::Io { .. } => Self::Io(e),
            other => Self::Invalid {
                message: other.to_string(),
                metadata: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, 5_000)]
    #[case(2, 10_000)]
    #[case(3, 20_000)]
    fn test_backoff_doubles_per_attempt(#[case] attempt: u32, #[case] millis: u64) {
        let policy = RetryPolicy {
            max_retries: 3,
            retry_delay: Duration::from_millis(5_000),
        };
        assert_eq!(policy.delay_after(attempt), Duration::from_millis(millis));
    }

    #[test]
    fn test_policy_from_config_keeps_at_least_one_attempt() {
        let config = PipelineConfig {
            max_retries: 0,
            ..PipelineConfig::default()
        };
        assert_eq!(RetryPolicy::from(&config).max_retries, 1);
    }
}
