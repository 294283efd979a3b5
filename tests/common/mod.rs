//! Fixtures shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use folder_publisher::config::{PipelineConfig, ScannerConfig};
use folder_publisher::errors::PublishError;
use folder_publisher::ledger::{InMemoryLedger, LedgerAdmin};
use folder_publisher::models::{FolderConfig, FolderConfigCreateRequest, ItemMetadata};
use folder_publisher::pipeline::UploadPipeline;
use folder_publisher::publisher::{PublishReceipt, Publisher};
use folder_publisher::scanner::FolderScanner;
use folder_publisher::utils::RateLimiter;

type ScriptedResult = Result<PublishReceipt, PublishError>;

/// Publisher that replays queued results, then succeeds
#[derive(Default)]
pub struct ScriptedPublisher {
    script: Mutex<VecDeque<ScriptedResult>>,
    calls: Mutex<Vec<(Instant, String)>>,
    thumbnails: AtomicUsize,
    thumbnail_error: Mutex<Option<PublishError>>,
    delay: Duration,
}

impl ScriptedPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn push(&self, result: ScriptedResult) -> &Self {
        self.script.lock().unwrap().push_back(result);
        self
    }

    pub fn push_transient(&self, times: usize) -> &Self {
        for _ in 0..times {
            self.push(Err(PublishError::transient(Some(503), "backend error")));
        }
        self
    }

    /// Make every thumbnail attach fail with `error`
    pub fn fail_thumbnails(&self, error: PublishError) -> &Self {
        *self.thumbnail_error.lock().unwrap() = Some(error);
        self
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(at, _)| *at).collect()
    }

    /// Titles in the order they were published
    pub fn published_titles(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, title)| title.clone())
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn thumbnail_count(&self) -> usize {
        self.thumbnails.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Publisher for ScriptedPublisher {
    async fn publish(
        &self,
        _media_path: &Path,
        metadata: &ItemMetadata,
    ) -> Result<PublishReceipt, PublishError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((Instant::now(), metadata.title.clone()));
            calls.len()
        };
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| {
            Ok(PublishReceipt {
                external_id: format!("VID-{call}"),
            })
        })
    }

    async fn attach_thumbnail(
        &self,
        _external_id: &str,
        _thumbnail_path: &Path,
    ) -> Result<(), PublishError> {
        self.thumbnails.fetch_add(1, Ordering::SeqCst);
        match self.thumbnail_error.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Create `<root>/<name>/` with a media file and a metadata descriptor
pub fn make_item(root: &Path, name: &str, title: &str) -> PathBuf {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("video.mp4"), b"\x00\x00\x00\x18ftypmp42").unwrap();
    let metadata = serde_json::json!({
        "title": title,
        "description": format!("{title} description"),
        "tags": ["test"],
    });
    std::fs::write(dir.join("metadata.json"), metadata.to_string()).unwrap();
    dir
}

pub async fn add_folder(ledger: &InMemoryLedger, root: &Path, cron: &str) -> FolderConfig {
    ledger
        .create_folder_config(FolderConfigCreateRequest {
            name: root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "folder".to_string()),
            path: root.to_string_lossy().into_owned(),
            cron_expression: cron.to_string(),
        })
        .await
        .unwrap()
}

pub fn pipeline_config() -> PipelineConfig {
    PipelineConfig {
        max_retries: 3,
        retry_delay: Duration::from_secs(5),
        quarantine_invalid_items: true,
    }
}

pub fn build_pipeline(
    ledger: Arc<InMemoryLedger>,
    publisher: Arc<ScriptedPublisher>,
    config: &PipelineConfig,
) -> UploadPipeline {
    UploadPipeline::new(
        ledger,
        publisher,
        Arc::new(RateLimiter::new(10, Duration::from_secs(60))),
        FolderScanner::new(&ScannerConfig::default()),
        config,
    )
}
