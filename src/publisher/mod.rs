//! Publishing API clients
//!
//! The pipeline talks to a [`Publisher`] and reacts to the [`PublishError`]
//! variant it gets back: transient errors are retried, quota errors suspend
//! the folder and validation errors fail the item.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::config::{PublisherConfig, PublisherKind};
use crate::errors::PublishError;
use crate::models::ItemMetadata;

pub mod dry_run;
pub mod youtube;

pub use dry_run::DryRunPublisher;
pub use youtube::YouTubePublisher;

/// Identifier assigned by the publishing API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReceipt {
    pub external_id: String,
}

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Upload one media file with its metadata
    async fn publish(
        &self,
        media_path: &Path,
        metadata: &ItemMetadata,
    ) -> Result<PublishReceipt, PublishError>;

    /// Attach a thumbnail to an already published item
    async fn attach_thumbnail(
        &self,
        external_id: &str,
        thumbnail_path: &Path,
    ) -> Result<(), PublishError>;

    fn name(&self) -> &'static str;
}

/// Build the publisher selected by `publisher.kind`
pub fn build_publisher(config: &PublisherConfig) -> anyhow::Result<Arc<dyn Publisher>> {
    match config.kind {
        PublisherKind::YouTube => Ok(Arc::new(YouTubePublisher::new(config)?)),
        PublisherKind::DryRun => Ok(Arc::new(DryRunPublisher::new(config.dry_run_delay))),
    }
}

/// Best-effort content type of a file from its leading bytes
pub(crate) async fn sniff_content_type(path: &Path) -> &'static str {
    use tokio::io::AsyncReadExt;

    let mut head = [0u8; 8192];
    let read = match tokio::fs::File::open(path).await {
        Ok(mut file) => file.read(&mut head).await.unwrap_or(0),
        Err(_) => 0,
    };

    infer::get(&head[..read])
        .map(|kind| kind.mime_type())
        .unwrap_or("application/octet-stream")
}
