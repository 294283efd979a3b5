use async_trait::async_trait;
use chrono::Utc;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use super::{PublishReceipt, Publisher};
use crate::errors::PublishError;
use crate::models::ItemMetadata;

/// Publisher that pretends to upload, for trying out folder setups
#[derive(Debug, Clone)]
pub struct DryRunPublisher {
    delay: Duration,
}

impl DryRunPublisher {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Publisher for DryRunPublisher {
    async fn publish(
        &self,
        media_path: &Path,
        metadata: &ItemMetadata,
    ) -> Result<PublishReceipt, PublishError> {
        info!(
            "Dry run: simulating upload of {} ({:?})",
            media_path.display(),
            metadata.title
        );
        tokio::time::sleep(self.delay).await;

        Ok(PublishReceipt {
            external_id: format!("TEST-{}", Utc::now().timestamp_millis()),
        })
    }

    async fn attach_thumbnail(
        &self,
        external_id: &str,
        thumbnail_path: &Path,
    ) -> Result<(), PublishError> {
        info!(
            "Dry run: simulating thumbnail {} for {}",
            thumbnail_path.display(),
            external_id
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "dry_run"
    }
}
