//! SeaORM-based failure record repository

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::entities::{prelude::UploadFailures, upload_failures};
use crate::errors::RepositoryResult;
use crate::models::{FailureRecord, ItemMetadata};

#[derive(Clone)]
pub struct FailureSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl FailureSeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// Record a terminal failure of an item
    ///
    /// The first failure of an item path inserts a row. Later failures of the
    /// same path bump `retry_count` and refresh the message, metadata and
    /// `last_retry_at` on that row.
    pub async fn record(
        &self,
        folder_config_id: Uuid,
        item_name: &str,
        item_path: &str,
        error_message: &str,
        metadata: Option<&ItemMetadata>,
    ) -> RepositoryResult<FailureRecord> {
        let now = Utc::now();
        let metadata = metadata.map(serde_json::to_string).transpose()?;

        let existing = UploadFailures::find()
            .filter(upload_failures::Column::ItemPath.eq(item_path))
            .one(&*self.connection)
            .await?;

        let model = match existing {
            Some(existing) => {
                debug!(
                    "Failure for {} seen before, retry count {}",
                    item_path,
                    existing.retry_count + 1
                );
                let retry_count = existing.retry_count + 1;
                let mut active_model: upload_failures::ActiveModel = existing.into();
                active_model.folder_config_id = Set(folder_config_id);
                active_model.error_message = Set(error_message.to_string());
                active_model.retry_count = Set(retry_count);
                active_model.last_retry_at = Set(Some(now));
                if metadata.is_some() {
                    active_model.metadata = Set(metadata);
                }
                active_model.update(&*self.connection).await?
            }
            None => {
                let active_model = upload_failures::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    folder_config_id: Set(folder_config_id),
                    item_name: Set(item_name.to_string()),
                    item_path: Set(item_path.to_string()),
                    error_message: Set(error_message.to_string()),
                    retry_count: Set(0),
                    last_retry_at: Set(None),
                    metadata: Set(metadata),
                    created_at: Set(now),
                };
                active_model.insert(&*self.connection).await?
            }
        };

        self.model_to_domain(model)
    }

    pub async fn find_by_item_path(&self, item_path: &str) -> RepositoryResult<Option<FailureRecord>> {
        let model = UploadFailures::find()
            .filter(upload_failures::Column::ItemPath.eq(item_path))
            .one(&*self.connection)
            .await?;

        model.map(|m| self.model_to_domain(m)).transpose()
    }

    /// Most recently created failures first
    pub async fn list_recent(&self, limit: u64) -> RepositoryResult<Vec<FailureRecord>> {
        let models = UploadFailures::find()
            .order_by_desc(upload_failures::Column::CreatedAt)
            .limit(limit)
            .all(&*self.connection)
            .await?;

        models.into_iter().map(|m| self.model_to_domain(m)).collect()
    }

    fn model_to_domain(&self, model: upload_failures::Model) -> RepositoryResult<FailureRecord> {
        let metadata = model
            .metadata
            .as_deref()
            .map(serde_json::from_str::<ItemMetadata>)
            .transpose()?;

        Ok(FailureRecord {
            id: model.id,
            folder_config_id: model.folder_config_id,
            item_name: model.item_name,
            item_path: model.item_path,
            error_message: model.error_message,
            retry_count: model.retry_count,
            last_retry_at: model.last_retry_at,
            metadata,
            created_at: model.created_at,
        })
    }
}
