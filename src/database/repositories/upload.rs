//! SeaORM-based upload record repository

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::{prelude::Uploads, uploads};
use crate::errors::{RepositoryError, RepositoryResult};
use crate::models::{ItemMetadata, UploadRecord, UploadStatus};

#[derive(Clone)]
pub struct UploadSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl UploadSeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// Open an `in_progress` record for one publication attempt
    pub async fn create_entry(
        &self,
        folder_config_id: Uuid,
        item_name: &str,
        item_path: &str,
        metadata: &ItemMetadata,
    ) -> RepositoryResult<UploadRecord> {
        let active_model = uploads::ActiveModel {
            id: Set(Uuid::new_v4()),
            folder_config_id: Set(folder_config_id),
            item_name: Set(item_name.to_string()),
            item_path: Set(item_path.to_string()),
            status: Set(UploadStatus::InProgress.to_string()),
            external_id: Set(None),
            error_message: Set(None),
            metadata: Set(serde_json::to_string(metadata)?),
            started_at: Set(Utc::now()),
            completed_at: Set(None),
        };

        let model = active_model.insert(&*self.connection).await?;
        self.model_to_domain(model)
    }

    pub async fn mark_completed(
        &self,
        record_id: &Uuid,
        external_id: &str,
    ) -> RepositoryResult<UploadRecord> {
        let mut active_model = self.find_active_model(record_id).await?;
        active_model.status = Set(UploadStatus::Completed.to_string());
        active_model.external_id = Set(Some(external_id.to_string()));
        active_model.completed_at = Set(Some(Utc::now()));

        let model = active_model.update(&*self.connection).await?;
        self.model_to_domain(model)
    }

    pub async fn mark_failed(
        &self,
        record_id: &Uuid,
        error_message: &str,
    ) -> RepositoryResult<UploadRecord> {
        let mut active_model = self.find_active_model(record_id).await?;
        active_model.status = Set(UploadStatus::Failed.to_string());
        active_model.error_message = Set(Some(error_message.to_string()));
        active_model.completed_at = Set(Some(Utc::now()));

        let model = active_model.update(&*self.connection).await?;
        self.model_to_domain(model)
    }

    /// Find the completed publication of an item, if any
    pub async fn find_completed_by_item_path(
        &self,
        item_path: &str,
    ) -> RepositoryResult<Option<UploadRecord>> {
        let model = Uploads::find()
            .filter(uploads::Column::ItemPath.eq(item_path))
            .filter(uploads::Column::Status.eq(UploadStatus::Completed.to_string()))
            .one(&*self.connection)
            .await?;

        model.map(|m| self.model_to_domain(m)).transpose()
    }

    /// Most recent records first
    pub async fn list_recent(&self, limit: u64) -> RepositoryResult<Vec<UploadRecord>> {
        let models = Uploads::find()
            .order_by_desc(uploads::Column::StartedAt)
            .limit(limit)
            .all(&*self.connection)
            .await?;

        models.into_iter().map(|m| self.model_to_domain(m)).collect()
    }

    async fn find_active_model(&self, record_id: &Uuid) -> RepositoryResult<uploads::ActiveModel> {
        let existing = Uploads::find_by_id(*record_id)
            .one(&*self.connection)
            .await?
            .ok_or_else(|| RepositoryError::not_found("uploads", "id", record_id))?;
        Ok(existing.into())
    }

    fn model_to_domain(&self, model: uploads::Model) -> RepositoryResult<UploadRecord> {
        let status =
            UploadStatus::from_str(&model.status).map_err(|_| RepositoryError::InvalidValue {
                field: "uploads.status".to_string(),
                value: model.status.clone(),
            })?;

        Ok(UploadRecord {
            id: model.id,
            folder_config_id: model.folder_config_id,
            item_name: model.item_name,
            item_path: model.item_path,
            status,
            external_id: model.external_id,
            error_message: model.error_message,
            metadata: serde_json::from_str(&model.metadata)?,
            started_at: model.started_at,
            completed_at: model.completed_at,
        })
    }
}
