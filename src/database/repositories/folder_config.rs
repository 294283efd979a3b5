//! SeaORM-based folder configuration repository

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::{folder_configurations, prelude::FolderConfigurations};
use crate::errors::{RepositoryError, RepositoryResult};
use crate::models::{FolderConfig, FolderConfigCreateRequest};

/// SeaORM-based repository for folder configurations
#[derive(Clone)]
pub struct FolderConfigSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl FolderConfigSeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// Create a new, active folder configuration
    pub async fn create(&self, request: FolderConfigCreateRequest) -> RepositoryResult<FolderConfig> {
        let now = chrono::Utc::now();

        let active_model = folder_configurations::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            path: Set(request.path),
            cron_expression: Set(request.cron_expression),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let model = active_model.insert(&*self.connection).await?;
        Ok(self.model_to_domain(model))
    }

    pub async fn find_by_id(&self, id: &Uuid) -> RepositoryResult<Option<FolderConfig>> {
        let model = FolderConfigurations::find_by_id(*id)
            .one(&*self.connection)
            .await?;

        Ok(model.map(|m| self.model_to_domain(m)))
    }

    pub async fn find_all(&self) -> RepositoryResult<Vec<FolderConfig>> {
        let models = FolderConfigurations::find()
            .order_by_asc(folder_configurations::Column::Name)
            .all(&*self.connection)
            .await?;

        Ok(models.into_iter().map(|m| self.model_to_domain(m)).collect())
    }

    /// Find active folder configurations
    pub async fn find_active(&self) -> RepositoryResult<Vec<FolderConfig>> {
        let models = FolderConfigurations::find()
            .filter(folder_configurations::Column::IsActive.eq(true))
            .order_by_asc(folder_configurations::Column::Name)
            .all(&*self.connection)
            .await?;

        Ok(models.into_iter().map(|m| self.model_to_domain(m)).collect())
    }

    /// Enable or disable a folder; takes effect on the next scheduler initialization
    pub async fn set_active(&self, id: &Uuid, is_active: bool) -> RepositoryResult<FolderConfig> {
        let existing = FolderConfigurations::find_by_id(*id)
            .one(&*self.connection)
            .await?
            .ok_or_else(|| RepositoryError::not_found("folder_configurations", "id", id))?;

        let mut active_model: folder_configurations::ActiveModel = existing.into();
        active_model.is_active = Set(is_active);
        active_model.updated_at = Set(chrono::Utc::now());

        let model = active_model.update(&*self.connection).await?;
        Ok(self.model_to_domain(model))
    }

    fn model_to_domain(&self, model: folder_configurations::Model) -> FolderConfig {
        FolderConfig {
            id: model.id,
            name: model.name,
            path: model.path,
            cron_expression: model.cron_expression,
            is_active: model.is_active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
