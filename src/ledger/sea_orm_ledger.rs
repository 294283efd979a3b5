//! Durable ledger over the SeaORM repositories

use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use uuid::Uuid;

use super::{Ledger, LedgerAdmin};
use crate::database::repositories::{
    FailureSeaOrmRepository, FolderConfigSeaOrmRepository, UploadSeaOrmRepository,
};
use crate::errors::RepositoryResult;
use crate::models::{
    FailureRecord, FolderConfig, FolderConfigCreateRequest, ItemMetadata, UploadRecord,
};

#[derive(Clone)]
pub struct SeaOrmLedger {
    folders: FolderConfigSeaOrmRepository,
    uploads: UploadSeaOrmRepository,
    failures: FailureSeaOrmRepository,
}

impl SeaOrmLedger {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self {
            folders: FolderConfigSeaOrmRepository::new(connection.clone()),
            uploads: UploadSeaOrmRepository::new(connection.clone()),
            failures: FailureSeaOrmRepository::new(connection),
        }
    }

    pub async fn find_failure_by_item_path(
        &self,
        item_path: &str,
    ) -> RepositoryResult<Option<FailureRecord>> {
        self.failures.find_by_item_path(item_path).await
    }
}

#[async_trait]
impl Ledger for SeaOrmLedger {
    async fn create_upload_entry(
        &self,
        folder_config_id: Uuid,
        item_name: &str,
        item_path: &str,
        metadata: &ItemMetadata,
    ) -> RepositoryResult<UploadRecord> {
        self.uploads
            .create_entry(folder_config_id, item_name, item_path, metadata)
            .await
    }

    async fn mark_completed(
        &self,
        record_id: Uuid,
        external_id: &str,
    ) -> RepositoryResult<UploadRecord> {
        self.uploads.mark_completed(&record_id, external_id).await
    }

    async fn mark_failed(
        &self,
        record_id: Uuid,
        error_message: &str,
    ) -> RepositoryResult<UploadRecord> {
        self.uploads.mark_failed(&record_id, error_message).await
    }

    async fn create_failure_entry(
        &self,
        folder_config_id: Uuid,
        item_name: &str,
        item_path: &str,
        error_message: &str,
        metadata: Option<&ItemMetadata>,
    ) -> RepositoryResult<FailureRecord> {
        self.failures
            .record(folder_config_id, item_name, item_path, error_message, metadata)
            .await
    }

    async fn find_completed_by_item_path(
        &self,
        item_path: &str,
    ) -> RepositoryResult<Option<UploadRecord>> {
        self.uploads.find_completed_by_item_path(item_path).await
    }

    async fn list_active_folder_configs(&self) -> RepositoryResult<Vec<FolderConfig>> {
        self.folders.find_active().await
    }
}

#[async_trait]
impl LedgerAdmin for SeaOrmLedger {
    async fn create_folder_config(
        &self,
        request: FolderConfigCreateRequest,
    ) -> RepositoryResult<FolderConfig> {
        self.folders.create(request).await
    }

    async fn get_folder_config(&self, id: Uuid) -> RepositoryResult<Option<FolderConfig>> {
        self.folders.find_by_id(&id).await
    }

    async fn list_folder_configs(&self) -> RepositoryResult<Vec<FolderConfig>> {
        self.folders.find_all().await
    }

    async fn set_folder_active(&self, id: Uuid, is_active: bool) -> RepositoryResult<FolderConfig> {
        self.folders.set_active(&id, is_active).await
    }

    async fn list_recent_uploads(&self, limit: u64) -> RepositoryResult<Vec<UploadRecord>> {
        self.uploads.list_recent(limit).await
    }

    async fn list_failures(&self, limit: u64) -> RepositoryResult<Vec<FailureRecord>> {
        self.failures.list_recent(limit).await
    }
}
