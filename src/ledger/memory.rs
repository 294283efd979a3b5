//! Volatile ledger held in process memory

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Ledger, LedgerAdmin};
use crate::errors::{RepositoryError, RepositoryResult};
use crate::models::{
    FailureRecord, FolderConfig, FolderConfigCreateRequest, ItemMetadata, UploadRecord,
    UploadStatus,
};

#[derive(Default)]
struct LedgerState {
    folders: HashMap<Uuid, FolderConfig>,
    uploads: Vec<UploadRecord>,
    failures: Vec<FailureRecord>,
}

/// Ledger with the same semantics as the SQL one, lost on exit
#[derive(Default)]
pub struct InMemoryLedger {
    state: RwLock<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// All upload records in insertion order
    pub async fn uploads(&self) -> Vec<UploadRecord> {
        self.state.read().await.uploads.clone()
    }

    pub async fn failures(&self) -> Vec<FailureRecord> {
        self.state.read().await.failures.clone()
    }

    async fn update_upload<F>(&self, record_id: Uuid, apply: F) -> RepositoryResult<UploadRecord>
    where
        F: FnOnce(&mut UploadRecord) + Send,
    {
        let mut state = self.state.write().await;
        let record = state
            .uploads
            .iter_mut()
            .find(|r| r.id == record_id)
            .ok_or_else(|| RepositoryError::not_found("uploads", "id", record_id))?;
        apply(record);
        Ok(record.clone())
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn create_upload_entry(
        &self,
        folder_config_id: Uuid,
        item_name: &str,
        item_path: &str,
        metadata: &ItemMetadata,
    ) -> RepositoryResult<UploadRecord> {
        let record = UploadRecord {
            id: Uuid::new_v4(),
            folder_config_id,
            item_name: item_name.to_string(),
            item_path: item_path.to_string(),
            status: UploadStatus::InProgress,
            external_id: None,
            error_message: None,
            metadata: metadata.clone(),
            started_at: Utc::now(),
            completed_at: None,
        };
        self.state.write().await.uploads.push(record.clone());
        Ok(record)
    }

    async fn mark_completed(
        &self,
        record_id: Uuid,
        external_id: &str,
    ) -> RepositoryResult<UploadRecord> {
        let external_id = external_id.to_string();
        self.update_upload(record_id, move |record| {
            record.status = UploadStatus::Completed;
            record.external_id = Some(external_id);
            record.completed_at = Some(Utc::now());
        })
        .await
    }

    async fn mark_failed(
        &self,
        record_id: Uuid,
        error_message: &str,
    ) -> RepositoryResult<UploadRecord> {
        let error_message = error_message.to_string();
        self.update_upload(record_id, move |record| {
            record.status = UploadStatus::Failed;
            record.error_message = Some(error_message);
            record.completed_at = Some(Utc::now());
        })
        .await
    }

    async fn create_failure_entry(
        &self,
        folder_config_id: Uuid,
        item_name: &str,
        item_path: &str,
        error_message: &str,
        metadata: Option<&ItemMetadata>,
    ) -> RepositoryResult<FailureRecord> {
        let now = Utc::now();
        let mut state = self.state.write().await;

        if let Some(existing) = state.failures.iter_mut().find(|f| f.item_path == item_path) {
            existing.folder_config_id = folder_config_id;
            existing.error_message = error_message.to_string();
            existing.retry_count += 1;
            existing.last_retry_at = Some(now);
            if let Some(metadata) = metadata {
                existing.metadata = Some(metadata.clone());
            }
            return Ok(existing.clone());
        }

        let record = FailureRecord {
            id: Uuid::new_v4(),
            folder_config_id,
            item_name: item_name.to_string(),
            item_path: item_path.to_string(),
            error_message: error_message.to_string(),
            retry_count: 0,
            last_retry_at: None,
            metadata: metadata.cloned(),
            created_at: now,
        };
        state.failures.push(record.clone());
        Ok(record)
    }

    async fn find_completed_by_item_path(
        &self,
        item_path: &str,
    ) -> RepositoryResult<Option<UploadRecord>> {
        Ok(self
            .state
            .read()
            .await
            .uploads
            .iter()
            .find(|r| r.item_path == item_path && r.status == UploadStatus::Completed)
            .cloned())
    }

    async fn list_active_folder_configs(&self) -> RepositoryResult<Vec<FolderConfig>> {
        let mut folders: Vec<FolderConfig> = self
            .state
            .read()
            .await
            .folders
            .values()
            .filter(|f| f.is_active)
            .cloned()
            .collect();
        folders.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(folders)
    }
}

#[async_trait]
impl LedgerAdmin for InMemoryLedger {
    async fn create_folder_config(
        &self,
        request: FolderConfigCreateRequest,
    ) -> RepositoryResult<FolderConfig> {
        let now = Utc::now();
        let folder = FolderConfig {
            id: Uuid::new_v4(),
            name: request.name,
            path: request.path,
            cron_expression: request.cron_expression,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.state
            .write()
            .await
            .folders
            .insert(folder.id, folder.clone());
        Ok(folder)
    }

    async fn get_folder_config(&self, id: Uuid) -> RepositoryResult<Option<FolderConfig>> {
        Ok(self.state.read().await.folders.get(&id).cloned())
    }

    async fn list_folder_configs(&self) -> RepositoryResult<Vec<FolderConfig>> {
        let mut folders: Vec<FolderConfig> =
            self.state.read().await.folders.values().cloned().collect();
        folders.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(folders)
    }

    async fn set_folder_active(&self, id: Uuid, is_active: bool) -> RepositoryResult<FolderConfig> {
        let mut state = self.state.write().await;
        let folder = state
            .folders
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::not_found("folder_configurations", "id", id))?;
        folder.is_active = is_active;
        folder.updated_at = Utc::now();
        Ok(folder.clone())
    }

    async fn list_recent_uploads(&self, limit: u64) -> RepositoryResult<Vec<UploadRecord>> {
        let state = self.state.read().await;
        Ok(state
            .uploads
            .iter()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn list_failures(&self, limit: u64) -> RepositoryResult<Vec<FailureRecord>> {
        let state = self.state.read().await;
        Ok(state
            .failures
            .iter()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completed_record_is_found_by_item_path() {
        let ledger = InMemoryLedger::new();
        let folder_id = Uuid::new_v4();
        let meta = ItemMetadata::new("T", "D");

        let record = ledger
            .create_upload_entry(folder_id, "1-video", "/src/1-video", &meta)
            .await
            .unwrap();
        assert!(
            ledger
                .find_completed_by_item_path("/src/1-video")
                .await
                .unwrap()
                .is_none()
        );

        ledger.mark_completed(record.id, "abc123").await.unwrap();
        let found = ledger
            .find_completed_by_item_path("/src/1-video")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.external_id.as_deref(), Some("abc123"));
        assert!(found.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_repeated_failure_increments_retry_count() {
        let ledger = InMemoryLedger::new();
        let folder_id = Uuid::new_v4();

        let first = ledger
            .create_failure_entry(folder_id, "1-video", "/src/1-video", "boom", None)
            .await
            .unwrap();
        assert_eq!(first.retry_count, 0);

        let second = ledger
            .create_failure_entry(folder_id, "1-video", "/src/1-video", "boom again", None)
            .await
            .unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.retry_count, 1);
        assert_eq!(second.error_message, "boom again");
        assert!(second.last_retry_at.is_some());
        assert_eq!(ledger.failures().await.len(), 1);
    }

    #[tokio::test]
    async fn test_only_active_folders_are_listed() {
        let ledger = InMemoryLedger::new();
        let a = ledger
            .create_folder_config(FolderConfigCreateRequest {
                name: "a".into(),
                path: "/a".into(),
                cron_expression: "* * * * *".into(),
            })
            .await
            .unwrap();
        ledger
            .create_folder_config(FolderConfigCreateRequest {
                name: "b".into(),
                path: "/b".into(),
                cron_expression: "* * * * *".into(),
            })
            .await
            .unwrap();

        ledger.set_folder_active(a.id, false).await.unwrap();
        let active = ledger.list_active_folder_configs().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "b");
    }
}
