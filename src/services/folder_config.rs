//! Folder configuration administration

use std::path::Path;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::ledger::LedgerAdmin;
use crate::models::{FolderConfig, FolderConfigCreateRequest};
use crate::scanner::ARCHIVE_DIR;
use crate::utils::cron_helper::parse_schedule;

#[derive(Clone)]
pub struct FolderConfigService {
    ledger: Arc<dyn LedgerAdmin>,
}

impl FolderConfigService {
    pub fn new(ledger: Arc<dyn LedgerAdmin>) -> Self {
        Self { ledger }
    }

    /// Validate a new watched folder, prepare its archive directory and persist it
    pub async fn validate_and_create(
        &self,
        name: &str,
        path: &Path,
        cron_expression: &str,
    ) -> AppResult<FolderConfig> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("Folder name must not be empty"));
        }

        let path = tokio::fs::canonicalize(path).await.map_err(|e| {
            AppError::validation(format!("Folder path {} is not accessible: {e}", path.display()))
        })?;
        if !path.is_dir() {
            return Err(AppError::validation(format!(
                "Folder path {} is not a directory",
                path.display()
            )));
        }

        let cron_expression = cron_expression.trim();
        parse_schedule(cron_expression)?;

        let archive = path.join(ARCHIVE_DIR);
        tokio::fs::create_dir_all(&archive).await.map_err(|e| {
            AppError::validation(format!(
                "Cannot create archive directory {}: {e}",
                archive.display()
            ))
        })?;

        let folder = self
            .ledger
            .create_folder_config(FolderConfigCreateRequest {
                name: name.to_string(),
                path: path.to_string_lossy().into_owned(),
                cron_expression: cron_expression.to_string(),
            })
            .await?;

        info!(
            "Created folder configuration '{}' for {} ({})",
            folder.name, folder.path, folder.cron_expression
        );
        Ok(folder)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<FolderConfig> {
        self.ledger
            .get_folder_config(id)
            .await?
            .ok_or_else(|| AppError::not_found("folder configuration", id.to_string()))
    }

    pub async fn list(&self) -> AppResult<Vec<FolderConfig>> {
        Ok(self.ledger.list_folder_configs().await?)
    }

    pub async fn set_active(&self, id: Uuid, is_active: bool) -> AppResult<FolderConfig> {
        let folder = self.ledger.set_folder_active(id, is_active).await?;
        info!(
            "Folder '{}' is now {}",
            folder.name,
            if is_active { "active" } else { "inactive" }
        );
        Ok(folder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedger;
    use tempfile::TempDir;

    fn service() -> FolderConfigService {
        FolderConfigService::new(Arc::new(InMemoryLedger::new()))
    }

    #[tokio::test]
    async fn test_creates_archive_and_persists() {
        let root = TempDir::new().unwrap();
        let service = service();

        let folder = service
            .validate_and_create("Shorts", root.path(), "*/10 * * * *")
            .await
            .unwrap();

        assert!(root.path().join("archive").is_dir());
        assert!(folder.is_active);
        assert_eq!(service.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rejects_missing_path() {
        let root = TempDir::new().unwrap();
        let err = service()
            .validate_and_create("Shorts", &root.path().join("missing"), "* * * * *")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_rejects_bad_cron_without_creating_archive() {
        let root = TempDir::new().unwrap();
        let err = service()
            .validate_and_create("Shorts", root.path(), "every minute")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        assert!(!root.path().join("archive").exists());
    }
}
