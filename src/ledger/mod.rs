//! Upload ledger: folder configurations, upload records and failure records
//!
//! The pipeline and scheduler only talk to the [`Ledger`] trait. Two
//! implementations ship with the crate: [`SeaOrmLedger`] over a SQL database
//! and [`InMemoryLedger`] for dry runs and tests. Implementations must be safe
//! to call from several in-flight pipelines at once.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::database::Database;
use crate::errors::RepositoryResult;
use crate::models::{
    FailureRecord, FolderConfig, FolderConfigCreateRequest, ItemMetadata, UploadRecord,
};

pub mod memory;
pub mod sea_orm_ledger;

pub use memory::InMemoryLedger;
pub use sea_orm_ledger::SeaOrmLedger;

/// Database URL that selects the volatile ledger
pub const MEMORY_LEDGER_URL: &str = "memory:";

/// Persistence operations consumed by the upload pipeline and scheduler
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Open an `in_progress` record for one publication attempt
    async fn create_upload_entry(
        &self,
        folder_config_id: Uuid,
        item_name: &str,
        item_path: &str,
        metadata: &ItemMetadata,
    ) -> RepositoryResult<UploadRecord>;

    async fn mark_completed(&self, record_id: Uuid, external_id: &str)
    -> RepositoryResult<UploadRecord>;

    /// Close an `in_progress` record that ended in failure or quota suspension
    async fn mark_failed(&self, record_id: Uuid, error_message: &str)
    -> RepositoryResult<UploadRecord>;

    /// Record a terminal failure; repeated failures of one item path bump its retry count
    async fn create_failure_entry(
        &self,
        folder_config_id: Uuid,
        item_name: &str,
        item_path: &str,
        error_message: &str,
        metadata: Option<&ItemMetadata>,
    ) -> RepositoryResult<FailureRecord>;

    /// The dedup lookup: a completed record for this item path, if any
    async fn find_completed_by_item_path(
        &self,
        item_path: &str,
    ) -> RepositoryResult<Option<UploadRecord>>;

    async fn list_active_folder_configs(&self) -> RepositoryResult<Vec<FolderConfig>>;
}

/// Administrative operations used by the CLI and folder service
#[async_trait]
pub trait LedgerAdmin: Ledger {
    async fn create_folder_config(
        &self,
        request: FolderConfigCreateRequest,
    ) -> RepositoryResult<FolderConfig>;

    async fn get_folder_config(&self, id: Uuid) -> RepositoryResult<Option<FolderConfig>>;

    async fn list_folder_configs(&self) -> RepositoryResult<Vec<FolderConfig>>;

    async fn set_folder_active(&self, id: Uuid, is_active: bool) -> RepositoryResult<FolderConfig>;

    async fn list_recent_uploads(&self, limit: u64) -> RepositoryResult<Vec<UploadRecord>>;

    async fn list_failures(&self, limit: u64) -> RepositoryResult<Vec<FailureRecord>>;
}

/// Source of the folder configurations the scheduler registers triggers for
#[async_trait]
pub trait FolderConfigProvider: Send + Sync {
    async fn active_folder_configs(&self) -> RepositoryResult<Vec<FolderConfig>>;
}

#[async_trait]
impl<L: Ledger> FolderConfigProvider for L {
    async fn active_folder_configs(&self) -> RepositoryResult<Vec<FolderConfig>> {
        self.list_active_folder_configs().await
    }
}

/// A concrete ledger, handed out under each of the roles it plays
#[derive(Clone)]
pub enum LedgerHandle {
    Durable(Arc<SeaOrmLedger>),
    Memory(Arc<InMemoryLedger>),
}

impl LedgerHandle {
    /// Open the ledger named by `database.url`, running migrations for SQL backends
    pub async fn open(config: &DatabaseConfig) -> anyhow::Result<Self> {
        if config.url == MEMORY_LEDGER_URL {
            tracing::warn!("Using in-memory ledger; upload history is lost on exit");
            return Ok(Self::Memory(Arc::new(InMemoryLedger::new())));
        }

        let database = Database::new(config).await?;
        database.migrate().await?;
        Ok(Self::Durable(Arc::new(SeaOrmLedger::new(database.connection()))))
    }

    pub fn ledger(&self) -> Arc<dyn Ledger> {
        match self {
            Self::Durable(l) => l.clone(),
            Self::Memory(l) => l.clone(),
        }
    }

    pub fn admin(&self) -> Arc<dyn LedgerAdmin> {
        match self {
            Self::Durable(l) => l.clone(),
            Self::Memory(l) => l.clone(),
        }
    }

    pub fn folder_provider(&self) -> Arc<dyn FolderConfigProvider> {
        match self {
            Self::Durable(l) => l.clone(),
            Self::Memory(l) => l.clone(),
        }
    }
}
