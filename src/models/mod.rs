//! Domain models shared by the scanner, pipeline, scheduler and ledger

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod item;

pub use item::{ItemMetadata, PendingItem, PrivacyStatus};

/// A watched source folder with its own recurring trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderConfig {
    pub id: Uuid,
    pub name: String,
    /// Absolute path of the item-source directory
    pub path: String,
    /// 5-field cron expression, local timezone
    pub cron_expression: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct FolderConfigCreateRequest {
    pub name: String,
    pub path: String,
    pub cron_expression: String,
}

/// Lifecycle of one publication attempt in the ledger
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UploadStatus {
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub id: Uuid,
    pub folder_config_id: Uuid,
    pub item_name: String,
    /// Item directory path; the dedup key for completed publications
    pub item_path: String,
    pub status: UploadStatus,
    pub external_id: Option<String>,
    pub error_message: Option<String>,
    pub metadata: ItemMetadata,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Terminal failure of an item, one row per item path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub id: Uuid,
    pub folder_config_id: Uuid,
    pub item_name: String,
    pub item_path: String,
    pub error_message: String,
    pub retry_count: i32,
    pub last_retry_at: Option<DateTime<Utc>>,
    pub metadata: Option<ItemMetadata>,
    pub created_at: DateTime<Utc>,
}
