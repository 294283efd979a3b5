use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One item directory ready to be published
///
/// Derived at scan time and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingItem {
    /// Integer parsed from the name before the first `-`, if any
    pub order_prefix: Option<u64>,
    /// Directory name, e.g. `12-intro`
    pub name: String,
    pub dir: PathBuf,
    pub metadata_path: PathBuf,
    pub media_path: PathBuf,
    pub thumbnail_path: Option<PathBuf>,
}

impl PendingItem {
    /// Ledger dedup key
    pub fn item_path(&self) -> String {
        self.dir.to_string_lossy().into_owned()
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PrivacyStatus {
    #[default]
    Private,
    Unlisted,
    Public,
}

/// Contents of an item's metadata descriptor (`metadata.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemMetadata {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Scheduled publication time; the API requires `private` for this to apply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub privacy_status: PrivacyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
}

impl ItemMetadata {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            tags: Vec::new(),
            publish_at: None,
            privacy_status: PrivacyStatus::default(),
            category_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_descriptor_defaults_to_private() {
        let meta: ItemMetadata =
            serde_json::from_str(r#"{"title":"T","description":"D","tags":[]}"#).unwrap();
        assert_eq!(meta.title, "T");
        assert_eq!(meta.privacy_status, PrivacyStatus::Private);
        assert!(meta.publish_at.is_none());
    }

    #[test]
    fn test_descriptor_reads_camel_case_fields() {
        let meta: ItemMetadata = serde_json::from_str(
            r#"{
                "title": "Launch",
                "description": "",
                "tags": ["a", "b"],
                "publishAt": "2025-03-01T17:00:00Z",
                "privacyStatus": "unlisted"
            }"#,
        )
        .unwrap();
        assert_eq!(meta.tags, vec!["a", "b"]);
        assert_eq!(meta.privacy_status, PrivacyStatus::Unlisted);
        assert_eq!(
            meta.publish_at.unwrap().to_rfc3339(),
            "2025-03-01T17:00:00+00:00"
        );
    }
}
