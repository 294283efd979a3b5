//! Item discovery in watched folders
//!
//! A watched folder holds one directory per item, named `<n>-<anything>`.
//! The scanner ignores the `archive` directory, hidden entries and OS
//! artifacts, keeps directories with exactly one media file, and orders
//! them by the numeric prefix of their name.
//!
//! Ordering is total: entries with a numeric prefix come first in ascending
//! numeric order, everything else follows sorted by name. Ties on the prefix
//! (`1-a`, `01-b`) are broken by name as well.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

use crate::config::ScannerConfig;
use crate::errors::{ScanError, ScanResult};
use crate::models::{ItemMetadata, PendingItem};

/// Directory that receives published items
pub const ARCHIVE_DIR: &str = "archive";

/// Directory that receives items which can never be published
pub const QUARANTINE_DIR: &str = ".quarantine";

const OS_ARTIFACTS: &[&str] = &[
    "Thumbs.db",
    "desktop.ini",
    "$RECYCLE.BIN",
    "System Volume Information",
    "__MACOSX",
    "Icon\r",
];

/// Metadata descriptor and optional thumbnail of one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFiles {
    pub metadata_path: PathBuf,
    pub thumbnail_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct FolderScanner {
    metadata_file: String,
    media_extensions: Vec<String>,
    thumbnail_extensions: Vec<String>,
}

impl FolderScanner {
    pub fn new(config: &ScannerConfig) -> Self {
        Self {
            metadata_file: config.metadata_file.clone(),
            media_extensions: lowercase_all(&config.media_extensions),
            thumbnail_extensions: lowercase_all(&config.thumbnail_extensions),
        }
    }

    /// All pending items of a folder, in processing order
    pub async fn list_pending(&self, folder: &Path) -> ScanResult<Vec<PendingItem>> {
        let mut entries = tokio::fs::read_dir(folder)
            .await
            .map_err(|e| ScanError::io(folder, e))?;

        let mut items = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ScanError::io(folder, e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_reserved_name(&name) {
                trace!("Ignoring reserved entry {}", name);
                continue;
            }

            let file_type = entry
                .file_type()
                .await
                .map_err(|e| ScanError::io(entry.path(), e))?;
            if !file_type.is_dir() {
                debug!("Ignoring non-directory entry {} in {}", name, folder.display());
                continue;
            }

            // A bad item must not block the rest of the folder
            match self.inspect_item(&entry.path()).await {
                Ok(item) => items.push(item),
                Err(e) => warn!("Skipping {}: {}", entry.path().display(), e),
            }
        }

        items.sort_by(compare_items);
        Ok(items)
    }

    /// First pending item of a folder, if any
    pub async fn next_pending(&self, folder: &Path) -> ScanResult<Option<PendingItem>> {
        Ok(self.list_pending(folder).await?.into_iter().next())
    }

    /// Build a [`PendingItem`] for one item directory
    ///
    /// Fails unless the directory holds exactly one media file. The metadata
    /// descriptor is not required to exist yet; see [`Self::find_metadata`].
    pub async fn inspect_item(&self, dir: &Path) -> ScanResult<PendingItem> {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let files = self.item_files(dir).await?;
        let media: Vec<&PathBuf> = files
            .iter()
            .filter(|p| has_extension(p, &self.media_extensions))
            .collect();

        let media_path = match media.as_slice() {
            [single] => (*single).clone(),
            [] => {
                return Err(ScanError::MissingMedia {
                    path: dir.to_path_buf(),
                });
            }
            many => {
                return Err(ScanError::AmbiguousMedia {
                    path: dir.to_path_buf(),
                    count: many.len(),
                });
            }
        };

        Ok(PendingItem {
            order_prefix: parse_order_prefix(&name),
            name,
            dir: dir.to_path_buf(),
            metadata_path: dir.join(&self.metadata_file),
            media_path,
            thumbnail_path: self.find_thumbnail(&files),
        })
    }

    /// Resolve the metadata descriptor and optional thumbnail of an item
    pub async fn find_metadata(&self, dir: &Path) -> ScanResult<ItemFiles> {
        let metadata_path = dir.join(&self.metadata_file);
        if !tokio::fs::try_exists(&metadata_path)
            .await
            .map_err(|e| ScanError::io(&metadata_path, e))?
        {
            return Err(ScanError::MissingMetadata {
                path: metadata_path,
            });
        }

        let files = self.item_files(dir).await?;
        Ok(ItemFiles {
            metadata_path,
            thumbnail_path: self.find_thumbnail(&files),
        })
    }

    /// Read and parse a metadata descriptor
    pub async fn load_metadata(&self, path: &Path) -> ScanResult<ItemMetadata> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ScanError::MissingMetadata {
                    path: path.to_path_buf(),
                });
            }
            Err(e) => return Err(ScanError::io(path, e)),
        };

        serde_json::from_str(&contents).map_err(|source| ScanError::MalformedMetadata {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Visible regular files of an item directory, sorted by name
    async fn item_files(&self, dir: &Path) -> ScanResult<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| ScanError::io(dir, e))?;

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| ScanError::io(dir, e))? {
            let name = entry.file_name();
            if is_reserved_name(&name.to_string_lossy()) {
                continue;
            }
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| ScanError::io(entry.path(), e))?;
            if file_type.is_file() {
                files.push(entry.path());
            }
        }

        files.sort();
        Ok(files)
    }

    fn find_thumbnail(&self, files: &[PathBuf]) -> Option<PathBuf> {
        files
            .iter()
            .find(|p| has_extension(p, &self.thumbnail_extensions))
            .cloned()
    }
}

/// `archive`, hidden entries and OS artifacts are never items
pub fn is_reserved_name(name: &str) -> bool {
    name == ARCHIVE_DIR || name.starts_with('.') || OS_ARTIFACTS.contains(&name)
}

/// Integer before the first `-`, e.g. `12` for `12-intro`
pub fn parse_order_prefix(name: &str) -> Option<u64> {
    let prefix = name.split('-').next().unwrap_or(name);
    prefix.trim().parse().ok()
}

fn compare_items(a: &PendingItem, b: &PendingItem) -> Ordering {
    match (a.order_prefix, b.order_prefix) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.name.cmp(&b.name)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.name.cmp(&b.name),
    }
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|ext| extensions.iter().any(|e| *e == ext))
}

fn lowercase_all(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim_start_matches('.').to_ascii_lowercase())
        .collect()
}
