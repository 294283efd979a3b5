//! Directory relocation used for archival and quarantine

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Move every file under `src` to the same relative path under `dst`, then
/// remove the emptied source directories
///
/// Existing files at the destination are overwritten.
pub(super) async fn move_dir(src: &Path, dst: &Path) -> io::Result<()> {
    let mut pending: Vec<(PathBuf, PathBuf)> = vec![(src.to_path_buf(), dst.to_path_buf())];
    let mut emptied = Vec::new();

    while let Some((from, to)) = pending.pop() {
        fs::create_dir_all(&to).await?;

        let mut entries = fs::read_dir(&from).await?;
        while let Some(entry) = entries.next_entry().await? {
            let target = to.join(entry.file_name());
            if entry.file_type().await?.is_dir() {
                pending.push((entry.path(), target));
            } else {
                move_file(&entry.path(), &target).await?;
            }
        }

        emptied.push(from);
    }

    // parents were recorded before their children
    for dir in emptied.into_iter().rev() {
        fs::remove_dir(&dir).await?;
    }

    Ok(())
}

async fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            // rename cannot cross filesystems
            debug!(
                "rename {} -> {} failed ({}), copying instead",
                from.display(),
                to.display(),
                rename_err
            );
            fs::copy(from, to).await.map_err(|_| rename_err)?;
            fs::remove_file(from).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_move_dir_mirrors_tree_and_removes_source() {
        let root = TempDir::new().unwrap();
        let src = root.path().join("3-clip");
        std::fs::create_dir_all(src.join("extras")).unwrap();
        std::fs::write(src.join("clip.mp4"), b"video").unwrap();
        std::fs::write(src.join("metadata.json"), b"{}").unwrap();
        std::fs::write(src.join("extras").join("notes.txt"), b"n").unwrap();

        let dst = root.path().join("archive").join("3-clip");
        move_dir(&src, &dst).await.unwrap();

        assert!(!src.exists());
        assert_eq!(std::fs::read(dst.join("clip.mp4")).unwrap(), b"video");
        assert!(dst.join("metadata.json").is_file());
        assert!(dst.join("extras").join("notes.txt").is_file());
    }

    #[tokio::test]
    async fn test_move_dir_reports_missing_source() {
        let root = TempDir::new().unwrap();
        let result = move_dir(&root.path().join("gone"), &root.path().join("archive/gone")).await;
        assert!(result.is_err());
    }
}
