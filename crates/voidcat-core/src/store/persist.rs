//! Atomic JSON persistence.
//!
//! Each entity set is one JSON document written through a temp file in the
//! same directory followed by a rename, so the file on disk is always
//! either the pre-state or the post-state. A crash mid-write leaves only a
//! stale temp file, which loading ignores.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::Result;

/// Write `value` to `path` atomically: serialize to `<path>.tmp`, then
/// rename over the target.
pub async fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = tmp_path(path);
    let bytes = serde_json::to_vec_pretty(value)?;
    tokio::fs::write(&tmp, &bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    debug!(path = %path.display(), bytes = bytes.len(), "persisted");
    Ok(())
}

/// Load a document, or its default when the file does not exist yet.
/// A present-but-corrupt document is an error; a leftover temp file from a
/// crashed write is never read.
pub async fn read_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}

fn tmp_path(path: &Path) -> std::path::PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Doc {
        version: u32,
        items: Vec<String>,
    }

    #[tokio::test]
    async fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.json");
        let doc = Doc { version: 1, items: vec!["a".into(), "b".into()] };
        write_atomic(&path, &doc).await.unwrap();
        let loaded: Doc = read_or_default(&path).await.unwrap();
        assert_eq!(loaded, doc);
    }

    #[tokio::test]
    async fn test_missing_file_loads_default() {
        let dir = TempDir::new().unwrap();
        let loaded: Doc = read_or_default(&dir.path().join("absent.json")).await.unwrap();
        assert_eq!(loaded, Doc::default());
    }

    #[tokio::test]
    async fn test_truncated_temp_file_does_not_corrupt_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.json");
        let doc = Doc { version: 1, items: vec!["pre-state".into()] };
        write_atomic(&path, &doc).await.unwrap();

        // Simulate a crash mid-write: a truncated temp file next to the
        // document, rename never executed.
        tokio::fs::write(dir.path().join("tasks.json.tmp"), b"{\"version\": 1, \"it")
            .await
            .unwrap();

        let loaded: Doc = read_or_default(&path).await.unwrap();
        assert_eq!(loaded, doc, "pre-state must survive a crashed write");
    }

    #[tokio::test]
    async fn test_corrupt_document_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.json");
        tokio::fs::write(&path, b"not json").await.unwrap();
        let result: Result<Doc> = read_or_default(&path).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_rewrite_replaces_whole_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.json");
        write_atomic(&path, &Doc { version: 1, items: vec!["old".into()] }).await.unwrap();
        write_atomic(&path, &Doc { version: 1, items: vec!["new".into()] }).await.unwrap();
        let loaded: Doc = read_or_default(&path).await.unwrap();
        assert_eq!(loaded.items, vec!["new".to_string()]);
    }
}
