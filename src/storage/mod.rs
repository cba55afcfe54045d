//! Local file store for uploaded images.
//!
//! Records hold the stored filename only; the store owns the bytes on disk.
//! Deletion is best-effort by policy: a failed cleanup is logged and never
//! surfaced to the request that triggered it.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a file store rooted at `dir`, creating the directory if absent.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create uploads directory: {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Store an upload under a generated name: the current unix-millis
    /// timestamp plus the original file's extension.
    pub fn save(&self, original_name: &str, bytes: &[u8]) -> Result<String> {
        let ext = Path::new(original_name)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        // Same-millisecond uploads would collide; bump until free.
        let mut millis = chrono::Utc::now().timestamp_millis();
        let mut filename = format!("{}{}", millis, ext);
        while self.dir.join(&filename).exists() {
            millis += 1;
            filename = format!("{}{}", millis, ext);
        }

        let path = self.dir.join(&filename);
        std::fs::write(&path, bytes)
            .with_context(|| format!("Failed to write upload: {}", path.display()))?;
        debug!("Stored upload {}", path.display());
        Ok(filename)
    }

    /// Fire-and-forget deletion. The result is intentionally swallowed:
    /// cleanup must never block or fail the record operation that owns it.
    pub fn delete_best_effort(&self, filename: &str) {
        let path = self.dir.join(filename);
        match std::fs::remove_file(&path) {
            Ok(()) => debug!("Deleted file {}", path.display()),
            Err(e) => warn!("Failed to delete file {}: {}", path.display(), e),
        }
    }

    pub fn exists(&self, filename: &str) -> bool {
        self.dir.join(filename).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (FileStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        (store, dir)
    }

    #[test]
    fn test_save_keeps_extension() {
        let (store, _dir) = store();
        let name = store.save("photo.png", b"abc").unwrap();
        assert!(name.ends_with(".png"));
        assert!(store.exists(&name));
    }

    #[test]
    fn test_save_without_extension() {
        let (store, _dir) = store();
        let name = store.save("photo", b"abc").unwrap();
        assert!(!name.contains('.'));
        assert!(store.exists(&name));
    }

    #[test]
    fn test_same_millisecond_saves_get_distinct_names() {
        let (store, _dir) = store();
        let a = store.save("a.jpg", b"one").unwrap();
        let b = store.save("b.jpg", b"two").unwrap();
        assert_ne!(a, b);
        assert!(store.exists(&a));
        assert!(store.exists(&b));
    }

    #[test]
    fn test_delete_removes_file() {
        let (store, _dir) = store();
        let name = store.save("photo.jpg", b"abc").unwrap();
        store.delete_best_effort(&name);
        assert!(!store.exists(&name));
    }

    #[test]
    fn test_delete_missing_file_is_swallowed() {
        let (store, _dir) = store();
        // Must not panic or surface an error
        store.delete_best_effort("no-such-file.jpg");
    }
}
