//! On-disk layout of the source directory and the sidecar store.
//!
//! # Layout
//!
//! ```text
//! <source_dir>/
//! └── <identity>.md            # authored post (authoritative)
//! <sidecar_dir>/
//! ├── .folio.lock              # held while the cache is being written
//! └── <identity>.json          # cached record state
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tempfile::NamedTempFile;

use super::error::{CacheError, CacheResult};
use super::record::Identity;

/// Extension used for sidecar files
pub const SIDECAR_EXTENSION: &str = "json";

/// Name of the advisory lock file inside the sidecar directory
const LOCK_FILE: &str = ".folio.lock";

/// Paths and file access for sources and sidecars
#[derive(Debug, Clone)]
pub struct ContentStore {
    source_dir: PathBuf,
    sidecar_dir: PathBuf,
    extension: String,
}

impl ContentStore {
    /// Create a store over a source directory and a sidecar directory
    pub fn new(
        source_dir: impl Into<PathBuf>,
        sidecar_dir: impl Into<PathBuf>,
        extension: impl Into<String>,
    ) -> Self {
        let extension: String = extension.into();
        Self {
            source_dir: source_dir.into(),
            sidecar_dir: sidecar_dir.into(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn sidecar_dir(&self) -> &Path {
        &self.sidecar_dir
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Path of the source file for an identity
    pub fn source_path(&self, identity: &Identity) -> PathBuf {
        self.source_dir
            .join(format!("{}.{}", identity.as_str(), self.extension))
    }

    /// Path of the sidecar for an identity
    pub fn sidecar_path(&self, identity: &Identity) -> PathBuf {
        self.sidecar_dir
            .join(format!("{}.{}", identity.as_str(), SIDECAR_EXTENSION))
    }

    /// Map a path to an identity if it names a tracked source file.
    ///
    /// Backup files (`post.md~`), editor lock/swap files (`.#post.md`,
    /// `.post.md.swp`) and anything with another extension are rejected.
    /// The extension must match exactly so `source_path` finds the file again.
    pub fn identity_for(&self, path: &Path) -> Option<Identity> {
        let name = path.file_name()?.to_str()?;
        if name.starts_with('.') || name.ends_with('~') {
            return None;
        }

        let matches_ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext == self.extension)
            .unwrap_or(false);

        if !matches_ext {
            return None;
        }

        Identity::from_path(path)
    }

    /// Create the sidecar directory if needed
    pub fn ensure_dirs(&self) -> CacheResult<()> {
        fs::create_dir_all(&self.sidecar_dir).map_err(|e| CacheError::io(&self.sidecar_dir, e))
    }

    /// Every identity present in the source directory, sorted
    pub fn list_identities(&self) -> CacheResult<Vec<Identity>> {
        let entries =
            fs::read_dir(&self.source_dir).map_err(|e| CacheError::io(&self.source_dir, e))?;

        let mut identities = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CacheError::io(&self.source_dir, e))?;
            let path = entry.path();

            match entry.file_type() {
                Ok(ft) if ft.is_file() => {}
                _ => continue,
            }

            if let Some(identity) = self.identity_for(&path) {
                identities.push(identity);
            }
        }

        identities.sort();
        Ok(identities)
    }

    /// Every identity with a sidecar, sorted
    pub fn list_sidecars(&self) -> CacheResult<Vec<Identity>> {
        let entries = match fs::read_dir(&self.sidecar_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CacheError::io(&self.sidecar_dir, e)),
        };

        let mut identities = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CacheError::io(&self.sidecar_dir, e))?;
            let path = entry.path();

            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name,
                None => continue,
            };
            if name.starts_with('.') {
                continue;
            }

            let is_sidecar = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext == SIDECAR_EXTENSION)
                .unwrap_or(false);

            if is_sidecar {
                if let Some(identity) = Identity::from_path(&path) {
                    identities.push(identity);
                }
            }
        }

        identities.sort();
        Ok(identities)
    }

    /// Remove a sidecar, returning whether one existed
    pub fn remove_sidecar(&self, identity: &Identity) -> CacheResult<bool> {
        let path = self.sidecar_path(identity);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::io(path, e)),
        }
    }

    /// Take the exclusive advisory lock on the sidecar store
    pub fn lock(&self) -> CacheResult<StoreLock> {
        self.ensure_dirs()?;

        let path = self.sidecar_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| CacheError::io(&path, e))?;

        file.lock_exclusive().map_err(|e| CacheError::io(&path, e))?;

        Ok(StoreLock { file })
    }
}

/// Exclusive lock on the sidecar store, released on drop
#[derive(Debug)]
pub struct StoreLock {
    file: File,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Replace a file's contents atomically (write a temp file, then rename)
pub(crate) fn write_atomic(path: &Path, contents: &str) -> CacheResult<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(dir).map_err(|e| CacheError::io(dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| CacheError::io(dir, e))?;
    tmp.write_all(contents.as_bytes())
        .map_err(|e| CacheError::io(tmp.path(), e))?;
    tmp.flush().map_err(|e| CacheError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| CacheError::io(path, e.error))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(temp: &TempDir) -> ContentStore {
        ContentStore::new(temp.path().join("posts"), temp.path().join("sidecars"), "md")
    }

    #[test]
    fn test_identity_for_filters_transient_paths() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let dir = store.source_dir().to_path_buf();

        assert_eq!(
            store.identity_for(&dir.join("hello world.md")),
            Some(Identity::new("hello world"))
        );
        assert!(store.identity_for(&dir.join("hello.MD")).is_none());
        assert!(store.identity_for(&dir.join("hello.md~")).is_none());
        assert!(store.identity_for(&dir.join("hello~")).is_none());
        assert!(store.identity_for(&dir.join(".#hello.md")).is_none());
        assert!(store.identity_for(&dir.join(".hello.md.swp")).is_none());
        assert!(store.identity_for(&dir.join("hello.txt")).is_none());
        assert!(store.identity_for(&dir.join("hello")).is_none());
    }

    #[test]
    fn test_extension_leading_dot_ignored() {
        let store = ContentStore::new("/posts", "/sidecars", ".md");
        assert_eq!(store.extension(), "md");
        assert_eq!(
            store.source_path(&Identity::new("a")),
            PathBuf::from("/posts/a.md")
        );
        assert_eq!(
            store.sidecar_path(&Identity::new("a")),
            PathBuf::from("/sidecars/a.json")
        );
    }

    #[test]
    fn test_list_identities_sorted_and_filtered() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        fs::create_dir_all(store.source_dir()).unwrap();
        fs::create_dir_all(store.source_dir().join("nested.md")).unwrap();

        for name in ["b.md", "a.md", "c.md~", "notes.txt"] {
            fs::write(store.source_dir().join(name), "x").unwrap();
        }

        let ids = store.list_identities().unwrap();
        assert_eq!(ids, vec![Identity::new("a"), Identity::new("b")]);
    }

    #[test]
    fn test_list_sidecars_skips_lock_file() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        assert!(store.list_sidecars().unwrap().is_empty());

        let _lock = store.lock().unwrap();
        write_atomic(&store.sidecar_path(&Identity::new("a")), "{}").unwrap();

        assert_eq!(store.list_sidecars().unwrap(), vec![Identity::new("a")]);
    }

    #[test]
    fn test_write_atomic_overwrites_and_remove() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let id = Identity::new("post");
        let path = store.sidecar_path(&id);

        write_atomic(&path, "first").unwrap();
        write_atomic(&path, "second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");

        assert!(store.remove_sidecar(&id).unwrap());
        assert!(!store.remove_sidecar(&id).unwrap());
    }
}
