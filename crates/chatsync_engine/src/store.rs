//! Local document persistence.
//!
//! The sync engine is the only writer of the local document. Readers (the UI
//! layer) may load at any time, so writes must never expose a half-written
//! file:
//!
//! ```text
//! <dir>/
//! ├─ state.json        # current document
//! ├─ state.json.tmp    # write target, renamed over state.json
//! └─ state.json.lock   # advisory lock: exclusive for writes, shared for reads
//! ```

use crate::error::SyncResult;
use chatsync_protocol::{decode_snapshot, encode_snapshot, Document};
use fs2::FileExt;
use parking_lot::RwLock;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Owner of the local document between sync cycles.
pub trait DocumentStore: Send + Sync {
    /// Loads the current document. A store that was never written yields an
    /// empty document.
    fn load(&self) -> SyncResult<Document>;

    /// Replaces the current document.
    fn save(&self, document: &Document) -> SyncResult<()>;
}

impl<S: DocumentStore + ?Sized> DocumentStore for std::sync::Arc<S> {
    fn load(&self) -> SyncResult<Document> {
        (**self).load()
    }

    fn save(&self, document: &Document) -> SyncResult<()> {
        (**self).save(document)
    }
}

/// An in-memory document store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    document: RwLock<Document>,
}

impl MemoryStore {
    /// Creates a store holding `document`.
    pub fn new(document: Document) -> Self {
        Self {
            document: RwLock::new(document),
        }
    }
}

impl DocumentStore for MemoryStore {
    fn load(&self) -> SyncResult<Document> {
        Ok(self.document.read().clone())
    }

    fn save(&self, document: &Document) -> SyncResult<()> {
        *self.document.write() = document.clone();
        Ok(())
    }
}

/// A JSON file on disk, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Creates a store backed by `path`. Parent directories are created on
    /// the first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the path of the document file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(suffix);
        PathBuf::from(name)
    }

    fn open_lock(&self) -> SyncResult<File> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.sibling(".lock"))?;
        Ok(file)
    }
}

impl DocumentStore for FileStore {
    fn load(&self) -> SyncResult<Document> {
        if !self.path.exists() {
            return Ok(Document::new());
        }

        let lock = self.open_lock()?;
        lock.lock_shared()?;
        let contents = fs::read_to_string(&self.path);
        lock.unlock()?;

        let contents = contents?;
        if chatsync_protocol::is_blank(&contents) {
            return Ok(Document::new());
        }
        Ok(decode_snapshot(&contents)?)
    }

    fn save(&self, document: &Document) -> SyncResult<()> {
        let data = encode_snapshot(document)?;
        let lock = self.open_lock()?;
        lock.lock_exclusive()?;
        let result = write_atomic(&self.path, &self.sibling(".tmp"), data.as_bytes());
        lock.unlock()?;
        result
    }
}

/// Write-then-rename: the target either holds the old or the new contents.
pub(crate) fn write_atomic(path: &Path, temp_path: &Path, data: &[u8]) -> SyncResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut file = File::create(temp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatsync_protocol::{Message, Role, Session};
    use tempfile::tempdir;

    fn sample() -> Document {
        let mut doc = Document::new();
        let mut session = Session::new("s1", "notes", 1);
        session.push_message(Message::new("m1", Role::User, "remember milk", 1), 1);
        doc.upsert_session(session);
        doc
    }

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryStore::default();
        assert!(store.load().unwrap().is_empty());

        store.save(&sample()).unwrap();
        assert_eq!(store.load().unwrap(), sample());
    }

    #[test]
    fn file_store_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("state.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn file_store_persists_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        FileStore::new(&path).save(&sample()).unwrap();
        assert_eq!(FileStore::new(&path).load().unwrap(), sample());
        assert!(!dir.path().join("nested").join("state.json.tmp").exists());
    }

    #[test]
    fn file_store_rejects_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            FileStore::new(&path).load(),
            Err(crate::SyncError::Validation(_))
        ));
    }

    #[test]
    fn file_store_overwrite_replaces_contents() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("state.json"));

        store.save(&sample()).unwrap();
        store.save(&Document::new()).unwrap();
        assert!(store.load().unwrap().is_empty());
    }
}
