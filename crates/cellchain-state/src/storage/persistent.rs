use std::fs;
use std::path::{Path, PathBuf};

use cellchain_core::serialize;
use tracing::debug;

use super::{Entries, Storage, WriteBatch};
use crate::error::StateError;

/// File-backed storage holding the whole key space in one snapshot file.
///
/// `commit` rewrites the file through a temporary sibling and a rename, so a
/// crash mid-write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
    data: Entries,
    pending: WriteBatch,
}

impl FileStorage {
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self, StateError> {
        let path = path.into();
        let data = if path.exists() {
            let bytes = fs::read(&path).map_err(|e| StateError::Storage(e.to_string()))?;
            if bytes.is_empty() {
                Entries::new()
            } else {
                serialize::from_bytes(&bytes)
                    .map_err(|e| StateError::Serialization(e.to_string()))?
            }
        } else {
            Entries::new()
        };
        debug!(path = %path.display(), keys = data.len(), "opened snapshot file");

        Ok(FileStorage {
            path,
            data,
            pending: WriteBatch::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Committed entries
    pub fn entries(&self) -> &Entries {
        &self.data
    }

    fn flush(&self) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StateError::Storage(e.to_string()))?;
        }
        let bytes =
            serialize::to_bytes(&self.data).map_err(|e| StateError::Serialization(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &bytes).map_err(|e| StateError::Storage(e.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|e| StateError::Storage(e.to_string()))?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.pending.lookup(key) {
            Some(pending) => pending,
            None => self.data.get(key).cloned(),
        }
    }

    fn put(&mut self, key: &[u8], value: &[u8]) {
        self.pending.put(key, value);
    }

    fn delete(&mut self, key: &[u8]) {
        self.pending.delete(key);
    }

    fn commit(&mut self) -> Result<(), StateError> {
        let writes = self.pending.len();
        self.pending.drain_into(&mut self.data);
        self.flush()?;
        debug!(path = %self.path.display(), writes, "snapshot file written");
        Ok(())
    }

    fn rollback(&mut self) {
        self.pending.clear();
    }

    fn keys_with_prefix(&self, prefix: &[u8]) -> Vec<Vec<u8>> {
        self.pending.merged_keys(&self.data, prefix)
    }
}
