//! Directory-backed storage: one JSON document per key.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::{ContextId, StorageBackend, StorageError};

/// Stores each key as `<dir>/<key>.json`.
///
/// Writes land in a temp file in the same directory that is then persisted
/// over the target, so readers in other processes never see a torn document.
/// There is no change feed; other processes are picked up by polling.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Open (and create if needed) a storage directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File that holds `key`. Characters outside `[A-Za-z0-9_-.]` become `_`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let file_stem: String = key
            .chars()
            .map(|ch| {
                if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                    ch
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{file_stem}.json"))
    }
}

impl StorageBackend for FileStorage {
    fn name(&self) -> &'static str {
        "file"
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    fn set(&self, key: &str, value: &str, origin: ContextId) -> Result<(), StorageError> {
        let target = self.path_for(key);
        let mut staged = NamedTempFile::new_in(&self.dir)?;
        staged.write_all(value.as_bytes())?;
        staged.as_file().sync_all()?;
        staged.persist(&target).map_err(|error| error.error)?;

        tracing::trace!(path = %target.display(), %origin, "Persisted collection file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_key_reads_as_none() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();
        assert_eq!(storage.get("appointments").unwrap(), None);
    }

    #[test]
    fn test_write_replaces_document() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();

        storage.set("appointments", "[1]", ContextId::new()).unwrap();
        storage.set("appointments", "[2]", ContextId::new()).unwrap();

        assert_eq!(storage.get("appointments").unwrap().as_deref(), Some("[2]"));
        assert!(dir.path().join("appointments.json").exists());
    }

    #[test]
    fn test_key_is_sanitized_into_file_name() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();
        assert_eq!(
            storage.path_for("patient/42 appts"),
            dir.path().join("patient_42_appts.json")
        );
    }

    #[test]
    fn test_two_handles_share_directory() {
        let dir = tempdir().unwrap();
        let writer = FileStorage::open(dir.path()).unwrap();
        let reader = FileStorage::open(dir.path()).unwrap();

        writer.set("k", "{}", ContextId::new()).unwrap();
        assert_eq!(reader.get("k").unwrap().as_deref(), Some("{}"));
    }
}
