use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use coinvault_game::{Snapshot, SnapshotStorage, StorageError};

/// Keeps the saved session in a JSON file, like a desktop build would.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStorage for JsonFileStorage {
    fn save(&mut self, snapshot: &Snapshot) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(snapshot)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    fn load(&self) -> Result<Option<Snapshot>, StorageError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Err(err) if err.kind() != ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "coinvault-storage-{}-{name}.json",
            std::process::id()
        ))
    }

    #[test]
    fn saves_loads_and_clears() {
        let mut storage = JsonFileStorage::new(scratch("roundtrip"));
        assert!(storage.load().unwrap().is_none());

        let snapshot = Snapshot {
            level: 3,
            health: 2,
            slot_index: 4,
            streak: 1,
        };
        storage.save(&snapshot).unwrap();
        assert!(fs::read_to_string(storage.path()).unwrap().contains("\"slot_index\": 4"));
        assert_eq!(storage.load().unwrap(), Some(snapshot));

        storage.clear().unwrap();
        assert!(!storage.path().exists());
        storage.clear().unwrap();
    }

    #[test]
    fn corrupt_file_is_a_serialization_error() {
        let path = scratch("corrupt");
        fs::write(&path, "not json").unwrap();
        let storage = JsonFileStorage::new(&path);
        assert!(matches!(storage.load(), Err(StorageError::Serialization(_))));
        fs::remove_file(path).unwrap();
    }
}
