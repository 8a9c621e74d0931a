//! Snapshot persistence seam.

use thiserror::Error;

use crate::state::Snapshot;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("snapshot storage unavailable: {0}")]
    Unavailable(String),
}

/// Platform-specific persistence for the single saved session.
pub trait SnapshotStorage {
    /// Overwrite the saved snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written.
    fn save(&mut self, snapshot: &Snapshot) -> Result<(), StorageError>;

    /// Read the saved snapshot; `None` means no prior session.
    ///
    /// # Errors
    ///
    /// Returns an error if a stored snapshot exists but cannot be read.
    fn load(&self) -> Result<Option<Snapshot>, StorageError>;

    /// Forget the saved snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored snapshot cannot be removed.
    fn clear(&mut self) -> Result<(), StorageError>;
}

/// Keeps the serialized snapshot in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStorage {
    record: Option<String>,
    read_only: bool,
}

impl MemorySnapshotStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage whose writes always fail.
    #[must_use]
    pub fn read_only() -> Self {
        Self {
            record: None,
            read_only: true,
        }
    }

    /// Seed the store with a raw record, valid or not.
    #[must_use]
    pub fn with_record(record: impl Into<String>) -> Self {
        Self {
            record: Some(record.into()),
            read_only: false,
        }
    }

    #[must_use]
    pub fn raw(&self) -> Option<&str> {
        self.record.as_deref()
    }
}

impl SnapshotStorage for MemorySnapshotStorage {
    fn save(&mut self, snapshot: &Snapshot) -> Result<(), StorageError> {
        if self.read_only {
            return Err(StorageError::Unavailable("read-only store".to_string()));
        }
        self.record = Some(serde_json::to_string(snapshot)?);
        Ok(())
    }

    fn load(&self) -> Result<Option<Snapshot>, StorageError> {
        self.record
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(StorageError::from)
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        if self.read_only {
            return Err(StorageError::Unavailable("read-only store".to_string()));
        }
        self.record = None;
        Ok(())
    }
}

impl<T: SnapshotStorage + ?Sized> SnapshotStorage for Box<T> {
    fn save(&mut self, snapshot: &Snapshot) -> Result<(), StorageError> {
        (**self).save(snapshot)
    }

    fn load(&self) -> Result<Option<Snapshot>, StorageError> {
        (**self).load()
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        (**self).clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_roundtrips_and_clears() {
        let mut store = MemorySnapshotStorage::new();
        assert!(store.load().unwrap().is_none());
        let snap = Snapshot {
            level: 2,
            health: 3,
            slot_index: 1,
            streak: 0,
        };
        store.save(&snap).unwrap();
        assert_eq!(store.load().unwrap(), Some(snap));
        store.clear().unwrap();
        assert!(store.raw().is_none());
    }

    #[test]
    fn corrupt_record_surfaces_as_error() {
        let store = MemorySnapshotStorage::with_record("{not json");
        assert!(matches!(store.load(), Err(StorageError::Serialization(_))));
    }

    #[test]
    fn read_only_store_rejects_writes() {
        let mut store = MemorySnapshotStorage::read_only();
        let snap = Snapshot {
            level: 1,
            health: 5,
            slot_index: 0,
            streak: 0,
        };
        assert!(matches!(
            store.save(&snap),
            Err(StorageError::Unavailable(_))
        ));
    }
}
