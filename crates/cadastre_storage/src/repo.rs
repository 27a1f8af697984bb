#![forbid(unsafe_code)]

use crate::journal::{check_extends, EventJournalRow, JournalFile};
use crate::snapshot::{RegistrySnapshot, SnapshotFile};
use crate::StorageError;

/// Typed repository interface for the committed-event journal.
pub trait EventJournalRepo {
    fn load_event_rows(&self) -> Result<Vec<EventJournalRow>, StorageError>;
    /// Highest seq already persisted; 0 for an empty journal.
    fn persisted_seq(&self) -> u64;
    fn append_event_rows(&mut self, rows: &[EventJournalRow]) -> Result<(), StorageError>;
}

/// Typed repository interface for current-state snapshot persistence.
pub trait RegistrySnapshotRepo {
    fn load_snapshot(&self) -> Result<Option<RegistrySnapshot>, StorageError>;
    fn save_snapshot(&mut self, snapshot: &RegistrySnapshot) -> Result<(), StorageError>;
}

impl EventJournalRepo for JournalFile {
    fn load_event_rows(&self) -> Result<Vec<EventJournalRow>, StorageError> {
        self.load()
    }

    fn persisted_seq(&self) -> u64 {
        self.last_seq()
    }

    fn append_event_rows(&mut self, rows: &[EventJournalRow]) -> Result<(), StorageError> {
        self.append(rows)
    }
}

impl RegistrySnapshotRepo for SnapshotFile {
    fn load_snapshot(&self) -> Result<Option<RegistrySnapshot>, StorageError> {
        self.load()
    }

    fn save_snapshot(&mut self, snapshot: &RegistrySnapshot) -> Result<(), StorageError> {
        self.save(snapshot)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryJournalRepo {
    rows: Vec<EventJournalRow>,
}

impl InMemoryJournalRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventJournalRepo for InMemoryJournalRepo {
    fn load_event_rows(&self) -> Result<Vec<EventJournalRow>, StorageError> {
        Ok(self.rows.clone())
    }

    fn persisted_seq(&self) -> u64 {
        self.rows.last().map(|row| row.seq).unwrap_or(0)
    }

    fn append_event_rows(&mut self, rows: &[EventJournalRow]) -> Result<(), StorageError> {
        check_extends(self.persisted_seq(), rows)?;
        self.rows.extend_from_slice(rows);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemorySnapshotRepo {
    latest: Option<RegistrySnapshot>,
    saves: u64,
}

impl InMemorySnapshotRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_count(&self) -> u64 {
        self.saves
    }
}

impl RegistrySnapshotRepo for InMemorySnapshotRepo {
    fn load_snapshot(&self) -> Result<Option<RegistrySnapshot>, StorageError> {
        Ok(self.latest.clone())
    }

    fn save_snapshot(&mut self, snapshot: &RegistrySnapshot) -> Result<(), StorageError> {
        snapshot.check_schema()?;
        self.latest = Some(snapshot.clone());
        self.saves = self.saves.saturating_add(1);
        Ok(())
    }
}
