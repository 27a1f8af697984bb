#![forbid(unsafe_code)]

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use cadastre_kernel_contracts::event::RegistryEvent;
use cadastre_kernel_contracts::{LedgerTimeSecs, ReasonCodeId};
use serde::{Deserialize, Serialize};

use crate::StorageError;

pub const EVENT_JOURNAL_TABLE: &str = "event_journal";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventJournalRow {
    pub seq: u64,
    pub at: LedgerTimeSecs,
    pub reason_code: ReasonCodeId,
    pub event: RegistryEvent,
}

/// Append-only record of every committed registry event. Sequence ids start at 1 and never
/// repeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventJournal {
    rows: Vec<EventJournalRow>,
    next_seq: u64,
}

impl Default for EventJournal {
    fn default() -> Self {
        Self::new_in_memory()
    }
}

impl EventJournal {
    pub fn new_in_memory() -> Self {
        Self {
            rows: Vec::new(),
            next_seq: 1,
        }
    }

    /// Rebuilds a journal from persisted rows. Rows must be contiguous from seq 1 and carry the
    /// reason code of their own event.
    pub fn from_rows(rows: Vec<EventJournalRow>) -> Result<Self, StorageError> {
        for (idx, row) in rows.iter().enumerate() {
            if row.seq != idx as u64 + 1 {
                return Err(StorageError::CorruptTable {
                    table: EVENT_JOURNAL_TABLE,
                    reason: "sequence ids must be contiguous from 1",
                });
            }
            if row.reason_code != row.event.reason_code() {
                return Err(StorageError::CorruptTable {
                    table: EVENT_JOURNAL_TABLE,
                    reason: "reason code does not match event",
                });
            }
        }
        let next_seq = rows.len() as u64 + 1;
        Ok(Self { rows, next_seq })
    }

    pub fn append(&mut self, at: LedgerTimeSecs, event: RegistryEvent) -> u64 {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.saturating_add(1);
        self.rows.push(EventJournalRow {
            seq,
            at,
            reason_code: event.reason_code(),
            event,
        });
        seq
    }

    pub fn rows(&self) -> &[EventJournalRow] {
        &self.rows
    }

    pub fn last_seq(&self) -> u64 {
        self.next_seq.saturating_sub(1)
    }

    /// Rows with `seq > after_seq`, oldest first.
    pub fn since(&self, after_seq: u64) -> &[EventJournalRow] {
        let start = usize::try_from(after_seq)
            .unwrap_or(usize::MAX)
            .min(self.rows.len());
        &self.rows[start..]
    }

    pub fn last_at(&self) -> Option<LedgerTimeSecs> {
        self.rows.last().map(|row| row.at)
    }
}

/// Refuses any row that does not extend `last_seq` by exactly one.
pub(crate) fn check_extends(last_seq: u64, rows: &[EventJournalRow]) -> Result<(), StorageError> {
    let mut expected = last_seq;
    for row in rows {
        expected = expected.saturating_add(1);
        if row.seq != expected {
            return Err(StorageError::AppendOnlyViolation {
                table: EVENT_JOURNAL_TABLE,
                expected_seq: expected,
                found_seq: row.seq,
            });
        }
    }
    Ok(())
}

/// Journal persisted as one JSON row per line. Rows are only ever appended; nothing is
/// rewritten once synced.
#[derive(Debug)]
pub struct JournalFile {
    path: PathBuf,
    last_seq: u64,
}

impl JournalFile {
    /// Opens (or creates) the journal at `path` and validates the rows already on disk.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        if !path.exists() {
            File::create(&path)?;
        }
        let rows = read_rows(&path)?;
        let last_seq = EventJournal::from_rows(rows)?.last_seq();
        Ok(Self { path, last_seq })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    pub fn load(&self) -> Result<Vec<EventJournalRow>, StorageError> {
        read_rows(&self.path)
    }

    pub fn append(&mut self, rows: &[EventJournalRow]) -> Result<(), StorageError> {
        check_extends(self.last_seq, rows)?;
        let Some(last) = rows.last() else {
            return Ok(());
        };
        let mut buf = Vec::new();
        for row in rows {
            serde_json::to_writer(&mut buf, row)?;
            buf.push(b'\n');
        }
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;
        file.write_all(&buf)?;
        file.sync_data()?;
        self.last_seq = last.seq;
        Ok(())
    }
}

fn read_rows(path: &Path) -> Result<Vec<EventJournalRow>, StorageError> {
    let file = File::open(path)?;
    let mut rows = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row = serde_json::from_str(&line)
            .map_err(|source| StorageError::JournalLine {
                line: idx + 1,
                source,
            })?;
        rows.push(row);
    }
    Ok(rows)
}
