#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use cadastre_kernel_contracts::parcel::{ParcelHandles, RecordId};

/// Record id -> ciphertext handle triple. Last write wins; no history is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfidentialRegistry {
    records: BTreeMap<RecordId, ParcelHandles>,
}

impl ConfidentialRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: impl IntoIterator<Item = (RecordId, ParcelHandles)>) -> Self {
        Self {
            records: rows.into_iter().collect(),
        }
    }

    pub fn rows(&self) -> Vec<(RecordId, ParcelHandles)> {
        self.records.iter().map(|(id, h)| (*id, *h)).collect()
    }

    pub fn handles(&self, record_id: RecordId) -> Option<ParcelHandles> {
        self.records.get(&record_id).copied()
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn overwrite(&mut self, record_id: RecordId, handles: ParcelHandles) {
        self.records.insert(record_id, handles);
    }
}
