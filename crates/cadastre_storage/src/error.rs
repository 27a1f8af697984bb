#![forbid(unsafe_code)]

use cadastre_kernel_contracts::{ContractViolation, SchemaVersion};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("table {table} is append-only: expected seq {expected_seq}, got {found_seq}")]
    AppendOnlyViolation {
        table: &'static str,
        expected_seq: u64,
        found_seq: u64,
    },

    #[error("journal line {line} is not a valid row: {source}")]
    JournalLine {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("table {table} is corrupt: {reason}")]
    CorruptTable {
        table: &'static str,
        reason: &'static str,
    },

    #[error("snapshot schema version {found:?} is not supported (expected {expected:?})")]
    UnsupportedSchemaVersion {
        found: SchemaVersion,
        expected: SchemaVersion,
    },

    #[error("storage io failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("contract violation: {0}")]
    ContractViolation(#[from] ContractViolation),
}
