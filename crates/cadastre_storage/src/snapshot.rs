#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};

use cadastre_kernel_contracts::actor::{ActionKind, ActorId};
use cadastre_kernel_contracts::batch::BatchState;
use cadastre_kernel_contracts::disclosure::{DecryptionContext, RegistryInstanceId, RequestId};
use cadastre_kernel_contracts::parcel::{ParcelHandles, RecordId};
use cadastre_kernel_contracts::{LedgerTimeSecs, SchemaVersion};
use serde::{Deserialize, Serialize};

use crate::StorageError;

pub const SNAPSHOT_SCHEMA_VERSION: SchemaVersion = SchemaVersion(1);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRow {
    pub record_id: RecordId,
    pub handles: ParcelHandles,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextRow {
    pub request_id: RequestId,
    pub context: DecryptionContext,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleRow {
    pub actor: ActorId,
    pub kind: ActionKind,
    pub at: LedgerTimeSecs,
}

/// Current-state tables of one registry instance. Events live in the journal; the snapshot only
/// records the last journal seq it reflects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub schema_version: SchemaVersion,
    pub registry_instance_id: RegistryInstanceId,
    pub owner: ActorId,
    pub providers: Vec<ActorId>,
    pub paused: bool,
    pub cooldown_secs: u64,
    pub pending_ttl_secs: Option<u64>,
    pub batch: BatchState,
    pub records: Vec<RecordRow>,
    pub contexts: Vec<ContextRow>,
    pub throttle: Vec<ThrottleRow>,
    pub last_event_seq: u64,
}

impl RegistrySnapshot {
    pub fn check_schema(&self) -> Result<(), StorageError> {
        if self.schema_version != SNAPSHOT_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedSchemaVersion {
                found: self.schema_version,
                expected: SNAPSHOT_SCHEMA_VERSION,
            });
        }
        Ok(())
    }
}

/// JSON snapshot on local disk, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when no snapshot has been written yet.
    pub fn load(&self) -> Result<Option<RegistrySnapshot>, StorageError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read(&self.path)?;
        let snapshot: RegistrySnapshot = serde_json::from_slice(&raw)?;
        snapshot.check_schema()?;
        Ok(Some(snapshot))
    }

    pub fn save(&self, snapshot: &RegistrySnapshot) -> Result<(), StorageError> {
        snapshot.check_schema()?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        atomic_write(&self.path, &bytes)
    }
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<(), StorageError> {
    let mut tmp = path.to_path_buf();
    tmp.set_extension("tmp");
    fs::write(&tmp, data)?;
    fs::rename(tmp, path)?;
    Ok(())
}
