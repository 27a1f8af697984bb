#![forbid(unsafe_code)]

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use cadastre_kernel_contracts::actor::{ActionKind, ActorId};
use cadastre_kernel_contracts::batch::{BatchId, BatchState};
use cadastre_kernel_contracts::disclosure::{
    BindingDigest, DecryptionContext, RegistryInstanceId, RequestId,
};
use cadastre_kernel_contracts::parcel::{CiphertextHandle, ParcelHandles, RecordId};
use cadastre_kernel_contracts::{LedgerTimeSecs, SchemaVersion};
use cadastre_storage::repo::{InMemorySnapshotRepo, RegistrySnapshotRepo};
use cadastre_storage::snapshot::{
    ContextRow, RecordRow, RegistrySnapshot, SnapshotFile, ThrottleRow, SNAPSHOT_SCHEMA_VERSION,
};
use cadastre_storage::StorageError;

fn temp_base(name: &str) -> PathBuf {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(1);
    std::env::temp_dir().join(format!("cadastre-snapshot-test-{name}-{suffix}"))
}

fn actor(id: &str) -> ActorId {
    ActorId::new(id).unwrap()
}

fn sample_snapshot() -> RegistrySnapshot {
    RegistrySnapshot {
        schema_version: SNAPSHOT_SCHEMA_VERSION,
        registry_instance_id: RegistryInstanceId::from_bytes([0x42; 32]),
        owner: actor("dbw_owner"),
        providers: vec![actor("dbw_provider_a"), actor("dbw_provider_b")],
        paused: false,
        cooldown_secs: 60,
        pending_ttl_secs: Some(3_600),
        batch: BatchState {
            id: BatchId(2),
            open: true,
        },
        records: vec![RecordRow {
            record_id: RecordId(7),
            handles: ParcelHandles::new(
                CiphertextHandle::from_bytes([1; 32]),
                CiphertextHandle::from_bytes([2; 32]),
                CiphertextHandle::from_bytes([3; 32]),
            ),
        }],
        contexts: vec![ContextRow {
            request_id: RequestId::from_bytes([9; 32]),
            context: DecryptionContext::pending_v1(
                RecordId(7),
                BatchId(2),
                BindingDigest::from_bytes([8; 32]),
                LedgerTimeSecs(6),
            ),
        }],
        throttle: vec![ThrottleRow {
            actor: actor("dbw_provider_a"),
            kind: ActionKind::Submit,
            at: LedgerTimeSecs(5),
        }],
        last_event_seq: 4,
    }
}

#[test]
fn at_snapshot_db_01_missing_file_loads_as_none() {
    let base = temp_base("missing");
    let file = SnapshotFile::new(base.join("registry.json"));
    assert!(file.load().unwrap().is_none());
}

#[test]
fn at_snapshot_db_02_save_then_load_restores_every_table() {
    let base = temp_base("restore");
    let mut file = SnapshotFile::new(base.join("nested").join("registry.json"));
    let snapshot = sample_snapshot();
    file.save_snapshot(&snapshot).unwrap();

    let loaded = file.load_snapshot().unwrap().unwrap();
    assert_eq!(loaded, snapshot);
    assert!(!file.path().with_extension("tmp").exists());
    fs::remove_dir_all(base).unwrap();
}

#[test]
fn at_snapshot_db_03_unknown_schema_version_fails_closed() {
    let base = temp_base("schema");
    fs::create_dir_all(&base).unwrap();
    let path = base.join("registry.json");
    let mut snapshot = sample_snapshot();
    snapshot.schema_version = SchemaVersion(99);
    fs::write(&path, serde_json::to_vec(&snapshot).unwrap()).unwrap();

    let err = SnapshotFile::new(&path).load().unwrap_err();
    assert!(matches!(
        err,
        StorageError::UnsupportedSchemaVersion {
            found: SchemaVersion(99),
            ..
        }
    ));
    fs::remove_dir_all(base).unwrap();
}

#[test]
fn at_snapshot_db_04_malformed_handle_hex_is_rejected() {
    let base = temp_base("hex");
    fs::create_dir_all(&base).unwrap();
    let path = base.join("registry.json");
    let mut value = serde_json::to_value(sample_snapshot()).unwrap();
    value["records"][0]["handles"]["x"] = serde_json::Value::String("zz".to_string());
    fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();

    assert!(matches!(
        SnapshotFile::new(&path).load(),
        Err(StorageError::Json(_))
    ));
    fs::remove_dir_all(base).unwrap();
}

#[test]
fn at_snapshot_db_05_in_memory_repo_keeps_latest() {
    let mut repo = InMemorySnapshotRepo::new();
    assert!(repo.load_snapshot().unwrap().is_none());
    let mut snapshot = sample_snapshot();
    repo.save_snapshot(&snapshot).unwrap();
    snapshot.paused = true;
    repo.save_snapshot(&snapshot).unwrap();
    assert_eq!(repo.save_count(), 2);
    assert!(repo.load_snapshot().unwrap().unwrap().paused);
}
