#![forbid(unsafe_code)]

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use cadastre_kernel_contracts::actor::ActorId;
use cadastre_kernel_contracts::batch::BatchId;
use cadastre_kernel_contracts::event::{reason_codes, RegistryEvent};
use cadastre_kernel_contracts::parcel::RecordId;
use cadastre_kernel_contracts::LedgerTimeSecs;
use cadastre_storage::journal::{EventJournal, JournalFile};
use cadastre_storage::repo::{EventJournalRepo, InMemoryJournalRepo};
use cadastre_storage::StorageError;

fn temp_base(name: &str) -> PathBuf {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(1);
    std::env::temp_dir().join(format!("cadastre-journal-test-{name}-{suffix}"))
}

fn provider() -> ActorId {
    ActorId::new("dbw_journal_provider_1").unwrap()
}

fn journal_with_batch_and_submission() -> EventJournal {
    let mut j = EventJournal::new_in_memory();
    j.append(
        LedgerTimeSecs(10),
        RegistryEvent::BatchOpened {
            batch_id: BatchId(2),
        },
    );
    j.append(
        LedgerTimeSecs(11),
        RegistryEvent::RecordSubmitted {
            record_id: RecordId(7),
            provider: provider(),
            batch_id: BatchId(2),
        },
    );
    j
}

#[test]
fn at_journal_db_01_sequence_ids_start_at_one_and_carry_reason_codes() {
    let j = journal_with_batch_and_submission();
    let rows = j.rows();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].seq, 1);
    assert_eq!(rows[1].seq, 2);
    assert_eq!(rows[0].reason_code, reason_codes::CADASTRE_OK_BATCH_OPENED);
    assert_eq!(rows[1].reason_code, reason_codes::CADASTRE_OK_RECORD_SUBMITTED);
    assert_eq!(rows[1].at, LedgerTimeSecs(11));
    assert_eq!(j.last_at(), Some(LedgerTimeSecs(11)));
}

#[test]
fn at_journal_db_02_repo_refuses_rewritten_or_skipped_seqs() {
    let j = journal_with_batch_and_submission();
    let mut repo = InMemoryJournalRepo::new();
    repo.append_event_rows(j.rows()).unwrap();
    assert_eq!(repo.persisted_seq(), 2);

    let err = repo.append_event_rows(&j.rows()[..1]).unwrap_err();
    assert!(matches!(
        err,
        StorageError::AppendOnlyViolation {
            table: "event_journal",
            expected_seq: 3,
            found_seq: 1,
        }
    ));
    assert_eq!(repo.load_event_rows().unwrap().len(), 2);
}

#[test]
fn at_journal_db_03_since_returns_only_newer_rows() {
    let j = journal_with_batch_and_submission();
    let newer = j.since(1);
    assert_eq!(newer.len(), 1);
    assert_eq!(newer[0].event.name(), "RECORD_SUBMITTED");
    assert!(j.since(2).is_empty());
}

#[test]
fn at_journal_db_04_rebuild_from_rows_continues_sequence() {
    let j = journal_with_batch_and_submission();
    let mut rebuilt = EventJournal::from_rows(j.rows().to_vec()).unwrap();
    let seq = rebuilt.append(
        LedgerTimeSecs(12),
        RegistryEvent::BatchClosed {
            batch_id: BatchId(2),
        },
    );
    assert_eq!(seq, 3);
    assert_eq!(rebuilt.last_seq(), 3);
}

#[test]
fn at_journal_db_05_rebuild_rejects_mismatched_reason_code() {
    let j = journal_with_batch_and_submission();
    let mut rows = j.rows().to_vec();
    rows[0].reason_code = reason_codes::CADASTRE_OK_PAUSED;
    assert!(matches!(
        EventJournal::from_rows(rows),
        Err(StorageError::CorruptTable { .. })
    ));
}

#[test]
fn at_journal_db_06_rows_serialize_with_tagged_event_names() {
    let j = journal_with_batch_and_submission();
    let json = serde_json::to_value(&j.rows()[1]).unwrap();
    assert_eq!(json["event"]["event"], "RECORD_SUBMITTED");
    assert_eq!(json["event"]["provider"], "dbw_journal_provider_1");
    assert_eq!(json["seq"], 2);
}

#[test]
fn at_journal_db_07_file_appends_one_line_per_row_and_reopens() {
    let base = temp_base("append");
    let path = base.join("nested").join("registry.events.jsonl");
    let j = journal_with_batch_and_submission();

    let mut file = JournalFile::open(&path).unwrap();
    assert_eq!(file.persisted_seq(), 0);
    file.append_event_rows(&j.rows()[..1]).unwrap();
    file.append_event_rows(&j.rows()[1..]).unwrap();
    file.append_event_rows(&[]).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 2);

    let reopened = JournalFile::open(&path).unwrap();
    assert_eq!(reopened.persisted_seq(), 2);
    assert_eq!(reopened.load_event_rows().unwrap(), j.rows().to_vec());
    fs::remove_dir_all(base).unwrap();
}

#[test]
fn at_journal_db_08_file_with_garbage_line_fails_to_open() {
    let base = temp_base("garbage");
    fs::create_dir_all(&base).unwrap();
    let path = base.join("registry.events.jsonl");
    let j = journal_with_batch_and_submission();
    let mut body = serde_json::to_string(&j.rows()[0]).unwrap();
    body.push_str("\n{not json\n");
    fs::write(&path, body).unwrap();

    assert!(matches!(
        JournalFile::open(&path),
        Err(StorageError::JournalLine { line: 2, .. })
    ));
    fs::remove_dir_all(base).unwrap();
}
