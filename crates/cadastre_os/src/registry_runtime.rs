#![forbid(unsafe_code)]

//! Single-writer runtime composing access control, throttle, batch lifecycle, the record table
//! and the disclosure protocol behind one `&mut self` surface.
//!
//! Every mutating operation returns exactly one [`RegistryEvent`] or exactly one
//! [`RegistryError`]. Rejections leave every table untouched; accepted events are appended to the
//! journal before they are returned.

use cadastre_engines::access::AccessControl;
use cadastre_engines::batch::BatchLedger;
use cadastre_engines::disclosure::DecryptionProtocol;
use cadastre_engines::registry::ConfidentialRegistry;
use cadastre_engines::throttle::ThrottleGuard;
use cadastre_kernel_contracts::actor::{ActionKind, ActorId, ActorRoles};
use cadastre_kernel_contracts::batch::BatchState;
use cadastre_kernel_contracts::disclosure::{
    Attestation, Cleartexts, DecryptionContext, DisclosureStatus, RegistryInstanceId, RequestId,
};
use cadastre_kernel_contracts::event::RegistryEvent;
use cadastre_kernel_contracts::parcel::{ParcelHandles, RecordId};
use cadastre_kernel_contracts::{LedgerTimeSecs, RegistryError, RegistryResult};
use cadastre_storage::journal::{EventJournal, EventJournalRow, EVENT_JOURNAL_TABLE};
use cadastre_storage::repo::{EventJournalRepo, RegistrySnapshotRepo};
use cadastre_storage::snapshot::{
    ContextRow, RecordRow, RegistrySnapshot, ThrottleRow, SNAPSHOT_SCHEMA_VERSION,
};
use cadastre_storage::StorageError;
use tracing::{debug, info, warn};

use crate::config::RegistryConfig;
use crate::oracle::DecryptionOracle;

pub struct RegistryRuntime<O>
where
    O: DecryptionOracle,
{
    pub(crate) access: AccessControl,
    pub(crate) paused: bool,
    pub(crate) cooldown_secs: u64,
    pub(crate) throttle: ThrottleGuard,
    pub(crate) batch: BatchLedger,
    pub(crate) registry: ConfidentialRegistry,
    pub(crate) protocol: DecryptionProtocol,
    pub(crate) journal: EventJournal,
    pub(crate) oracle: O,
}

impl<O> RegistryRuntime<O>
where
    O: DecryptionOracle,
{
    pub fn new(config: &RegistryConfig, owner: ActorId, oracle: O) -> Self {
        Self {
            access: AccessControl::new(owner),
            paused: false,
            cooldown_secs: config.cooldown_secs,
            throttle: ThrottleGuard::new(),
            batch: BatchLedger::new(),
            registry: ConfidentialRegistry::new(),
            protocol: DecryptionProtocol::new(
                config.registry_instance_id,
                config.pending_ttl_secs,
            ),
            journal: EventJournal::new_in_memory(),
            oracle,
        }
    }

    /// Rebuilds a runtime from current-state tables plus the journal rows they were derived
    /// from. The journal may run ahead of the snapshot (a crash between the two writes) but never
    /// behind it.
    pub fn from_snapshot(
        snapshot: RegistrySnapshot,
        journal_rows: Vec<EventJournalRow>,
        oracle: O,
    ) -> Result<Self, StorageError> {
        snapshot.check_schema()?;
        let journal = EventJournal::from_rows(journal_rows)?;
        if journal.last_seq() < snapshot.last_event_seq {
            return Err(StorageError::CorruptTable {
                table: EVENT_JOURNAL_TABLE,
                reason: "journal ends before the snapshot's last event",
            });
        }
        if journal.last_seq() > snapshot.last_event_seq {
            warn!(
                snapshot_seq = snapshot.last_event_seq,
                journal_seq = journal.last_seq(),
                "journal is ahead of the snapshot; state of the trailing events was not saved"
            );
        }
        Ok(Self {
            access: AccessControl::from_parts(snapshot.owner, snapshot.providers),
            paused: snapshot.paused,
            cooldown_secs: snapshot.cooldown_secs,
            throttle: ThrottleGuard::from_rows(
                snapshot
                    .throttle
                    .into_iter()
                    .map(|row| (row.actor, row.kind, row.at)),
            ),
            batch: BatchLedger::from_state(snapshot.batch),
            registry: ConfidentialRegistry::from_rows(
                snapshot
                    .records
                    .into_iter()
                    .map(|row| (row.record_id, row.handles)),
            ),
            protocol: DecryptionProtocol::from_rows(
                snapshot.registry_instance_id,
                snapshot.pending_ttl_secs,
                snapshot
                    .contexts
                    .into_iter()
                    .map(|row| (row.request_id, row.context)),
            ),
            journal,
            oracle,
        })
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            registry_instance_id: self.protocol.instance_id(),
            owner: self.access.owner(),
            providers: self.access.providers(),
            paused: self.paused,
            cooldown_secs: self.cooldown_secs,
            pending_ttl_secs: self.protocol.pending_ttl_secs(),
            batch: self.batch.state(),
            records: self
                .registry
                .rows()
                .into_iter()
                .map(|(record_id, handles)| RecordRow { record_id, handles })
                .collect(),
            contexts: self
                .protocol
                .rows()
                .into_iter()
                .map(|(request_id, context)| ContextRow {
                    request_id,
                    context,
                })
                .collect(),
            throttle: self
                .throttle
                .rows()
                .into_iter()
                .map(|(actor, kind, at)| ThrottleRow { actor, kind, at })
                .collect(),
            last_event_seq: self.journal.last_seq(),
        }
    }

    /// `Ok(None)` when the snapshot repo is empty.
    pub fn restore(
        snapshots: &dyn RegistrySnapshotRepo,
        journal: &dyn EventJournalRepo,
        oracle: O,
    ) -> Result<Option<Self>, StorageError> {
        let Some(snapshot) = snapshots.load_snapshot()? else {
            return Ok(None);
        };
        let rows = journal.load_event_rows()?;
        Self::from_snapshot(snapshot, rows, oracle).map(Some)
    }

    /// Appends every event the journal repo has not seen yet, then replaces the snapshot.
    pub fn persist(
        &self,
        snapshots: &mut dyn RegistrySnapshotRepo,
        journal: &mut dyn EventJournalRepo,
    ) -> Result<(), StorageError> {
        let pending = self.journal.since(journal.persisted_seq());
        if !pending.is_empty() {
            journal.append_event_rows(pending)?;
        }
        snapshots.save_snapshot(&self.snapshot())
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    pub fn registry_instance_id(&self) -> RegistryInstanceId {
        self.protocol.instance_id()
    }

    pub fn owner(&self) -> ActorId {
        self.access.owner()
    }

    pub fn roles(&self, actor: &ActorId) -> ActorRoles {
        self.access.roles(actor)
    }

    pub fn providers(&self) -> Vec<ActorId> {
        self.access.providers()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn cooldown_secs(&self) -> u64 {
        self.cooldown_secs
    }

    pub fn pending_ttl_secs(&self) -> Option<u64> {
        self.protocol.pending_ttl_secs()
    }

    pub fn cooldown_remaining(&self, actor: &ActorId, kind: ActionKind, now: LedgerTimeSecs) -> u64 {
        self.throttle
            .cooldown_remaining(actor, kind, now, self.cooldown_secs)
    }

    pub fn batch_state(&self) -> BatchState {
        self.batch.state()
    }

    pub fn handles(&self, record_id: RecordId) -> Option<ParcelHandles> {
        self.registry.handles(record_id)
    }

    pub fn record_count(&self) -> usize {
        self.registry.record_count()
    }

    pub fn disclosure_context(&self, request_id: &RequestId) -> Option<DecryptionContext> {
        self.protocol.context(request_id)
    }

    pub fn disclosure_status(&self, request_id: &RequestId, now: LedgerTimeSecs) -> DisclosureStatus {
        self.protocol.status(request_id, now)
    }

    pub fn pending_disclosures(&self) -> usize {
        self.protocol.pending_count()
    }

    pub fn events(&self) -> &[EventJournalRow] {
        self.journal.rows()
    }

    pub fn events_since(&self, after_seq: u64) -> &[EventJournalRow] {
        self.journal.since(after_seq)
    }

    pub fn last_event_seq(&self) -> u64 {
        self.journal.last_seq()
    }

    pub fn last_event_at(&self) -> Option<LedgerTimeSecs> {
        self.journal.last_at()
    }

    /// Stores or overwrites the handle triple of `record_id` in the open batch.
    pub fn submit(
        &mut self,
        caller: &ActorId,
        record_id: RecordId,
        handles: ParcelHandles,
        now: LedgerTimeSecs,
    ) -> RegistryResult<RegistryEvent> {
        let result = self.try_submit(caller, record_id, handles, now);
        self.finish("submit", now, result)
    }

    fn try_submit(
        &mut self,
        caller: &ActorId,
        record_id: RecordId,
        handles: ParcelHandles,
        now: LedgerTimeSecs,
    ) -> RegistryResult<RegistryEvent> {
        self.require_not_paused()?;
        self.access.require_provider(caller)?;
        let batch_id = self.batch.require_open()?;
        let stamp = self
            .throttle
            .check(caller, ActionKind::Submit, now, self.cooldown_secs)?;

        self.throttle.commit(stamp);
        self.registry.overwrite(record_id, handles);
        Ok(RegistryEvent::RecordSubmitted {
            record_id,
            provider: caller.clone(),
            batch_id,
        })
    }

    /// Snapshots the record's handles, dispatches them to the oracle and tracks the returned
    /// request id as pending.
    pub fn request_disclosure(
        &mut self,
        caller: &ActorId,
        record_id: RecordId,
        now: LedgerTimeSecs,
    ) -> RegistryResult<RegistryEvent> {
        let result = self.try_request_disclosure(caller, record_id, now);
        self.finish("request_disclosure", now, result)
    }

    fn try_request_disclosure(
        &mut self,
        caller: &ActorId,
        record_id: RecordId,
        now: LedgerTimeSecs,
    ) -> RegistryResult<RegistryEvent> {
        self.require_not_paused()?;
        self.access.require_provider(caller)?;
        let stamp = self
            .throttle
            .check(caller, ActionKind::DecryptRequest, now, self.cooldown_secs)?;
        let ticket = self
            .protocol
            .prepare(record_id, self.registry.handles(record_id))?;

        let request_id = self
            .oracle
            .dispatch(&ticket.ordered_handles)
            .map_err(|e| RegistryError::OracleDispatch {
                reason: e.to_string(),
            })?;
        debug!(
            request_id = %request_id,
            record_id = record_id.0,
            binding_digest = %ticket.binding_digest,
            "oracle accepted decryption job"
        );

        let batch_id = self.batch.current_id();
        self.protocol
            .record_pending(request_id, &ticket, batch_id, now)?;
        self.throttle.commit(stamp);
        Ok(RegistryEvent::DecryptionRequested {
            request_id,
            record_id,
            batch_id,
        })
    }

    /// Inbound oracle result. The caller is untrusted; every invocation is validated from scratch.
    pub fn on_oracle_callback(
        &mut self,
        request_id: RequestId,
        cleartexts: &Cleartexts,
        attestation: &Attestation,
        now: LedgerTimeSecs,
    ) -> RegistryResult<RegistryEvent> {
        let result = self.try_oracle_callback(request_id, cleartexts, attestation, now);
        self.finish("on_oracle_callback", now, result)
    }

    fn try_oracle_callback(
        &mut self,
        request_id: RequestId,
        cleartexts: &Cleartexts,
        attestation: &Attestation,
        now: LedgerTimeSecs,
    ) -> RegistryResult<RegistryEvent> {
        self.require_not_paused()?;
        debug!(request_id = %request_id, "oracle callback received");

        let registry = &self.registry;
        let oracle = &self.oracle;
        let outcome = self.protocol.process_callback(
            request_id,
            cleartexts,
            attestation,
            now,
            |record_id| {
                debug!(request_id = %request_id, record_id = record_id.0, "replay guard passed");
                registry.handles(record_id)
            },
            |id, payload, proof| {
                debug!(request_id = %id, "binding digest matched; verifying attestation");
                oracle.verify(id, payload, proof)
            },
        )?;

        Ok(RegistryEvent::DecryptionCompleted {
            request_id: outcome.request_id,
            batch_id: outcome.context.batch_id,
            record_id: outcome.context.record_id,
            identity: outcome.plaintext.identity,
            x: outcome.plaintext.x,
            y: outcome.plaintext.y,
        })
    }

    pub(crate) fn require_not_paused(&self) -> RegistryResult<()> {
        if self.paused {
            return Err(RegistryError::PausedState);
        }
        Ok(())
    }

    pub(crate) fn finish(
        &mut self,
        op: &'static str,
        now: LedgerTimeSecs,
        result: RegistryResult<RegistryEvent>,
    ) -> RegistryResult<RegistryEvent> {
        match result {
            Ok(event) => {
                let seq = self.journal.append(now, event.clone());
                info!(
                    op,
                    seq,
                    event = event.name(),
                    reason_code = event.reason_code().0,
                    "registry operation committed"
                );
                Ok(event)
            }
            Err(err) => {
                warn!(
                    op,
                    error = err.name(),
                    reason_code = err.reason_code().0,
                    detail = %err,
                    "registry operation rejected"
                );
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use cadastre_engines::oracle_local::LocalDecryptionOracle;
    use cadastre_kernel_contracts::batch::BatchId;
    use cadastre_kernel_contracts::parcel::{CiphertextHandle, ParcelPlaintext};

    use cadastre_storage::repo::{InMemoryJournalRepo, InMemorySnapshotRepo};

    use super::*;
    use crate::oracle::OracleError;

    #[derive(Debug, Default)]
    struct DeterministicOracle {
        next: u8,
        dispatched: Vec<(RequestId, Vec<CiphertextHandle>)>,
        offline: bool,
        reuse_id: Option<RequestId>,
    }

    impl DecryptionOracle for DeterministicOracle {
        fn dispatch(
            &mut self,
            ordered_handles: &[CiphertextHandle],
        ) -> Result<RequestId, OracleError> {
            if self.offline {
                return Err(OracleError::Unavailable("gateway offline".to_string()));
            }
            let id = match self.reuse_id {
                Some(id) => id,
                None => {
                    self.next = self.next.wrapping_add(1);
                    RequestId::from_bytes([self.next; 32])
                }
            };
            self.dispatched.push((id, ordered_handles.to_vec()));
            Ok(id)
        }

        fn verify(
            &self,
            request_id: &RequestId,
            cleartexts: &Cleartexts,
            attestation: &Attestation,
        ) -> bool {
            attestation == &attest(request_id, cleartexts)
        }
    }

    fn attest(request_id: &RequestId, cleartexts: &Cleartexts) -> Attestation {
        let mut proof = request_id.as_bytes().to_vec();
        proof.extend_from_slice(cleartexts.as_bytes());
        Attestation::from_bytes(proof)
    }

    fn owner() -> ActorId {
        ActorId::new("owner").unwrap()
    }

    fn p() -> ActorId {
        ActorId::new("provider_p").unwrap()
    }

    fn q() -> ActorId {
        ActorId::new("provider_q").unwrap()
    }

    fn h(b: u8) -> CiphertextHandle {
        CiphertextHandle::from_bytes([b; 32])
    }

    fn triple(a: u8, b: u8, c: u8) -> ParcelHandles {
        ParcelHandles::new(h(a), h(b), h(c))
    }

    fn plain() -> ParcelPlaintext {
        ParcelPlaintext {
            identity: 4_401,
            x: 52_370_114,
            y: 4_890_221,
        }
    }

    fn config(ttl: Option<u64>) -> RegistryConfig {
        let mut config = RegistryConfig::mvp_v1(RegistryInstanceId::from_bytes([0x5A; 32]));
        config.pending_ttl_secs = ttl;
        config
    }

    fn open_runtime_with(ttl: Option<u64>) -> RegistryRuntime<DeterministicOracle> {
        let mut rt = RegistryRuntime::new(&config(ttl), owner(), DeterministicOracle::default());
        rt.add_provider(&owner(), p(), LedgerTimeSecs(1)).unwrap();
        rt.add_provider(&owner(), q(), LedgerTimeSecs(1)).unwrap();
        rt.open_batch(&owner(), LedgerTimeSecs(1)).unwrap();
        rt
    }

    fn open_runtime() -> RegistryRuntime<DeterministicOracle> {
        open_runtime_with(None)
    }

    fn requested(event: RegistryEvent) -> RequestId {
        match event {
            RegistryEvent::DecryptionRequested { request_id, .. } => request_id,
            other => panic!("expected DecryptionRequested, got {other:?}"),
        }
    }

    #[test]
    fn at_runtime_01_resubmission_is_last_write_wins() {
        let mut rt = open_runtime();
        rt.submit(&p(), RecordId(7), triple(1, 2, 3), LedgerTimeSecs(100))
            .unwrap();
        let ev = rt
            .submit(&q(), RecordId(7), triple(9, 2, 3), LedgerTimeSecs(100))
            .unwrap();
        assert_eq!(
            ev,
            RegistryEvent::RecordSubmitted {
                record_id: RecordId(7),
                provider: q(),
                batch_id: BatchId(2),
            }
        );
        assert_eq!(rt.handles(RecordId(7)), Some(triple(9, 2, 3)));
        assert_eq!(rt.record_count(), 1);
    }

    #[test]
    fn at_runtime_02_valid_callback_finalizes_exactly_once() {
        let mut rt = open_runtime();
        rt.submit(&p(), RecordId(7), triple(1, 2, 3), LedgerTimeSecs(100))
            .unwrap();
        let rid = requested(
            rt.request_disclosure(&p(), RecordId(7), LedgerTimeSecs(101))
                .unwrap(),
        );
        assert_eq!(rt.oracle().dispatched, vec![(rid, vec![h(1), h(2), h(3)])]);
        assert_eq!(
            rt.disclosure_status(&rid, LedgerTimeSecs(102)),
            DisclosureStatus::Pending
        );

        let payload = Cleartexts::encode(&plain());
        let proof = attest(&rid, &payload);
        assert_eq!(
            rt.on_oracle_callback(rid, &payload, &proof, LedgerTimeSecs(102)),
            Ok(RegistryEvent::DecryptionCompleted {
                request_id: rid,
                batch_id: BatchId(2),
                record_id: RecordId(7),
                identity: 4_401,
                x: 52_370_114,
                y: 4_890_221,
            })
        );
        assert_eq!(
            rt.on_oracle_callback(rid, &payload, &proof, LedgerTimeSecs(103)),
            Err(RegistryError::ReplayAttempt { request_id: rid })
        );
        assert_eq!(
            rt.disclosure_status(&rid, LedgerTimeSecs(103)),
            DisclosureStatus::Finalized
        );
        assert_eq!(rt.pending_disclosures(), 0);
    }

    #[test]
    fn at_runtime_03_resubmission_between_request_and_callback_is_state_mismatch() {
        let mut rt = open_runtime();
        rt.submit(&p(), RecordId(7), triple(1, 2, 3), LedgerTimeSecs(100))
            .unwrap();
        let r1 = requested(
            rt.request_disclosure(&p(), RecordId(7), LedgerTimeSecs(101))
                .unwrap(),
        );
        rt.submit(&q(), RecordId(7), triple(11, 2, 3), LedgerTimeSecs(102))
            .unwrap();

        let payload = Cleartexts::encode(&plain());
        assert_eq!(
            rt.on_oracle_callback(r1, &payload, &attest(&r1, &payload), LedgerTimeSecs(103)),
            Err(RegistryError::StateMismatch {
                request_id: r1,
                record_id: RecordId(7),
            })
        );
        assert_eq!(
            rt.disclosure_status(&r1, LedgerTimeSecs(103)),
            DisclosureStatus::Pending
        );
        assert!(!rt.disclosure_context(&r1).unwrap().processed);
    }

    #[test]
    fn at_runtime_04_any_single_handle_change_is_detected() {
        for changed in [triple(9, 2, 3), triple(1, 9, 3), triple(1, 2, 9)] {
            let mut rt = open_runtime();
            rt.submit(&p(), RecordId(7), triple(1, 2, 3), LedgerTimeSecs(100))
                .unwrap();
            let rid = requested(
                rt.request_disclosure(&p(), RecordId(7), LedgerTimeSecs(100))
                    .unwrap(),
            );
            rt.submit(&q(), RecordId(7), changed, LedgerTimeSecs(100))
                .unwrap();
            let payload = Cleartexts::encode(&plain());
            assert!(matches!(
                rt.on_oracle_callback(rid, &payload, &attest(&rid, &payload), LedgerTimeSecs(101)),
                Err(RegistryError::StateMismatch { .. })
            ));
        }
    }

    #[test]
    fn at_runtime_05_checks_run_replay_then_integrity_then_attestation() {
        let mut rt = open_runtime();
        rt.submit(&p(), RecordId(7), triple(1, 2, 3), LedgerTimeSecs(100))
            .unwrap();
        let rid = requested(
            rt.request_disclosure(&p(), RecordId(7), LedgerTimeSecs(100))
                .unwrap(),
        );
        let payload = Cleartexts::encode(&plain());
        let forged = Attestation::from_bytes(vec![0xEE; 8]);

        assert_eq!(
            rt.on_oracle_callback(rid, &payload, &forged, LedgerTimeSecs(101)),
            Err(RegistryError::InvalidAttestation { request_id: rid })
        );
        rt.submit(&q(), RecordId(7), triple(4, 5, 6), LedgerTimeSecs(101))
            .unwrap();
        assert!(matches!(
            rt.on_oracle_callback(rid, &payload, &forged, LedgerTimeSecs(102)),
            Err(RegistryError::StateMismatch { .. })
        ));

        let unknown = RequestId::from_bytes([0xAB; 32]);
        assert_eq!(
            rt.on_oracle_callback(unknown, &payload, &forged, LedgerTimeSecs(102)),
            Err(RegistryError::ReplayAttempt { request_id: unknown })
        );
    }

    #[test]
    fn at_runtime_06_rejected_attestation_leaves_request_finalizable() {
        let mut rt = open_runtime();
        rt.submit(&p(), RecordId(3), triple(1, 2, 3), LedgerTimeSecs(100))
            .unwrap();
        let rid = requested(
            rt.request_disclosure(&p(), RecordId(3), LedgerTimeSecs(100))
                .unwrap(),
        );
        let payload = Cleartexts::encode(&plain());
        let other = Cleartexts::encode(&ParcelPlaintext { identity: 1, x: 1, y: 1 });
        assert!(rt
            .on_oracle_callback(rid, &payload, &attest(&rid, &other), LedgerTimeSecs(101))
            .is_err());
        assert!(rt
            .on_oracle_callback(rid, &payload, &attest(&rid, &payload), LedgerTimeSecs(102))
            .is_ok());
    }

    #[test]
    fn at_runtime_07_malformed_cleartexts_fail_as_invalid_attestation() {
        let mut rt = open_runtime();
        rt.submit(&p(), RecordId(3), triple(1, 2, 3), LedgerTimeSecs(100))
            .unwrap();
        let rid = requested(
            rt.request_disclosure(&p(), RecordId(3), LedgerTimeSecs(100))
                .unwrap(),
        );
        let short = Cleartexts::from_bytes(vec![1u8; 40]);
        assert_eq!(
            rt.on_oracle_callback(rid, &short, &attest(&rid, &short), LedgerTimeSecs(101)),
            Err(RegistryError::InvalidAttestation { request_id: rid })
        );
        assert_eq!(
            rt.disclosure_status(&rid, LedgerTimeSecs(101)),
            DisclosureStatus::Pending
        );
    }

    #[test]
    fn at_runtime_08_submit_gates_on_batch_and_cooldown() {
        let mut rt = RegistryRuntime::new(&config(None), owner(), DeterministicOracle::default());
        rt.add_provider(&owner(), p(), LedgerTimeSecs(1)).unwrap();
        assert_eq!(
            rt.submit(&p(), RecordId(1), triple(1, 2, 3), LedgerTimeSecs(100)),
            Err(RegistryError::BatchNotOpen)
        );
        // The batch rejection must not have consumed the cooldown window.
        rt.open_batch(&owner(), LedgerTimeSecs(100)).unwrap();
        rt.submit(&p(), RecordId(1), triple(1, 2, 3), LedgerTimeSecs(100))
            .unwrap();
        assert_eq!(
            rt.submit(&p(), RecordId(2), triple(1, 2, 3), LedgerTimeSecs(159)),
            Err(RegistryError::CooldownActive {
                actor: p(),
                kind: ActionKind::Submit,
                remaining_secs: 1,
            })
        );
        assert!(rt
            .submit(&p(), RecordId(2), triple(1, 2, 3), LedgerTimeSecs(160))
            .is_ok());
        assert!(matches!(
            rt.submit(&owner(), RecordId(3), triple(1, 2, 3), LedgerTimeSecs(500)),
            Err(RegistryError::NotAuthorized { required: "provider", .. })
        ));
    }

    #[test]
    fn at_runtime_09_cooldown_change_applies_to_later_checks() {
        let mut rt = open_runtime();
        rt.submit(&p(), RecordId(1), triple(1, 2, 3), LedgerTimeSecs(100))
            .unwrap();
        rt.set_cooldown(&owner(), 10, LedgerTimeSecs(101)).unwrap();
        assert_eq!(
            rt.cooldown_remaining(&p(), ActionKind::Submit, LedgerTimeSecs(105)),
            5
        );
        assert!(rt
            .submit(&p(), RecordId(1), triple(4, 5, 6), LedgerTimeSecs(110))
            .is_ok());
    }

    #[test]
    fn at_runtime_10_submit_and_request_cooldowns_are_independent() {
        let mut rt = open_runtime();
        rt.submit(&p(), RecordId(1), triple(1, 2, 3), LedgerTimeSecs(100))
            .unwrap();
        assert!(rt
            .request_disclosure(&p(), RecordId(1), LedgerTimeSecs(100))
            .is_ok());
        assert!(matches!(
            rt.request_disclosure(&p(), RecordId(1), LedgerTimeSecs(120)),
            Err(RegistryError::CooldownActive {
                kind: ActionKind::DecryptRequest,
                ..
            })
        ));
        assert!(rt
            .request_disclosure(&q(), RecordId(1), LedgerTimeSecs(120))
            .is_ok());
    }

    #[test]
    fn at_runtime_11_failed_dispatch_commits_nothing() {
        let mut rt = open_runtime();
        rt.submit(&p(), RecordId(1), triple(1, 2, 3), LedgerTimeSecs(100))
            .unwrap();
        rt.oracle_mut().offline = true;
        let events_before = rt.events().len();
        assert!(matches!(
            rt.request_disclosure(&p(), RecordId(1), LedgerTimeSecs(100)),
            Err(RegistryError::OracleDispatch { .. })
        ));
        assert_eq!(rt.events().len(), events_before);
        assert_eq!(rt.pending_disclosures(), 0);

        rt.oracle_mut().offline = false;
        assert!(rt
            .request_disclosure(&p(), RecordId(1), LedgerTimeSecs(100))
            .is_ok());
    }

    #[test]
    fn at_runtime_12_reused_oracle_request_id_is_refused() {
        let mut rt = open_runtime();
        rt.submit(&p(), RecordId(1), triple(1, 2, 3), LedgerTimeSecs(100))
            .unwrap();
        let rid = requested(
            rt.request_disclosure(&p(), RecordId(1), LedgerTimeSecs(100))
                .unwrap(),
        );
        rt.oracle_mut().reuse_id = Some(rid);
        assert_eq!(
            rt.request_disclosure(&q(), RecordId(1), LedgerTimeSecs(100)),
            Err(RegistryError::ReplayAttempt { request_id: rid })
        );
        // Throttle was not stamped for the refused request.
        rt.oracle_mut().reuse_id = None;
        assert!(rt
            .request_disclosure(&q(), RecordId(1), LedgerTimeSecs(100))
            .is_ok());
    }

    #[test]
    fn at_runtime_13_unknown_record_is_not_dispatched() {
        let mut rt = open_runtime();
        assert_eq!(
            rt.request_disclosure(&p(), RecordId(404), LedgerTimeSecs(100)),
            Err(RegistryError::UnknownRecord {
                record_id: RecordId(404)
            })
        );
        assert!(rt.oracle().dispatched.is_empty());
    }

    #[test]
    fn at_runtime_14_pause_blocks_submit_request_and_callback() {
        let mut rt = open_runtime();
        rt.submit(&p(), RecordId(1), triple(1, 2, 3), LedgerTimeSecs(100))
            .unwrap();
        let rid = requested(
            rt.request_disclosure(&p(), RecordId(1), LedgerTimeSecs(100))
                .unwrap(),
        );
        rt.pause(&owner(), LedgerTimeSecs(101)).unwrap();

        let payload = Cleartexts::encode(&plain());
        assert_eq!(
            rt.submit(&p(), RecordId(2), triple(1, 2, 3), LedgerTimeSecs(500)),
            Err(RegistryError::PausedState)
        );
        assert_eq!(
            rt.request_disclosure(&q(), RecordId(1), LedgerTimeSecs(500)),
            Err(RegistryError::PausedState)
        );
        assert_eq!(
            rt.on_oracle_callback(rid, &payload, &attest(&rid, &payload), LedgerTimeSecs(500)),
            Err(RegistryError::PausedState)
        );

        rt.unpause(&owner(), LedgerTimeSecs(501)).unwrap();
        assert!(rt
            .on_oracle_callback(rid, &payload, &attest(&rid, &payload), LedgerTimeSecs(502))
            .is_ok());
    }

    #[test]
    fn at_runtime_15_expired_request_can_never_finalize() {
        let mut rt = open_runtime_with(Some(30));
        rt.submit(&p(), RecordId(1), triple(1, 2, 3), LedgerTimeSecs(100))
            .unwrap();
        let rid = requested(
            rt.request_disclosure(&p(), RecordId(1), LedgerTimeSecs(100))
                .unwrap(),
        );
        assert_eq!(
            rt.disclosure_status(&rid, LedgerTimeSecs(130)),
            DisclosureStatus::Pending
        );
        let payload = Cleartexts::encode(&plain());
        assert_eq!(
            rt.on_oracle_callback(rid, &payload, &attest(&rid, &payload), LedgerTimeSecs(131)),
            Err(RegistryError::RequestExpired { request_id: rid })
        );
        assert_eq!(
            rt.disclosure_status(&rid, LedgerTimeSecs(131)),
            DisclosureStatus::Expired
        );
    }

    #[test]
    fn at_runtime_16_concurrent_requests_are_tracked_independently() {
        let mut rt = open_runtime();
        rt.submit(&p(), RecordId(1), triple(1, 2, 3), LedgerTimeSecs(100))
            .unwrap();
        rt.submit(&q(), RecordId(2), triple(4, 5, 6), LedgerTimeSecs(100))
            .unwrap();
        let r1 = requested(
            rt.request_disclosure(&p(), RecordId(1), LedgerTimeSecs(100))
                .unwrap(),
        );
        let r2 = requested(
            rt.request_disclosure(&q(), RecordId(2), LedgerTimeSecs(100))
                .unwrap(),
        );
        assert_ne!(r1, r2);
        assert_eq!(rt.pending_disclosures(), 2);

        let payload = Cleartexts::encode(&plain());
        rt.on_oracle_callback(r2, &payload, &attest(&r2, &payload), LedgerTimeSecs(101))
            .unwrap();
        assert_eq!(
            rt.disclosure_status(&r1, LedgerTimeSecs(101)),
            DisclosureStatus::Pending
        );
        assert_eq!(rt.disclosure_context(&r1).unwrap().record_id, RecordId(1));
    }

    #[test]
    fn at_runtime_17_journal_records_only_committed_events() {
        let mut rt = open_runtime();
        let after_setup = rt.last_event_seq();
        assert_eq!(after_setup, 3);
        assert!(rt
            .submit(&owner(), RecordId(1), triple(1, 2, 3), LedgerTimeSecs(100))
            .is_err());
        rt.submit(&p(), RecordId(1), triple(1, 2, 3), LedgerTimeSecs(100))
            .unwrap();
        let newer = rt.events_since(after_setup);
        assert_eq!(newer.len(), 1);
        assert_eq!(newer[0].seq, 4);
        assert_eq!(newer[0].at, LedgerTimeSecs(100));
        assert_eq!(newer[0].event.name(), "RECORD_SUBMITTED");
    }

    #[test]
    fn at_runtime_18_snapshot_restore_keeps_pending_requests_finalizable() {
        let mut rt = open_runtime();
        rt.submit(&p(), RecordId(7), triple(1, 2, 3), LedgerTimeSecs(100))
            .unwrap();
        let rid = requested(
            rt.request_disclosure(&p(), RecordId(7), LedgerTimeSecs(100))
                .unwrap(),
        );
        let mut snapshots = InMemorySnapshotRepo::new();
        let mut journal = InMemoryJournalRepo::new();
        rt.persist(&mut snapshots, &mut journal).unwrap();
        rt.persist(&mut snapshots, &mut journal).unwrap();
        assert_eq!(journal.persisted_seq(), rt.last_event_seq());
        assert_eq!(snapshots.save_count(), 2);

        let mut restored =
            RegistryRuntime::restore(&snapshots, &journal, DeterministicOracle::default())
                .unwrap()
                .unwrap();
        assert_eq!(restored.snapshot(), rt.snapshot());
        assert_eq!(restored.events(), rt.events());
        assert!(matches!(
            restored.submit(&p(), RecordId(7), triple(1, 2, 3), LedgerTimeSecs(120)),
            Err(RegistryError::CooldownActive { .. })
        ));
        let payload = Cleartexts::encode(&plain());
        assert!(restored
            .on_oracle_callback(rid, &payload, &attest(&rid, &payload), LedgerTimeSecs(121))
            .is_ok());
        assert_eq!(restored.last_event_seq(), rt.last_event_seq() + 1);
    }

    #[test]
    fn at_runtime_19_local_oracle_end_to_end_disclosure() {
        let mut rt = RegistryRuntime::new(&config(None), owner(), LocalDecryptionOracle::new_random());
        rt.add_provider(&owner(), p(), LedgerTimeSecs(1)).unwrap();
        rt.open_batch(&owner(), LedgerTimeSecs(1)).unwrap();

        let handles = {
            let oracle = rt.oracle_mut();
            ParcelHandles::new(
                oracle.encrypt_u64(plain().identity).unwrap(),
                oracle.encrypt_u64(plain().x).unwrap(),
                oracle.encrypt_u64(plain().y).unwrap(),
            )
        };
        rt.submit(&p(), RecordId(7), handles, LedgerTimeSecs(100))
            .unwrap();
        let rid = requested(
            rt.request_disclosure(&p(), RecordId(7), LedgerTimeSecs(100))
                .unwrap(),
        );
        let (payload, proof) = rt.oracle().fulfill(&rid).unwrap();
        assert_eq!(
            rt.on_oracle_callback(rid, &payload, &proof, LedgerTimeSecs(101)),
            Ok(RegistryEvent::DecryptionCompleted {
                request_id: rid,
                batch_id: BatchId(2),
                record_id: RecordId(7),
                identity: plain().identity,
                x: plain().x,
                y: plain().y,
            })
        );
    }

    #[test]
    fn at_runtime_20_restore_rejects_journal_behind_snapshot() {
        let rt = open_runtime();
        let snapshot = rt.snapshot();
        let short = rt.events()[..1].to_vec();
        assert!(matches!(
            RegistryRuntime::from_snapshot(snapshot.clone(), short, DeterministicOracle::default()),
            Err(StorageError::CorruptTable { .. })
        ));

        let empty = InMemorySnapshotRepo::new();
        assert!(
            RegistryRuntime::restore(&empty, &InMemoryJournalRepo::new(), DeterministicOracle::default())
                .unwrap()
                .is_none()
        );
        let restored = RegistryRuntime::from_snapshot(
            snapshot,
            rt.events().to_vec(),
            DeterministicOracle::default(),
        )
        .unwrap();
        assert_eq!(restored.last_event_at(), Some(LedgerTimeSecs(1)));
    }
}
