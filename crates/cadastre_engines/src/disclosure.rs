#![forbid(unsafe_code)]

//! Decrypt-request / oracle-callback state machine.
//!
//! Per request id the only transitions are `None -> Pending -> Finalized`. A callback is
//! checked in a fixed order: replay guard, state integrity, attestation, then finalize.
//! Nothing is written until every check has passed.

use std::collections::BTreeMap;

use cadastre_kernel_contracts::batch::BatchId;
use cadastre_kernel_contracts::disclosure::{
    Attestation, BindingDigest, Cleartexts, DecryptionContext, DisclosureStatus,
    RegistryInstanceId, RequestId,
};
use cadastre_kernel_contracts::parcel::{CiphertextHandle, ParcelHandles, ParcelPlaintext, RecordId};
use cadastre_kernel_contracts::{LedgerTimeSecs, RegistryError, RegistryResult};
use sha2::{Digest, Sha256};

pub const BINDING_DOMAIN_TAG: &[u8] = b"cadastre.disclosure.binding.v1";

/// Digest over the exact handle sequence sent to the oracle, scoped to one registry instance.
pub fn binding_digest(
    instance_id: &RegistryInstanceId,
    ordered_handles: &[CiphertextHandle],
) -> BindingDigest {
    let mut hasher = Sha256::new();
    hasher.update((BINDING_DOMAIN_TAG.len() as u32).to_be_bytes());
    hasher.update(BINDING_DOMAIN_TAG);
    hasher.update(instance_id.as_bytes());
    hasher.update((ordered_handles.len() as u32).to_be_bytes());
    for handle in ordered_handles {
        hasher.update(handle.as_bytes());
    }
    BindingDigest::from_bytes(hasher.finalize().into())
}

/// Snapshot taken at request time, before the oracle is contacted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisclosureTicket {
    pub record_id: RecordId,
    pub ordered_handles: [CiphertextHandle; 3],
    pub binding_digest: BindingDigest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisclosureOutcome {
    pub request_id: RequestId,
    pub context: DecryptionContext,
    pub plaintext: ParcelPlaintext,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptionProtocol {
    instance_id: RegistryInstanceId,
    pending_ttl_secs: Option<u64>,
    contexts: BTreeMap<RequestId, DecryptionContext>,
}

impl DecryptionProtocol {
    pub fn new(instance_id: RegistryInstanceId, pending_ttl_secs: Option<u64>) -> Self {
        Self {
            instance_id,
            pending_ttl_secs,
            contexts: BTreeMap::new(),
        }
    }

    pub fn from_rows(
        instance_id: RegistryInstanceId,
        pending_ttl_secs: Option<u64>,
        rows: impl IntoIterator<Item = (RequestId, DecryptionContext)>,
    ) -> Self {
        Self {
            instance_id,
            pending_ttl_secs,
            contexts: rows.into_iter().collect(),
        }
    }

    pub fn rows(&self) -> Vec<(RequestId, DecryptionContext)> {
        self.contexts.iter().map(|(id, ctx)| (*id, *ctx)).collect()
    }

    pub fn instance_id(&self) -> RegistryInstanceId {
        self.instance_id
    }

    pub fn pending_ttl_secs(&self) -> Option<u64> {
        self.pending_ttl_secs
    }

    pub fn context(&self, request_id: &RequestId) -> Option<DecryptionContext> {
        self.contexts.get(request_id).copied()
    }

    pub fn pending_count(&self) -> usize {
        self.contexts.values().filter(|ctx| !ctx.processed).count()
    }

    pub fn status(&self, request_id: &RequestId, now: LedgerTimeSecs) -> DisclosureStatus {
        match self.contexts.get(request_id) {
            None => DisclosureStatus::Unknown,
            Some(ctx) if ctx.processed => DisclosureStatus::Finalized,
            Some(ctx) if self.is_expired(ctx, now) => DisclosureStatus::Expired,
            Some(_) => DisclosureStatus::Pending,
        }
    }

    pub fn prepare(
        &self,
        record_id: RecordId,
        current: Option<ParcelHandles>,
    ) -> RegistryResult<DisclosureTicket> {
        let handles = current.ok_or(RegistryError::UnknownRecord { record_id })?;
        let ordered_handles = handles.ordered();
        Ok(DisclosureTicket {
            record_id,
            ordered_handles,
            binding_digest: binding_digest(&self.instance_id, &ordered_handles),
        })
    }

    /// Stores the pending context for an oracle-issued id. A reused id is refused and nothing is stored.
    pub fn record_pending(
        &mut self,
        request_id: RequestId,
        ticket: &DisclosureTicket,
        batch_id: BatchId,
        now: LedgerTimeSecs,
    ) -> RegistryResult<DecryptionContext> {
        if self.contexts.contains_key(&request_id) {
            return Err(RegistryError::ReplayAttempt { request_id });
        }
        let ctx =
            DecryptionContext::pending_v1(ticket.record_id, batch_id, ticket.binding_digest, now);
        self.contexts.insert(request_id, ctx);
        Ok(ctx)
    }

    pub fn process_callback<L, V>(
        &mut self,
        request_id: RequestId,
        cleartexts: &Cleartexts,
        attestation: &Attestation,
        now: LedgerTimeSecs,
        current_handles: L,
        verify_attestation: V,
    ) -> RegistryResult<DisclosureOutcome>
    where
        L: FnOnce(RecordId) -> Option<ParcelHandles>,
        V: FnOnce(&RequestId, &Cleartexts, &Attestation) -> bool,
    {
        let ctx = self.guard_replay(request_id, now)?;
        self.verify_integrity(request_id, &ctx, current_handles(ctx.record_id))?;
        if !verify_attestation(&request_id, cleartexts, attestation) {
            return Err(RegistryError::InvalidAttestation { request_id });
        }
        // A payload that does not decode cannot be the attested pair.
        let plaintext = cleartexts
            .decode()
            .map_err(|_| RegistryError::InvalidAttestation { request_id })?;

        let Some(stored) = self.contexts.get_mut(&request_id) else {
            return Err(RegistryError::ReplayAttempt { request_id });
        };
        stored.processed = true;
        Ok(DisclosureOutcome {
            request_id,
            context: *stored,
            plaintext,
        })
    }

    fn guard_replay(
        &self,
        request_id: RequestId,
        now: LedgerTimeSecs,
    ) -> RegistryResult<DecryptionContext> {
        let ctx = match self.contexts.get(&request_id) {
            Some(ctx) if !ctx.processed => *ctx,
            _ => return Err(RegistryError::ReplayAttempt { request_id }),
        };
        if self.is_expired(&ctx, now) {
            return Err(RegistryError::RequestExpired { request_id });
        }
        Ok(ctx)
    }

    fn verify_integrity(
        &self,
        request_id: RequestId,
        ctx: &DecryptionContext,
        current: Option<ParcelHandles>,
    ) -> RegistryResult<()> {
        let mismatch = RegistryError::StateMismatch {
            request_id,
            record_id: ctx.record_id,
        };
        let current = current.ok_or_else(|| mismatch.clone())?;
        if binding_digest(&self.instance_id, &current.ordered()) != ctx.binding_digest {
            return Err(mismatch);
        }
        Ok(())
    }

    fn is_expired(&self, ctx: &DecryptionContext, now: LedgerTimeSecs) -> bool {
        match self.pending_ttl_secs {
            Some(ttl) => now > ctx.requested_at.saturating_add_secs(ttl),
            None => false,
        }
    }
}
