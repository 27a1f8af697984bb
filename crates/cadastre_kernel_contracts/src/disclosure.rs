#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::batch::BatchId;
use crate::common::opaque_bytes32;
use crate::parcel::{ParcelPlaintext, RecordId};
use crate::{ContractViolation, LedgerTimeSecs, SchemaVersion};

pub const DISCLOSURE_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// Each cleartext value occupies one 32-byte big-endian word.
pub const CLEARTEXT_WORD_LEN: usize = 32;
pub const CLEARTEXT_WORD_COUNT: usize = 3;

opaque_bytes32!(
    /// Identifier issued by the oracle for one decryption job. Unpredictable; never sequential.
    RequestId,
    "request_id"
);

opaque_bytes32!(
    /// SHA-256 binding over the dispatched handles and the registry instance.
    BindingDigest,
    "binding_digest"
);

opaque_bytes32!(
    /// Domain-separation identity of one registry deployment.
    RegistryInstanceId,
    "registry_instance_id"
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionContext {
    pub schema_version: SchemaVersion,
    pub record_id: RecordId,
    pub batch_id: BatchId,
    pub binding_digest: BindingDigest,
    pub requested_at: LedgerTimeSecs,
    pub processed: bool,
}

impl DecryptionContext {
    pub fn pending_v1(
        record_id: RecordId,
        batch_id: BatchId,
        binding_digest: BindingDigest,
        requested_at: LedgerTimeSecs,
    ) -> Self {
        Self {
            schema_version: DISCLOSURE_CONTRACT_VERSION,
            record_id,
            batch_id,
            binding_digest,
            requested_at,
            processed: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisclosureStatus {
    Unknown,
    Pending,
    Expired,
    Finalized,
}

impl DisclosureStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DisclosureStatus::Unknown => "UNKNOWN",
            DisclosureStatus::Pending => "PENDING",
            DisclosureStatus::Expired => "EXPIRED",
            DisclosureStatus::Finalized => "FINALIZED",
        }
    }
}

/// Oracle-supplied cleartext payload: identity, x, y as 32-byte big-endian words.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cleartexts(Vec<u8>);

impl Cleartexts {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn encode(plaintext: &ParcelPlaintext) -> Self {
        let mut out = Vec::with_capacity(CLEARTEXT_WORD_LEN * CLEARTEXT_WORD_COUNT);
        for value in [plaintext.identity, plaintext.x, plaintext.y] {
            let mut word = [0u8; CLEARTEXT_WORD_LEN];
            word[CLEARTEXT_WORD_LEN - 8..].copy_from_slice(&value.to_be_bytes());
            out.extend_from_slice(&word);
        }
        Self(out)
    }

    pub fn decode(&self) -> Result<ParcelPlaintext, ContractViolation> {
        let expected = CLEARTEXT_WORD_LEN * CLEARTEXT_WORD_COUNT;
        if self.0.len() != expected {
            return Err(ContractViolation::InvalidLength {
                field: "cleartexts",
                expected,
                got: self.0.len(),
            });
        }
        let mut values = [0u64; CLEARTEXT_WORD_COUNT];
        for (slot, word) in values.iter_mut().zip(self.0.chunks_exact(CLEARTEXT_WORD_LEN)) {
            let (high, low) = word.split_at(CLEARTEXT_WORD_LEN - 8);
            if high.iter().any(|b| *b != 0) {
                return Err(ContractViolation::InvalidValue {
                    field: "cleartexts",
                    reason: "word does not fit in u64",
                });
            }
            let mut buf = [0u8; 8];
            buf.copy_from_slice(low);
            *slot = u64::from_be_bytes(buf);
        }
        Ok(ParcelPlaintext {
            identity: values[0],
            x: values[1],
            y: values[2],
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Oracle proof that a cleartext payload belongs to a given request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Attestation(Vec<u8>);

impl Attestation {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}
