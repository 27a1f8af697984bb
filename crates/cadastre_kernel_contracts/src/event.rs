#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::actor::ActorId;
use crate::batch::BatchId;
use crate::disclosure::RequestId;
use crate::parcel::RecordId;
use crate::ReasonCodeId;

pub mod reason_codes {
    use crate::ReasonCodeId;

    // Registry success namespace ("CD" = 0x4344).
    pub const CADASTRE_OK_OWNERSHIP_TRANSFERRED: ReasonCodeId = ReasonCodeId(0x4344_0001);
    pub const CADASTRE_OK_PROVIDER_ADDED: ReasonCodeId = ReasonCodeId(0x4344_0002);
    pub const CADASTRE_OK_PROVIDER_REMOVED: ReasonCodeId = ReasonCodeId(0x4344_0003);
    pub const CADASTRE_OK_PAUSED: ReasonCodeId = ReasonCodeId(0x4344_0004);
    pub const CADASTRE_OK_UNPAUSED: ReasonCodeId = ReasonCodeId(0x4344_0005);
    pub const CADASTRE_OK_COOLDOWN_UPDATED: ReasonCodeId = ReasonCodeId(0x4344_0006);
    pub const CADASTRE_OK_BATCH_OPENED: ReasonCodeId = ReasonCodeId(0x4344_0007);
    pub const CADASTRE_OK_BATCH_CLOSED: ReasonCodeId = ReasonCodeId(0x4344_0008);
    pub const CADASTRE_OK_RECORD_SUBMITTED: ReasonCodeId = ReasonCodeId(0x4344_0009);
    pub const CADASTRE_OK_DECRYPTION_REQUESTED: ReasonCodeId = ReasonCodeId(0x4344_000A);
    pub const CADASTRE_OK_DECRYPTION_COMPLETED: ReasonCodeId = ReasonCodeId(0x4344_000B);

    // Registry rejection namespace.
    pub const CADASTRE_NOT_AUTHORIZED: ReasonCodeId = ReasonCodeId(0x4344_00F1);
    pub const CADASTRE_PAUSED_STATE: ReasonCodeId = ReasonCodeId(0x4344_00F2);
    pub const CADASTRE_BATCH_NOT_OPEN: ReasonCodeId = ReasonCodeId(0x4344_00F3);
    pub const CADASTRE_COOLDOWN_ACTIVE: ReasonCodeId = ReasonCodeId(0x4344_00F4);
    pub const CADASTRE_REPLAY_ATTEMPT: ReasonCodeId = ReasonCodeId(0x4344_00F5);
    pub const CADASTRE_STATE_MISMATCH: ReasonCodeId = ReasonCodeId(0x4344_00F6);
    pub const CADASTRE_INVALID_ATTESTATION: ReasonCodeId = ReasonCodeId(0x4344_00F7);
    pub const CADASTRE_UNKNOWN_RECORD: ReasonCodeId = ReasonCodeId(0x4344_00F8);
    pub const CADASTRE_REQUEST_EXPIRED: ReasonCodeId = ReasonCodeId(0x4344_00F9);
    pub const CADASTRE_ORACLE_DISPATCH_FAILED: ReasonCodeId = ReasonCodeId(0x4344_00FA);
    pub const CADASTRE_INPUT_SCHEMA_INVALID: ReasonCodeId = ReasonCodeId(0x4344_00FB);
}

/// Terminal success signal of one mutating operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistryEvent {
    OwnershipTransferred {
        previous_owner: ActorId,
        new_owner: ActorId,
    },
    ProviderAdded {
        provider: ActorId,
    },
    ProviderRemoved {
        provider: ActorId,
    },
    Paused {
        by: ActorId,
    },
    Unpaused {
        by: ActorId,
    },
    CooldownUpdated {
        cooldown_secs: u64,
    },
    BatchOpened {
        batch_id: BatchId,
    },
    BatchClosed {
        batch_id: BatchId,
    },
    RecordSubmitted {
        record_id: RecordId,
        provider: ActorId,
        batch_id: BatchId,
    },
    DecryptionRequested {
        request_id: RequestId,
        record_id: RecordId,
        batch_id: BatchId,
    },
    DecryptionCompleted {
        request_id: RequestId,
        batch_id: BatchId,
        record_id: RecordId,
        identity: u64,
        x: u64,
        y: u64,
    },
}

impl RegistryEvent {
    pub fn reason_code(&self) -> ReasonCodeId {
        match self {
            RegistryEvent::OwnershipTransferred { .. } => {
                reason_codes::CADASTRE_OK_OWNERSHIP_TRANSFERRED
            }
            RegistryEvent::ProviderAdded { .. } => reason_codes::CADASTRE_OK_PROVIDER_ADDED,
            RegistryEvent::ProviderRemoved { .. } => reason_codes::CADASTRE_OK_PROVIDER_REMOVED,
            RegistryEvent::Paused { .. } => reason_codes::CADASTRE_OK_PAUSED,
            RegistryEvent::Unpaused { .. } => reason_codes::CADASTRE_OK_UNPAUSED,
            RegistryEvent::CooldownUpdated { .. } => reason_codes::CADASTRE_OK_COOLDOWN_UPDATED,
            RegistryEvent::BatchOpened { .. } => reason_codes::CADASTRE_OK_BATCH_OPENED,
            RegistryEvent::BatchClosed { .. } => reason_codes::CADASTRE_OK_BATCH_CLOSED,
            RegistryEvent::RecordSubmitted { .. } => reason_codes::CADASTRE_OK_RECORD_SUBMITTED,
            RegistryEvent::DecryptionRequested { .. } => {
                reason_codes::CADASTRE_OK_DECRYPTION_REQUESTED
            }
            RegistryEvent::DecryptionCompleted { .. } => {
                reason_codes::CADASTRE_OK_DECRYPTION_COMPLETED
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RegistryEvent::OwnershipTransferred { .. } => "OWNERSHIP_TRANSFERRED",
            RegistryEvent::ProviderAdded { .. } => "PROVIDER_ADDED",
            RegistryEvent::ProviderRemoved { .. } => "PROVIDER_REMOVED",
            RegistryEvent::Paused { .. } => "PAUSED",
            RegistryEvent::Unpaused { .. } => "UNPAUSED",
            RegistryEvent::CooldownUpdated { .. } => "COOLDOWN_UPDATED",
            RegistryEvent::BatchOpened { .. } => "BATCH_OPENED",
            RegistryEvent::BatchClosed { .. } => "BATCH_CLOSED",
            RegistryEvent::RecordSubmitted { .. } => "RECORD_SUBMITTED",
            RegistryEvent::DecryptionRequested { .. } => "DECRYPTION_REQUESTED",
            RegistryEvent::DecryptionCompleted { .. } => "DECRYPTION_COMPLETED",
        }
    }
}
