#![forbid(unsafe_code)]

use thiserror::Error;

use crate::actor::{ActionKind, ActorId};
use crate::disclosure::RequestId;
use crate::event::reason_codes;
use crate::parcel::RecordId;
use crate::{ContractViolation, ReasonCodeId};

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Synchronous rejection of one registry operation. A rejected operation mutates nothing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    // Authorization
    #[error("actor {actor} lacks the {required} role")]
    NotAuthorized {
        actor: ActorId,
        required: &'static str,
    },

    // Lifecycle
    #[error("registry is paused")]
    PausedState,

    #[error("no batch is open")]
    BatchNotOpen,

    #[error("record {record_id} has no submitted handles")]
    UnknownRecord { record_id: RecordId },

    // Throttle
    #[error("cooldown active for {actor} {kind:?}: {remaining_secs}s remaining")]
    CooldownActive {
        actor: ActorId,
        kind: ActionKind,
        remaining_secs: u64,
    },

    // Protocol integrity
    #[error("request {request_id} is unknown or already processed")]
    ReplayAttempt { request_id: RequestId },

    #[error("record {record_id} changed since request {request_id} was issued")]
    StateMismatch {
        request_id: RequestId,
        record_id: RecordId,
    },

    #[error("attestation rejected for request {request_id}")]
    InvalidAttestation { request_id: RequestId },

    #[error("request {request_id} expired before the oracle answered")]
    RequestExpired { request_id: RequestId },

    // Collaborator
    #[error("oracle dispatch failed: {reason}")]
    OracleDispatch { reason: String },

    #[error("contract violation: {0}")]
    Contract(#[from] ContractViolation),
}

impl RegistryError {
    pub fn reason_code(&self) -> ReasonCodeId {
        match self {
            RegistryError::NotAuthorized { .. } => reason_codes::CADASTRE_NOT_AUTHORIZED,
            RegistryError::PausedState => reason_codes::CADASTRE_PAUSED_STATE,
            RegistryError::BatchNotOpen => reason_codes::CADASTRE_BATCH_NOT_OPEN,
            RegistryError::UnknownRecord { .. } => reason_codes::CADASTRE_UNKNOWN_RECORD,
            RegistryError::CooldownActive { .. } => reason_codes::CADASTRE_COOLDOWN_ACTIVE,
            RegistryError::ReplayAttempt { .. } => reason_codes::CADASTRE_REPLAY_ATTEMPT,
            RegistryError::StateMismatch { .. } => reason_codes::CADASTRE_STATE_MISMATCH,
            RegistryError::InvalidAttestation { .. } => reason_codes::CADASTRE_INVALID_ATTESTATION,
            RegistryError::RequestExpired { .. } => reason_codes::CADASTRE_REQUEST_EXPIRED,
            RegistryError::OracleDispatch { .. } => reason_codes::CADASTRE_ORACLE_DISPATCH_FAILED,
            RegistryError::Contract(_) => reason_codes::CADASTRE_INPUT_SCHEMA_INVALID,
        }
    }

    /// Stable error name surfaced verbatim to clients.
    pub fn name(&self) -> &'static str {
        match self {
            RegistryError::NotAuthorized { .. } => "NotAuthorized",
            RegistryError::PausedState => "PausedState",
            RegistryError::BatchNotOpen => "BatchNotOpen",
            RegistryError::UnknownRecord { .. } => "UnknownRecord",
            RegistryError::CooldownActive { .. } => "CooldownActive",
            RegistryError::ReplayAttempt { .. } => "ReplayAttempt",
            RegistryError::StateMismatch { .. } => "StateMismatch",
            RegistryError::InvalidAttestation { .. } => "InvalidAttestation",
            RegistryError::RequestExpired { .. } => "RequestExpired",
            RegistryError::OracleDispatch { .. } => "OracleDispatch",
            RegistryError::Contract(_) => "ContractViolation",
        }
    }
}
