#![forbid(unsafe_code)]

use std::env;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use cadastre_engines::oracle_local::LocalDecryptionOracle;
use cadastre_kernel_contracts::actor::ActorId;
use cadastre_kernel_contracts::disclosure::{Attestation, Cleartexts, DisclosureStatus, RequestId};
use cadastre_kernel_contracts::event::RegistryEvent;
use cadastre_kernel_contracts::parcel::{CiphertextHandle, ParcelHandles, RecordId};
use cadastre_kernel_contracts::{ContractViolation, LedgerTimeSecs, RegistryError};
use cadastre_os::config::{ConfigError, ENV_DEMO_ORACLE};
use cadastre_os::{RegistryConfig, RegistryRuntime};
use cadastre_storage::journal::{EventJournalRow, JournalFile};
use cadastre_storage::repo::{EventJournalRepo, RegistrySnapshotRepo};
use cadastre_storage::snapshot::SnapshotFile;
use tracing::{error, info, warn};

pub const ENV_STORE_PATH: &str = "CADASTRE_STORE_PATH";

const JOURNAL_FILE_EXTENSION: &str = "events.jsonl";

const STATUS_OK: &str = "ok";
const STATUS_ERROR: &str = "error";
const OUTCOME_ACCEPTED: &str = "ACCEPTED";
const OUTCOME_REJECTED: &str = "REJECTED";

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ActorOpRequest {
    pub actor: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TargetActorRequest {
    pub actor: String,
    pub target: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SetCooldownRequest {
    pub actor: String,
    pub cooldown_secs: u64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SubmitRecordRequest {
    pub actor: String,
    pub record_id: u64,
    pub identity_handle: String,
    pub x_handle: String,
    pub y_handle: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DisclosureRequest {
    pub actor: String,
    pub record_id: u64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct OracleCallbackRequest {
    pub request_id: String,
    pub cleartexts_b64: String,
    pub attestation_b64: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EventResponse {
    pub status: String,
    pub outcome: String,
    pub seq: u64,
    pub event: RegistryEvent,
}

/// Body returned for every refused request.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AdapterRejection {
    pub status: String,
    pub outcome: String,
    pub reason: String,
    pub error: Option<String>,
    pub reason_code: Option<u32>,
    #[serde(skip)]
    pub http_status: u16,
}

impl AdapterRejection {
    fn bad_input(reason: String) -> Self {
        Self {
            status: STATUS_ERROR.to_string(),
            outcome: OUTCOME_REJECTED.to_string(),
            reason,
            error: None,
            reason_code: None,
            http_status: 400,
        }
    }

    fn not_found(reason: String) -> Self {
        Self {
            http_status: 404,
            ..Self::bad_input(reason)
        }
    }

    fn internal(reason: String) -> Self {
        Self {
            http_status: 500,
            ..Self::bad_input(reason)
        }
    }
}

impl From<RegistryError> for AdapterRejection {
    fn from(err: RegistryError) -> Self {
        let http_status = match err {
            RegistryError::NotAuthorized { .. } => 403,
            RegistryError::Contract(_) => 400,
            RegistryError::UnknownRecord { .. } => 404,
            RegistryError::OracleDispatch { .. } => 502,
            _ => 409,
        };
        Self {
            status: STATUS_ERROR.to_string(),
            outcome: OUTCOME_REJECTED.to_string(),
            reason: err.to_string(),
            error: Some(err.name().to_string()),
            reason_code: Some(err.reason_code().0),
            http_status,
        }
    }
}

impl From<ContractViolation> for AdapterRejection {
    fn from(v: ContractViolation) -> Self {
        RegistryError::Contract(v).into()
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RegistryStateResponse {
    pub status: String,
    pub registry_instance_id: String,
    pub owner: String,
    pub providers: Vec<String>,
    pub paused: bool,
    pub cooldown_secs: u64,
    pub batch_id: u64,
    pub batch_open: bool,
    pub record_count: usize,
    pub pending_disclosures: usize,
    pub last_event_seq: u64,
    pub oracle_verifying_key: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ActorRolesResponse {
    pub status: String,
    pub actor: String,
    pub is_owner: bool,
    pub is_provider: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RecordResponse {
    pub status: String,
    pub record_id: u64,
    pub handles: ParcelHandles,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DisclosureStatusResponse {
    pub status: String,
    pub request_id: String,
    pub disclosure_status: String,
    pub record_id: Option<u64>,
    pub batch_id: Option<u64>,
    pub requested_at: Option<u64>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EventsResponse {
    pub status: String,
    pub last_seq: u64,
    pub events: Vec<EventJournalRow>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AdapterHealthResponse {
    pub status: String,
    pub paused: bool,
    pub persistence: bool,
    pub demo_oracle: bool,
    pub last_event_seq: u64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DemoSealRequest {
    pub identity: u64,
    pub x: u64,
    pub y: u64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DemoSealResponse {
    pub status: String,
    pub identity_handle: String,
    pub x_handle: String,
    pub y_handle: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DemoFulfillRequest {
    pub request_id: String,
}

/// Ready-to-post callback body produced by the in-process oracle.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DemoFulfillResponse {
    pub status: String,
    pub callback: OracleCallbackRequest,
}

/// Source of wall-clock seconds. Request bodies never carry time.
pub type HostClock = Box<dyn Fn() -> u64 + Send>;

struct AdapterPersistence {
    snapshots: Box<dyn RegistrySnapshotRepo + Send>,
    journal: Box<dyn EventJournalRepo + Send>,
}

pub struct AdapterRuntime {
    runtime: RegistryRuntime<LocalDecryptionOracle>,
    persistence: Option<AdapterPersistence>,
    demo_oracle: bool,
    clock: HostClock,
    clock_floor: u64,
}

impl AdapterRuntime {
    pub fn new_in_memory(config: &RegistryConfig, owner: ActorId) -> Self {
        Self::assemble(
            RegistryRuntime::new(config, owner, LocalDecryptionOracle::new_random()),
            None,
            config.demo_oracle,
        )
    }

    pub fn default_from_env() -> Result<Self, String> {
        let config = RegistryConfig::from_env_var_map(|key| env::var(key).ok())
            .map_err(|e: ConfigError| e.to_string())?;
        let store_path = env::var(ENV_STORE_PATH).ok().map(PathBuf::from);
        Self::from_config(&config, store_path)
    }

    /// Restores from the snapshot at `store_path` (journal alongside it) when one exists,
    /// otherwise bootstraps a fresh registry owned by `config.bootstrap_owner`.
    pub fn from_config(config: &RegistryConfig, store_path: Option<PathBuf>) -> Result<Self, String> {
        let Some(snapshot_path) = store_path else {
            let owner = bootstrap_owner(config)?;
            return Ok(Self::new_in_memory(config, owner));
        };
        let journal_path = snapshot_path.with_extension(JOURNAL_FILE_EXTENSION);
        let journal = JournalFile::open(&journal_path).map_err(|e| {
            format!(
                "failed to open event journal '{}': {e}",
                journal_path.display()
            )
        })?;
        Self::from_repos(
            config,
            Box::new(SnapshotFile::new(snapshot_path)),
            Box::new(journal),
        )
    }

    pub fn from_repos(
        config: &RegistryConfig,
        snapshots: Box<dyn RegistrySnapshotRepo + Send>,
        journal: Box<dyn EventJournalRepo + Send>,
    ) -> Result<Self, String> {
        let restored = RegistryRuntime::restore(
            snapshots.as_ref(),
            journal.as_ref(),
            LocalDecryptionOracle::new_random(),
        )
        .map_err(|e| format!("failed to restore registry state: {e}"))?;

        let runtime = match restored {
            Some(runtime) => {
                check_restored_matches_config(&runtime, config)?;
                if runtime.pending_disclosures() > 0 {
                    warn!(
                        pending = runtime.pending_disclosures(),
                        "restored pending disclosures cannot be fulfilled by a fresh local oracle"
                    );
                }
                info!(last_event_seq = runtime.last_event_seq(), "registry restored from snapshot");
                runtime
            }
            None => {
                if journal.persisted_seq() > 0 {
                    return Err(format!(
                        "event journal holds {} rows but no registry snapshot exists",
                        journal.persisted_seq()
                    ));
                }
                let owner = bootstrap_owner(config)?;
                info!(owner = %owner, "bootstrapping new registry");
                RegistryRuntime::new(config, owner, LocalDecryptionOracle::new_random())
            }
        };
        Ok(Self::assemble(
            runtime,
            Some(AdapterPersistence { snapshots, journal }),
            config.demo_oracle,
        ))
    }

    /// Replaces the host clock. The ledger time handed to the runtime still never moves
    /// backwards.
    pub fn with_clock(mut self, clock: impl Fn() -> u64 + Send + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    fn assemble(
        runtime: RegistryRuntime<LocalDecryptionOracle>,
        persistence: Option<AdapterPersistence>,
        demo_oracle: bool,
    ) -> Self {
        let clock_floor = runtime.last_event_at().map(|t| t.0).unwrap_or(0);
        Self {
            runtime,
            persistence,
            demo_oracle,
            clock: Box::new(system_time_now_secs),
            clock_floor,
        }
    }

    pub fn has_persistence(&self) -> bool {
        self.persistence.is_some()
    }

    pub fn demo_oracle_enabled(&self) -> bool {
        self.demo_oracle
    }

    pub fn health(&self) -> AdapterHealthResponse {
        AdapterHealthResponse {
            status: STATUS_OK.to_string(),
            paused: self.runtime.is_paused(),
            persistence: self.has_persistence(),
            demo_oracle: self.demo_oracle,
            last_event_seq: self.runtime.last_event_seq(),
        }
    }

    pub fn pause(&mut self, req: ActorOpRequest) -> Result<EventResponse, AdapterRejection> {
        let actor = parse_actor(&req.actor)?;
        let now = self.ledger_now();
        let result = self.runtime.pause(&actor, now);
        self.commit(result)
    }

    pub fn unpause(&mut self, req: ActorOpRequest) -> Result<EventResponse, AdapterRejection> {
        let actor = parse_actor(&req.actor)?;
        let now = self.ledger_now();
        let result = self.runtime.unpause(&actor, now);
        self.commit(result)
    }

    pub fn open_batch(&mut self, req: ActorOpRequest) -> Result<EventResponse, AdapterRejection> {
        let actor = parse_actor(&req.actor)?;
        let now = self.ledger_now();
        let result = self.runtime.open_batch(&actor, now);
        self.commit(result)
    }

    pub fn close_batch(&mut self, req: ActorOpRequest) -> Result<EventResponse, AdapterRejection> {
        let actor = parse_actor(&req.actor)?;
        let now = self.ledger_now();
        let result = self.runtime.close_batch(&actor, now);
        self.commit(result)
    }

    pub fn set_cooldown(&mut self, req: SetCooldownRequest) -> Result<EventResponse, AdapterRejection> {
        let actor = parse_actor(&req.actor)?;
        let now = self.ledger_now();
        let result = self.runtime.set_cooldown(&actor, req.cooldown_secs, now);
        self.commit(result)
    }

    pub fn transfer_ownership(
        &mut self,
        req: TargetActorRequest,
    ) -> Result<EventResponse, AdapterRejection> {
        let actor = parse_actor(&req.actor)?;
        let target = parse_actor(&req.target)?;
        let now = self.ledger_now();
        let result = self.runtime.transfer_ownership(&actor, target, now);
        self.commit(result)
    }

    pub fn add_provider(&mut self, req: TargetActorRequest) -> Result<EventResponse, AdapterRejection> {
        let actor = parse_actor(&req.actor)?;
        let target = parse_actor(&req.target)?;
        let now = self.ledger_now();
        let result = self.runtime.add_provider(&actor, target, now);
        self.commit(result)
    }

    pub fn remove_provider(
        &mut self,
        req: TargetActorRequest,
    ) -> Result<EventResponse, AdapterRejection> {
        let actor = parse_actor(&req.actor)?;
        let target = parse_actor(&req.target)?;
        let now = self.ledger_now();
        let result = self.runtime.remove_provider(&actor, target, now);
        self.commit(result)
    }

    pub fn submit(&mut self, req: SubmitRecordRequest) -> Result<EventResponse, AdapterRejection> {
        let actor = parse_actor(&req.actor)?;
        let handles = ParcelHandles::new(
            CiphertextHandle::parse_hex(&req.identity_handle)?,
            CiphertextHandle::parse_hex(&req.x_handle)?,
            CiphertextHandle::parse_hex(&req.y_handle)?,
        );
        let now = self.ledger_now();
        let result = self
            .runtime
            .submit(&actor, RecordId(req.record_id), handles, now);
        self.commit(result)
    }

    pub fn request_disclosure(
        &mut self,
        req: DisclosureRequest,
    ) -> Result<EventResponse, AdapterRejection> {
        let actor = parse_actor(&req.actor)?;
        let now = self.ledger_now();
        let result = self
            .runtime
            .request_disclosure(&actor, RecordId(req.record_id), now);
        self.commit(result)
    }

    pub fn oracle_callback(
        &mut self,
        req: OracleCallbackRequest,
    ) -> Result<EventResponse, AdapterRejection> {
        let request_id = RequestId::parse_hex(&req.request_id)?;
        let cleartexts = Cleartexts::from_bytes(decode_b64("cleartexts_b64", &req.cleartexts_b64)?);
        let attestation =
            Attestation::from_bytes(decode_b64("attestation_b64", &req.attestation_b64)?);
        let now = self.ledger_now();
        let result = self
            .runtime
            .on_oracle_callback(request_id, &cleartexts, &attestation, now);
        self.commit(result)
    }

    pub fn registry_state(&self) -> RegistryStateResponse {
        let batch = self.runtime.batch_state();
        RegistryStateResponse {
            status: STATUS_OK.to_string(),
            registry_instance_id: self.runtime.registry_instance_id().to_hex(),
            owner: self.runtime.owner().to_string(),
            providers: self
                .runtime
                .providers()
                .into_iter()
                .map(String::from)
                .collect(),
            paused: self.runtime.is_paused(),
            cooldown_secs: self.runtime.cooldown_secs(),
            batch_id: batch.id.0,
            batch_open: batch.open,
            record_count: self.runtime.record_count(),
            pending_disclosures: self.runtime.pending_disclosures(),
            last_event_seq: self.runtime.last_event_seq(),
            oracle_verifying_key: self.runtime.oracle().verifying_key_hex(),
        }
    }

    pub fn actor_roles(&self, actor: &str) -> Result<ActorRolesResponse, AdapterRejection> {
        let id = parse_actor(actor)?;
        let roles = self.runtime.roles(&id);
        Ok(ActorRolesResponse {
            status: STATUS_OK.to_string(),
            actor: id.to_string(),
            is_owner: roles.is_owner,
            is_provider: roles.is_provider,
        })
    }

    pub fn record(&self, record_id: u64) -> Result<RecordResponse, AdapterRejection> {
        let handles = self
            .runtime
            .handles(RecordId(record_id))
            .ok_or_else(|| AdapterRejection::not_found(format!("record {record_id} not found")))?;
        Ok(RecordResponse {
            status: STATUS_OK.to_string(),
            record_id,
            handles,
        })
    }

    pub fn disclosure_status(
        &mut self,
        request_id: &str,
    ) -> Result<DisclosureStatusResponse, AdapterRejection> {
        let id = RequestId::parse_hex(request_id)?;
        let now = self.ledger_now();
        let status = self.runtime.disclosure_status(&id, now);
        let ctx = self.runtime.disclosure_context(&id);
        Ok(DisclosureStatusResponse {
            status: STATUS_OK.to_string(),
            request_id: id.to_hex(),
            disclosure_status: status.as_str().to_string(),
            record_id: ctx.map(|c| c.record_id.0),
            batch_id: ctx.map(|c| c.batch_id.0),
            requested_at: ctx.map(|c| c.requested_at.0),
        })
    }

    pub fn events_since(&self, after_seq: u64) -> EventsResponse {
        EventsResponse {
            status: STATUS_OK.to_string(),
            last_seq: self.runtime.last_event_seq(),
            events: self.runtime.events_since(after_seq).to_vec(),
        }
    }

    /// Seals three values with the in-process oracle and returns their handles.
    pub fn demo_seal(&mut self, req: DemoSealRequest) -> Result<DemoSealResponse, AdapterRejection> {
        self.require_demo_oracle()?;
        let oracle = self.runtime.oracle_mut();
        let mut seal = |value: u64| {
            oracle
                .encrypt_u64(value)
                .map(|h| h.to_hex())
                .map_err(|e| AdapterRejection::internal(e.to_string()))
        };
        Ok(DemoSealResponse {
            status: STATUS_OK.to_string(),
            identity_handle: seal(req.identity)?,
            x_handle: seal(req.x)?,
            y_handle: seal(req.y)?,
        })
    }

    /// Only requests the registry still considers pending are fulfilled.
    pub fn demo_fulfill(
        &mut self,
        req: DemoFulfillRequest,
    ) -> Result<DemoFulfillResponse, AdapterRejection> {
        self.require_demo_oracle()?;
        let request_id = RequestId::parse_hex(&req.request_id)?;
        let now = self.ledger_now();
        let status = self.runtime.disclosure_status(&request_id, now);
        if status != DisclosureStatus::Pending {
            return Err(AdapterRejection::not_found(format!(
                "request {request_id} is {}, not pending",
                status.as_str()
            )));
        }
        let (cleartexts, attestation) = self
            .runtime
            .oracle()
            .fulfill(&request_id)
            .map_err(|e| AdapterRejection::not_found(e.to_string()))?;
        Ok(DemoFulfillResponse {
            status: STATUS_OK.to_string(),
            callback: OracleCallbackRequest {
                request_id: request_id.to_hex(),
                cleartexts_b64: BASE64.encode(cleartexts.as_bytes()),
                attestation_b64: BASE64.encode(attestation.as_bytes()),
            },
        })
    }

    fn require_demo_oracle(&self) -> Result<(), AdapterRejection> {
        if self.demo_oracle {
            return Ok(());
        }
        Err(AdapterRejection::not_found(format!(
            "demo oracle endpoints are disabled; set {ENV_DEMO_ORACLE}=1 to enable"
        )))
    }

    /// Host time, floored at the latest time already handed out or journaled.
    fn ledger_now(&mut self) -> LedgerTimeSecs {
        let host = (self.clock)();
        if host < self.clock_floor {
            warn!(host, floor = self.clock_floor, "host clock behind ledger time; holding");
        }
        self.clock_floor = self.clock_floor.max(host);
        LedgerTimeSecs(self.clock_floor)
    }

    fn commit(
        &mut self,
        result: Result<RegistryEvent, RegistryError>,
    ) -> Result<EventResponse, AdapterRejection> {
        let event = result?;
        if let Some(store) = self.persistence.as_mut() {
            if let Err(err) = self
                .runtime
                .persist(store.snapshots.as_mut(), store.journal.as_mut())
            {
                error!(
                    seq = self.runtime.last_event_seq(),
                    error = %err,
                    "registry persistence failed"
                );
                return Err(AdapterRejection::internal(format!(
                    "event committed but persistence failed: {err}"
                )));
            }
        }
        Ok(EventResponse {
            status: STATUS_OK.to_string(),
            outcome: OUTCOME_ACCEPTED.to_string(),
            seq: self.runtime.last_event_seq(),
            event,
        })
    }
}

fn parse_actor(raw: &str) -> Result<ActorId, AdapterRejection> {
    Ok(ActorId::new(raw)?)
}

fn decode_b64(field: &str, raw: &str) -> Result<Vec<u8>, AdapterRejection> {
    BASE64
        .decode(raw.trim())
        .map_err(|e| AdapterRejection::bad_input(format!("{field} is not valid base64: {e}")))
}

fn bootstrap_owner(config: &RegistryConfig) -> Result<ActorId, String> {
    config
        .bootstrap_owner
        .clone()
        .ok_or_else(|| "CADASTRE_OWNER is required when no registry snapshot exists".to_string())
}

fn check_restored_matches_config(
    runtime: &RegistryRuntime<LocalDecryptionOracle>,
    config: &RegistryConfig,
) -> Result<(), String> {
    if runtime.registry_instance_id() != config.registry_instance_id {
        return Err(format!(
            "snapshot belongs to registry instance {}, configured {}",
            runtime.registry_instance_id(),
            config.registry_instance_id
        ));
    }
    if runtime.pending_ttl_secs() != config.pending_ttl_secs {
        return Err(format!(
            "snapshot pending ttl {:?} differs from configured {:?}",
            runtime.pending_ttl_secs(),
            config.pending_ttl_secs
        ));
    }
    if runtime.cooldown_secs() != config.cooldown_secs {
        warn!(
            snapshot = runtime.cooldown_secs(),
            configured = config.cooldown_secs,
            "keeping restored cooldown; use set_cooldown to change it"
        );
    }
    Ok(())
}

fn system_time_now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
