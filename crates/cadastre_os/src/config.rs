#![forbid(unsafe_code)]

use cadastre_kernel_contracts::actor::ActorId;
use cadastre_kernel_contracts::disclosure::RegistryInstanceId;
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const ENV_REGISTRY_INSTANCE_ID: &str = "CADASTRE_REGISTRY_INSTANCE_ID";
pub const ENV_COOLDOWN_SECS: &str = "CADASTRE_COOLDOWN_SECS";
pub const ENV_PENDING_TTL_SECS: &str = "CADASTRE_PENDING_TTL_SECS";
pub const ENV_OWNER: &str = "CADASTRE_OWNER";
pub const ENV_DEMO_ORACLE: &str = "CADASTRE_DEMO_ORACLE";

pub const DEFAULT_COOLDOWN_SECS: u64 = 60;
pub const DEFAULT_INSTANCE_LABEL: &str = "cadastre-local";

const INSTANCE_LABEL_DOMAIN_TAG: &[u8] = b"cadastre.registry.instance.v1";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is invalid: {reason}")]
    InvalidVar { var: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    pub registry_instance_id: RegistryInstanceId,
    pub cooldown_secs: u64,
    /// `None` keeps pending requests finalizable forever.
    pub pending_ttl_secs: Option<u64>,
    /// Owner installed when no persisted state exists yet.
    pub bootstrap_owner: Option<ActorId>,
    /// Exposes the in-process oracle's seal and fulfill helpers. Off unless explicitly enabled.
    pub demo_oracle: bool,
}

impl RegistryConfig {
    pub fn mvp_v1(registry_instance_id: RegistryInstanceId) -> Self {
        Self {
            registry_instance_id,
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
            pending_ttl_secs: None,
            bootstrap_owner: None,
            demo_oracle: false,
        }
    }

    pub fn from_env_var_map<F>(mut env_getter: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let instance_id = match env_getter(ENV_REGISTRY_INSTANCE_ID) {
            Some(raw) => parse_instance_id(&raw)?,
            None => instance_id_from_label(DEFAULT_INSTANCE_LABEL),
        };
        let mut config = Self::mvp_v1(instance_id);

        if let Some(raw) = env_getter(ENV_COOLDOWN_SECS) {
            config.cooldown_secs = parse_secs(ENV_COOLDOWN_SECS, &raw)?;
        }
        if let Some(raw) = env_getter(ENV_PENDING_TTL_SECS) {
            let ttl = parse_secs(ENV_PENDING_TTL_SECS, &raw)?;
            if ttl == 0 {
                return Err(ConfigError::InvalidVar {
                    var: ENV_PENDING_TTL_SECS,
                    reason: "must be > 0 when set".to_string(),
                });
            }
            config.pending_ttl_secs = Some(ttl);
        }
        if let Some(raw) = env_getter(ENV_OWNER) {
            let owner = ActorId::new(raw.trim()).map_err(|v| ConfigError::InvalidVar {
                var: ENV_OWNER,
                reason: v.to_string(),
            })?;
            config.bootstrap_owner = Some(owner);
        }
        if let Some(raw) = env_getter(ENV_DEMO_ORACLE) {
            config.demo_oracle = matches!(
                raw.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "on" | "yes"
            );
        }
        Ok(config)
    }
}

/// 64 hex chars are taken as the raw id; anything else is a label hashed into one.
pub fn parse_instance_id(raw: &str) -> Result<RegistryInstanceId, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidVar {
            var: ENV_REGISTRY_INSTANCE_ID,
            reason: "must be non-empty".to_string(),
        });
    }
    let bare = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if bare.len() == 64 && bare.chars().all(|c| c.is_ascii_hexdigit()) {
        return RegistryInstanceId::parse_hex(bare).map_err(|v| ConfigError::InvalidVar {
            var: ENV_REGISTRY_INSTANCE_ID,
            reason: v.to_string(),
        });
    }
    Ok(instance_id_from_label(trimmed))
}

pub fn instance_id_from_label(label: &str) -> RegistryInstanceId {
    let mut hasher = Sha256::new();
    hasher.update(INSTANCE_LABEL_DOMAIN_TAG);
    hasher.update(label.as_bytes());
    RegistryInstanceId::from_bytes(hasher.finalize().into())
}

fn parse_secs(var: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidVar {
            var,
            reason: e.to_string(),
        })
}
