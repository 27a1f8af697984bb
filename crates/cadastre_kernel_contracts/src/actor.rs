#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::common::validate_token;
use crate::{ContractViolation, Validate};

const ACTOR_ID_MAX_LEN: usize = 128;

/// Address-equivalent identity of a caller.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ActorId(String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(id.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for ActorId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_token("actor_id", &self.0, ACTOR_ID_MAX_LEN)
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ActorId {
    type Error = ContractViolation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ActorId> for String {
    fn from(value: ActorId) -> Self {
        value.0
    }
}

/// Action classes tracked independently by the throttle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Submit,
    DecryptRequest,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Submit => "SUBMIT",
            ActionKind::DecryptRequest => "DECRYPT_REQUEST",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActorRoles {
    pub is_owner: bool,
    pub is_provider: bool,
}
