#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use cadastre_kernel_contracts::actor::{ActorId, ActorRoles};
use cadastre_kernel_contracts::event::RegistryEvent;
use cadastre_kernel_contracts::{RegistryError, RegistryResult};

pub const ROLE_OWNER: &str = "owner";
pub const ROLE_PROVIDER: &str = "provider";

/// Owner plus provider role table. Single writer: every mutation goes through this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessControl {
    owner: ActorId,
    providers: BTreeSet<ActorId>,
}

impl AccessControl {
    pub fn new(owner: ActorId) -> Self {
        Self {
            owner,
            providers: BTreeSet::new(),
        }
    }

    pub fn from_parts(owner: ActorId, providers: impl IntoIterator<Item = ActorId>) -> Self {
        Self {
            owner,
            providers: providers.into_iter().collect(),
        }
    }

    pub fn owner(&self) -> ActorId {
        self.owner.clone()
    }

    pub fn is_owner(&self, actor: &ActorId) -> bool {
        &self.owner == actor
    }

    pub fn is_provider(&self, actor: &ActorId) -> bool {
        self.providers.contains(actor)
    }

    pub fn roles(&self, actor: &ActorId) -> ActorRoles {
        ActorRoles {
            is_owner: self.is_owner(actor),
            is_provider: self.is_provider(actor),
        }
    }

    pub fn providers(&self) -> Vec<ActorId> {
        self.providers.iter().cloned().collect()
    }

    pub fn require_owner(&self, caller: &ActorId) -> RegistryResult<()> {
        if !self.is_owner(caller) {
            return Err(RegistryError::NotAuthorized {
                actor: caller.clone(),
                required: ROLE_OWNER,
            });
        }
        Ok(())
    }

    pub fn require_provider(&self, caller: &ActorId) -> RegistryResult<()> {
        if !self.is_provider(caller) {
            return Err(RegistryError::NotAuthorized {
                actor: caller.clone(),
                required: ROLE_PROVIDER,
            });
        }
        Ok(())
    }

    pub fn transfer_ownership(
        &mut self,
        caller: &ActorId,
        new_owner: ActorId,
    ) -> RegistryResult<RegistryEvent> {
        self.require_owner(caller)?;
        let previous_owner = std::mem::replace(&mut self.owner, new_owner.clone());
        Ok(RegistryEvent::OwnershipTransferred {
            previous_owner,
            new_owner,
        })
    }

    pub fn add_provider(
        &mut self,
        caller: &ActorId,
        provider: ActorId,
    ) -> RegistryResult<RegistryEvent> {
        self.require_owner(caller)?;
        self.providers.insert(provider.clone());
        Ok(RegistryEvent::ProviderAdded { provider })
    }

    pub fn remove_provider(
        &mut self,
        caller: &ActorId,
        provider: ActorId,
    ) -> RegistryResult<RegistryEvent> {
        self.require_owner(caller)?;
        self.providers.remove(&provider);
        Ok(RegistryEvent::ProviderRemoved { provider })
    }
}
