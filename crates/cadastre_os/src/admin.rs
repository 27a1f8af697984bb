#![forbid(unsafe_code)]

use cadastre_kernel_contracts::actor::ActorId;
use cadastre_kernel_contracts::event::RegistryEvent;
use cadastre_kernel_contracts::{LedgerTimeSecs, RegistryResult};

use crate::oracle::DecryptionOracle;
use crate::registry_runtime::RegistryRuntime;

// Owner-only operations. Authorization is checked before the pause flag so a non-owner always
// sees NotAuthorized.
impl<O> RegistryRuntime<O>
where
    O: DecryptionOracle,
{
    pub fn pause(&mut self, caller: &ActorId, now: LedgerTimeSecs) -> RegistryResult<RegistryEvent> {
        let result = self.access.require_owner(caller).and_then(|()| {
            self.require_not_paused()?;
            self.paused = true;
            Ok(RegistryEvent::Paused { by: caller.clone() })
        });
        self.finish("pause", now, result)
    }

    /// Accepted whether or not the registry is currently paused.
    pub fn unpause(
        &mut self,
        caller: &ActorId,
        now: LedgerTimeSecs,
    ) -> RegistryResult<RegistryEvent> {
        let result = self.access.require_owner(caller).map(|()| {
            self.paused = false;
            RegistryEvent::Unpaused { by: caller.clone() }
        });
        self.finish("unpause", now, result)
    }

    /// Applies to subsequent throttle checks only; existing stamps are kept.
    pub fn set_cooldown(
        &mut self,
        caller: &ActorId,
        cooldown_secs: u64,
        now: LedgerTimeSecs,
    ) -> RegistryResult<RegistryEvent> {
        let result = self.access.require_owner(caller).and_then(|()| {
            self.require_not_paused()?;
            self.cooldown_secs = cooldown_secs;
            Ok(RegistryEvent::CooldownUpdated { cooldown_secs })
        });
        self.finish("set_cooldown", now, result)
    }

    pub fn transfer_ownership(
        &mut self,
        caller: &ActorId,
        new_owner: ActorId,
        now: LedgerTimeSecs,
    ) -> RegistryResult<RegistryEvent> {
        let result = self.access.transfer_ownership(caller, new_owner);
        self.finish("transfer_ownership", now, result)
    }

    pub fn add_provider(
        &mut self,
        caller: &ActorId,
        provider: ActorId,
        now: LedgerTimeSecs,
    ) -> RegistryResult<RegistryEvent> {
        let result = self.access.add_provider(caller, provider);
        self.finish("add_provider", now, result)
    }

    pub fn remove_provider(
        &mut self,
        caller: &ActorId,
        provider: ActorId,
        now: LedgerTimeSecs,
    ) -> RegistryResult<RegistryEvent> {
        let result = self.access.remove_provider(caller, provider);
        self.finish("remove_provider", now, result)
    }

    pub fn open_batch(
        &mut self,
        caller: &ActorId,
        now: LedgerTimeSecs,
    ) -> RegistryResult<RegistryEvent> {
        let result = self.access.require_owner(caller).and_then(|()| {
            self.require_not_paused()?;
            Ok(self.batch.open_batch())
        });
        self.finish("open_batch", now, result)
    }

    pub fn close_batch(
        &mut self,
        caller: &ActorId,
        now: LedgerTimeSecs,
    ) -> RegistryResult<RegistryEvent> {
        let result = self.access.require_owner(caller).and_then(|()| {
            self.require_not_paused()?;
            Ok(self.batch.close_batch())
        });
        self.finish("close_batch", now, result)
    }
}
