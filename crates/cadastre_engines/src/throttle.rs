#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use cadastre_kernel_contracts::actor::{ActionKind, ActorId};
use cadastre_kernel_contracts::{LedgerTimeSecs, RegistryError, RegistryResult};

/// Proof that a throttle check passed; consumed by [`ThrottleGuard::commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct ThrottleStamp {
    actor: ActorId,
    kind: ActionKind,
    at: LedgerTimeSecs,
}

/// Per-(actor, action kind) cooldown enforcement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThrottleGuard {
    last_action: BTreeMap<(ActorId, ActionKind), LedgerTimeSecs>,
}

impl ThrottleGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: impl IntoIterator<Item = (ActorId, ActionKind, LedgerTimeSecs)>) -> Self {
        Self {
            last_action: rows
                .into_iter()
                .map(|(actor, kind, at)| ((actor, kind), at))
                .collect(),
        }
    }

    pub fn rows(&self) -> Vec<(ActorId, ActionKind, LedgerTimeSecs)> {
        self.last_action
            .iter()
            .map(|((actor, kind), at)| (actor.clone(), *kind, *at))
            .collect()
    }

    pub fn last_action(&self, actor: &ActorId, kind: ActionKind) -> Option<LedgerTimeSecs> {
        self.last_action.get(&(actor.clone(), kind)).copied()
    }

    pub fn cooldown_remaining(
        &self,
        actor: &ActorId,
        kind: ActionKind,
        now: LedgerTimeSecs,
        cooldown_secs: u64,
    ) -> u64 {
        match self.last_action(actor, kind) {
            Some(last) => last
                .saturating_add_secs(cooldown_secs)
                .0
                .saturating_sub(now.0),
            None => 0,
        }
    }

    /// Checks admission without recording anything.
    pub fn check(
        &self,
        actor: &ActorId,
        kind: ActionKind,
        now: LedgerTimeSecs,
        cooldown_secs: u64,
    ) -> RegistryResult<ThrottleStamp> {
        let remaining_secs = self.cooldown_remaining(actor, kind, now, cooldown_secs);
        if remaining_secs > 0 {
            return Err(RegistryError::CooldownActive {
                actor: actor.clone(),
                kind,
                remaining_secs,
            });
        }
        Ok(ThrottleStamp {
            actor: actor.clone(),
            kind,
            at: now,
        })
    }

    pub fn commit(&mut self, stamp: ThrottleStamp) {
        self.last_action.insert((stamp.actor, stamp.kind), stamp.at);
    }

    pub fn check_and_stamp(
        &mut self,
        actor: &ActorId,
        kind: ActionKind,
        now: LedgerTimeSecs,
        cooldown_secs: u64,
    ) -> RegistryResult<()> {
        let stamp = self.check(actor, kind, now, cooldown_secs)?;
        self.commit(stamp);
        Ok(())
    }
}
