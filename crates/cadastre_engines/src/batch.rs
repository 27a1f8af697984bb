#![forbid(unsafe_code)]

use cadastre_kernel_contracts::batch::{BatchId, BatchState};
use cadastre_kernel_contracts::event::RegistryEvent;
use cadastre_kernel_contracts::{RegistryError, RegistryResult};

/// Cyclic Closed -> Open -> Closed batch lifecycle. The id only moves on open.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchLedger {
    state: BatchState,
}

impl BatchLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: BatchState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn current_id(&self) -> BatchId {
        self.state.id
    }

    pub fn is_open(&self) -> bool {
        self.state.open
    }

    pub fn require_open(&self) -> RegistryResult<BatchId> {
        if !self.state.open {
            return Err(RegistryError::BatchNotOpen);
        }
        Ok(self.state.id)
    }

    pub fn open_batch(&mut self) -> RegistryEvent {
        self.state.id = BatchId(self.state.id.0.saturating_add(1));
        self.state.open = true;
        RegistryEvent::BatchOpened {
            batch_id: self.state.id,
        }
    }

    pub fn close_batch(&mut self) -> RegistryEvent {
        self.state.open = false;
        RegistryEvent::BatchClosed {
            batch_id: self.state.id,
        }
    }
}
