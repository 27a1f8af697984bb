#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BatchId(pub u64);

pub const INITIAL_BATCH_ID: BatchId = BatchId(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchState {
    pub id: BatchId,
    pub open: bool,
}

impl BatchState {
    pub fn initial() -> Self {
        Self {
            id: INITIAL_BATCH_ID,
            open: false,
        }
    }
}

impl Default for BatchState {
    fn default() -> Self {
        Self::initial()
    }
}
