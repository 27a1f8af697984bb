#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::common::opaque_bytes32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub u64);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

opaque_bytes32!(
    /// Opaque reference to a value held by the encryption subsystem. Never plaintext.
    CiphertextHandle,
    "ciphertext_handle"
);

/// Ciphertext handles stored for one parcel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParcelHandles {
    pub identity: CiphertextHandle,
    pub x: CiphertextHandle,
    pub y: CiphertextHandle,
}

impl ParcelHandles {
    pub fn new(identity: CiphertextHandle, x: CiphertextHandle, y: CiphertextHandle) -> Self {
        Self { identity, x, y }
    }

    /// Fixed dispatch order: identity, x, y.
    pub fn ordered(&self) -> [CiphertextHandle; 3] {
        [self.identity, self.x, self.y]
    }
}

/// Disclosed plaintext values, decoded in dispatch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParcelPlaintext {
    pub identity: u64,
    pub x: u64,
    pub y: u64,
}
