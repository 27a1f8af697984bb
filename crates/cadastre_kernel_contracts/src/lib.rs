#![forbid(unsafe_code)]

pub mod common;
pub mod actor;
pub mod batch;
pub mod disclosure;
pub mod error;
pub mod event;
pub mod parcel;

pub use common::{ContractViolation, LedgerTimeSecs, ReasonCodeId, SchemaVersion, Validate};
pub use error::{RegistryError, RegistryResult};
