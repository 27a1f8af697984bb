#![forbid(unsafe_code)]

pub mod error;
pub mod journal;
pub mod repo;
pub mod snapshot;

pub use error::StorageError;
