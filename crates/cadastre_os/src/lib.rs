#![forbid(unsafe_code)]

pub mod admin;
pub mod config;
pub mod oracle;
pub mod registry_runtime;

pub use config::RegistryConfig;
pub use oracle::{DecryptionOracle, OracleError};
pub use registry_runtime::RegistryRuntime;
