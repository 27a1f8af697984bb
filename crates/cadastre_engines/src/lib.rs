#![forbid(unsafe_code)]

pub mod access;
pub mod batch;
pub mod disclosure;
pub mod oracle_local;
pub mod registry;
pub mod throttle;
