#![forbid(unsafe_code)]

use cadastre_engines::oracle_local::LocalDecryptionOracle;
use cadastre_kernel_contracts::disclosure::{Attestation, Cleartexts, RequestId};
use cadastre_kernel_contracts::parcel::CiphertextHandle;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("oracle rejected the job: {0}")]
    Rejected(String),
    #[error("oracle unavailable: {0}")]
    Unavailable(String),
}

/// Off-ledger decryption capability. Delivers results later through
/// [`crate::RegistryRuntime::on_oracle_callback`].
pub trait DecryptionOracle {
    /// Submits the handles in dispatch order and returns an unpredictable request id.
    fn dispatch(&mut self, ordered_handles: &[CiphertextHandle]) -> Result<RequestId, OracleError>;

    fn verify(&self, request_id: &RequestId, cleartexts: &Cleartexts, attestation: &Attestation)
        -> bool;
}

impl DecryptionOracle for LocalDecryptionOracle {
    fn dispatch(&mut self, ordered_handles: &[CiphertextHandle]) -> Result<RequestId, OracleError> {
        self.dispatch_job(ordered_handles)
            .map_err(|e| OracleError::Rejected(e.to_string()))
    }

    fn verify(
        &self,
        request_id: &RequestId,
        cleartexts: &Cleartexts,
        attestation: &Attestation,
    ) -> bool {
        self.verify_attestation(request_id, cleartexts, attestation)
    }
}
