#![forbid(unsafe_code)]

//! In-process stand-in for the external decryption oracle.
//!
//! Values are sealed with AES-256-GCM and referenced by a 32-byte handle. Decryption jobs get
//! a random request id; fulfilled jobs carry an Ed25519 attestation over the request id and
//! the encoded cleartexts.

use std::collections::BTreeMap;

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use cadastre_kernel_contracts::disclosure::{Attestation, Cleartexts, RequestId};
use cadastre_kernel_contracts::parcel::{CiphertextHandle, ParcelPlaintext};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

pub const HANDLE_DOMAIN_TAG: &[u8] = b"cadastre.oracle.handle.v1";
pub const ATTESTATION_DOMAIN_TAG: &[u8] = b"cadastre.oracle.attestation.v1";

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const JOB_HANDLE_COUNT: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalOracleError {
    UnknownHandle(CiphertextHandle),
    UnknownRequest(RequestId),
    InvalidJobShape { expected: usize, got: usize },
    Crypto,
}

impl std::fmt::Display for LocalOracleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownHandle(handle) => write!(f, "unknown ciphertext handle: {handle}"),
            Self::UnknownRequest(id) => write!(f, "unknown decryption request: {id}"),
            Self::InvalidJobShape { expected, got } => {
                write!(f, "decryption job must carry {expected} handles, got {got}")
            }
            Self::Crypto => write!(f, "oracle cryptographic operation failed"),
        }
    }
}

impl std::error::Error for LocalOracleError {}

#[derive(Debug, Clone)]
struct SealedValue {
    nonce: [u8; NONCE_LEN],
    ciphertext: Vec<u8>,
}

pub struct LocalDecryptionOracle {
    cipher_key: [u8; KEY_LEN],
    signing_key: SigningKey,
    sealed: BTreeMap<CiphertextHandle, SealedValue>,
    jobs: BTreeMap<RequestId, Vec<CiphertextHandle>>,
}

impl std::fmt::Debug for LocalDecryptionOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalDecryptionOracle")
            .field("verifying_key", &self.verifying_key_hex())
            .field("sealed", &self.sealed.len())
            .field("jobs", &self.jobs.len())
            .finish()
    }
}

impl LocalDecryptionOracle {
    pub fn new_random() -> Self {
        let mut cipher_key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut cipher_key);
        let mut signing_seed = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut signing_seed);
        Self::from_keys(cipher_key, signing_seed)
    }

    pub fn from_keys(cipher_key: [u8; KEY_LEN], signing_seed: [u8; KEY_LEN]) -> Self {
        Self {
            cipher_key,
            signing_key: SigningKey::from_bytes(&signing_seed),
            sealed: BTreeMap::new(),
            jobs: BTreeMap::new(),
        }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub fn verifying_key_hex(&self) -> String {
        hex::encode(self.verifying_key().to_bytes())
    }

    pub fn outstanding_jobs(&self) -> Vec<RequestId> {
        self.jobs.keys().copied().collect()
    }

    pub fn encrypt_u64(&mut self, value: u64) -> Result<CiphertextHandle, LocalOracleError> {
        let cipher = self.cipher()?;
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), value.to_be_bytes().as_ref())
            .map_err(|_| LocalOracleError::Crypto)?;

        let mut hasher = Sha256::new();
        hasher.update(HANDLE_DOMAIN_TAG);
        hasher.update(nonce);
        hasher.update(&ciphertext);
        let handle = CiphertextHandle::from_bytes(hasher.finalize().into());
        self.sealed.insert(handle, SealedValue { nonce, ciphertext });
        Ok(handle)
    }

    pub fn dispatch_job(
        &mut self,
        ordered_handles: &[CiphertextHandle],
    ) -> Result<RequestId, LocalOracleError> {
        if ordered_handles.len() != JOB_HANDLE_COUNT {
            return Err(LocalOracleError::InvalidJobShape {
                expected: JOB_HANDLE_COUNT,
                got: ordered_handles.len(),
            });
        }
        if let Some(missing) = ordered_handles
            .iter()
            .find(|handle| !self.sealed.contains_key(handle))
        {
            return Err(LocalOracleError::UnknownHandle(*missing));
        }
        let request_id = loop {
            let mut raw = [0u8; 32];
            OsRng.fill_bytes(&mut raw);
            let candidate = RequestId::from_bytes(raw);
            if !self.jobs.contains_key(&candidate) {
                break candidate;
            }
        };
        self.jobs.insert(request_id, ordered_handles.to_vec());
        Ok(request_id)
    }

    /// Decrypts a dispatched job and attests the result. The job stays on file so the same
    /// answer can be delivered again.
    pub fn fulfill(
        &self,
        request_id: &RequestId,
    ) -> Result<(Cleartexts, Attestation), LocalOracleError> {
        let handles = self
            .jobs
            .get(request_id)
            .ok_or(LocalOracleError::UnknownRequest(*request_id))?;
        let mut values = [0u64; JOB_HANDLE_COUNT];
        for (slot, handle) in values.iter_mut().zip(handles.iter()) {
            *slot = self.decrypt_u64(handle)?;
        }
        let cleartexts = Cleartexts::encode(&ParcelPlaintext {
            identity: values[0],
            x: values[1],
            y: values[2],
        });
        let signature = self
            .signing_key
            .sign(&attestation_message(request_id, &cleartexts));
        Ok((cleartexts, Attestation::from_bytes(signature.to_bytes().to_vec())))
    }

    pub fn verify_attestation(
        &self,
        request_id: &RequestId,
        cleartexts: &Cleartexts,
        attestation: &Attestation,
    ) -> bool {
        let Ok(signature) = Signature::from_slice(attestation.as_bytes()) else {
            return false;
        };
        self.verifying_key()
            .verify(&attestation_message(request_id, cleartexts), &signature)
            .is_ok()
    }

    fn decrypt_u64(&self, handle: &CiphertextHandle) -> Result<u64, LocalOracleError> {
        let sealed = self
            .sealed
            .get(handle)
            .ok_or(LocalOracleError::UnknownHandle(*handle))?;
        let plaintext = self
            .cipher()?
            .decrypt(Nonce::from_slice(&sealed.nonce), sealed.ciphertext.as_ref())
            .map_err(|_| LocalOracleError::Crypto)?;
        let bytes: [u8; 8] = plaintext
            .as_slice()
            .try_into()
            .map_err(|_| LocalOracleError::Crypto)?;
        Ok(u64::from_be_bytes(bytes))
    }

    fn cipher(&self) -> Result<Aes256Gcm, LocalOracleError> {
        Aes256Gcm::new_from_slice(&self.cipher_key).map_err(|_| LocalOracleError::Crypto)
    }
}

fn attestation_message(request_id: &RequestId, cleartexts: &Cleartexts) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(ATTESTATION_DOMAIN_TAG);
    hasher.update(request_id.as_bytes());
    hasher.update((cleartexts.as_bytes().len() as u32).to_be_bytes());
    hasher.update(cleartexts.as_bytes());
    hasher.finalize().to_vec()
}
