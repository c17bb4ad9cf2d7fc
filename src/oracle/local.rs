//! In-process encryption oracle.
//!
//! Holds plaintexts in memory behind opaque handles. Handles and input
//! proofs are SHA-256 derivations, so they are unpredictable to callers
//! but reproducible by the oracle. Used by tests and the demo server.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use alloy_primitives::B256;
use async_trait::async_trait;
use tracing::debug;

use crate::core::hash::DigestHasher;
use crate::game::encrypted::CiphertextHandle;
use crate::game::state::Identity;
use crate::network::auth::{validate_authorization, validate_authorization_at, AuthConfig};

use super::{
    DecryptRequest, EncryptRequest, EncryptTarget, EncryptedInput, EncryptionOracle, InputProof,
    InputVerifier, OracleError,
};

const HANDLE_DOMAIN: &[u8] = b"CONFIDENTIAL_BOMB_HANDLE_V1";
const PROOF_DOMAIN: &[u8] = b"CONFIDENTIAL_BOMB_INPUT_PROOF_V1";

#[derive(Debug)]
struct StoredCiphertext {
    value: u64,
    contract: Identity,
    acl: BTreeSet<Identity>,
}

#[derive(Debug, Default)]
struct OracleState {
    nonce: u64,
    ciphertexts: BTreeMap<CiphertextHandle, StoredCiphertext>,
}

/// In-memory oracle.
///
/// Cloning shares the same ciphertext table.
#[derive(Clone)]
pub struct LocalOracle {
    auth: AuthConfig,
    state: Arc<Mutex<OracleState>>,
    /// Fixed clock for authorization windows, if set.
    clock: Option<u64>,
}

impl LocalOracle {
    /// Create an oracle that checks authorizations with `auth`.
    pub fn new(auth: AuthConfig) -> Self {
        Self {
            auth,
            state: Arc::new(Mutex::new(OracleState::default())),
            clock: None,
        }
    }

    /// Validate authorization windows at a fixed Unix time.
    pub fn with_clock(mut self, now: u64) -> Self {
        self.clock = Some(now);
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, OracleState>, OracleError> {
        self.state
            .lock()
            .map_err(|_| OracleError::Unavailable("oracle state lock poisoned".into()))
    }

    /// Let `identity` decrypt `handle`.
    pub fn grant_access(&self, handle: &CiphertextHandle, identity: Identity) -> Result<(), OracleError> {
        let mut state = self.lock()?;
        let stored = state
            .ciphertexts
            .get_mut(handle)
            .ok_or(OracleError::UnknownHandle(*handle))?;
        stored.acl.insert(identity);
        Ok(())
    }

    /// Let `identity` decrypt every handle in `handles`.
    pub fn grant_access_all(
        &self,
        handles: &[CiphertextHandle],
        identity: Identity,
    ) -> Result<(), OracleError> {
        handles
            .iter()
            .try_for_each(|handle| self.grant_access(handle, identity))
    }

    /// Number of ciphertexts held.
    pub fn ciphertext_count(&self) -> usize {
        self.lock().map(|s| s.ciphertexts.len()).unwrap_or(0)
    }
}

fn derive_handle(target: &EncryptTarget, nonce: u64, index: usize) -> CiphertextHandle {
    let mut hasher = DigestHasher::new(HANDLE_DOMAIN);
    hasher.update_address(&target.contract.address());
    hasher.update_address(&target.user.address());
    hasher.update_u64(nonce);
    hasher.update_u64(index as u64);
    CiphertextHandle::new(B256::from(hasher.finalize()))
}

fn derive_proof(target: &EncryptTarget, handles: &[CiphertextHandle]) -> InputProof {
    let mut hasher = DigestHasher::new(PROOF_DOMAIN);
    hasher.update_address(&target.contract.address());
    hasher.update_address(&target.user.address());
    hasher.update_u32(handles.len() as u32);
    for handle in handles {
        hasher.update_word(&handle.word());
    }
    InputProof::new(hasher.finalize().to_vec())
}

#[async_trait]
impl EncryptionOracle for LocalOracle {
    async fn encrypt(&self, request: EncryptRequest) -> Result<EncryptedInput, OracleError> {
        if request.values.is_empty() {
            return Err(OracleError::EmptyRequest);
        }

        let mut state = self.lock()?;
        let nonce = state.nonce;
        state.nonce += 1;

        let handles: Vec<_> = request
            .values
            .iter()
            .enumerate()
            .map(|(index, value)| {
                let handle = derive_handle(&request.target, nonce, index);
                state.ciphertexts.insert(
                    handle,
                    StoredCiphertext {
                        value: *value,
                        contract: request.target.contract,
                        acl: BTreeSet::from([request.target.user]),
                    },
                );
                handle
            })
            .collect();

        debug!(
            contract = %request.target.contract,
            user = %request.target.user,
            handles = handles.len(),
            "Encrypted input"
        );

        let proof = derive_proof(&request.target, &handles);
        Ok(EncryptedInput { handles, proof })
    }

    async fn decrypt(
        &self,
        request: DecryptRequest,
    ) -> Result<BTreeMap<CiphertextHandle, u64>, OracleError> {
        if request.handles.is_empty() {
            return Err(OracleError::EmptyRequest);
        }

        let claims = match self.clock {
            Some(now) => validate_authorization_at(&request.authorization, &self.auth, now)?,
            None => validate_authorization(&request.authorization, &self.auth)?,
        };
        if !claims.covers(&request.contract) {
            return Err(OracleError::ContractNotAuthorized(request.contract));
        }

        let requester = request.authorization.requester;
        let state = self.lock()?;
        let mut plaintexts = BTreeMap::new();
        for handle in &request.handles {
            let stored = state
                .ciphertexts
                .get(handle)
                .ok_or(OracleError::UnknownHandle(*handle))?;
            if stored.contract != request.contract || !stored.acl.contains(&requester) {
                return Err(OracleError::AccessDenied {
                    handle: *handle,
                    requester,
                });
            }
            plaintexts.insert(*handle, stored.value);
        }

        debug!(requester = %requester, handles = plaintexts.len(), "Decrypted handles");
        Ok(plaintexts)
    }
}

impl InputVerifier for LocalOracle {
    fn verify_input(
        &self,
        target: &EncryptTarget,
        handles: &[CiphertextHandle],
        proof: &InputProof,
    ) -> Result<(), OracleError> {
        if handles.is_empty() {
            return Err(OracleError::EmptyRequest);
        }
        if derive_proof(target, handles) != *proof {
            return Err(OracleError::InvalidProof("proof does not bind handles to target".into()));
        }

        let state = self.lock()?;
        for handle in handles {
            let stored = state
                .ciphertexts
                .get(handle)
                .ok_or(OracleError::UnknownHandle(*handle))?;
            if stored.contract != target.contract {
                return Err(OracleError::InvalidProof(format!(
                    "handle {handle} belongs to another contract"
                )));
            }
        }
        Ok(())
    }
}
