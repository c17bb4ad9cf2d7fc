//! Encryption Oracle
//!
//! The oracle encrypts plaintext for a `(contract, user)` target and later
//! releases plaintext to authorized requesters. Its cryptography is opaque;
//! the only contract is `decrypt(encrypt(v)) == v` with immutable handles.
//!
//! ## Structure
//!
//! - `EncryptionOracle`: async encrypt/decrypt, injected where needed
//! - `InputVerifier`: sync proof check run by the registry at creation
//! - `local`: in-process oracle for tests and the demo server
//! - `worker`: task that owns an oracle and serves encrypt requests

pub mod local;
pub mod worker;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::board::{Board, BoardError};
use crate::game::encrypted::{BoardEncoding, CiphertextHandle};
use crate::game::state::Identity;
use crate::network::auth::{AuthError, DecryptAuthorization};

pub use local::LocalOracle;
pub use worker::EncryptionWorker;

/// Proof blob binding handles to their encryption target.
#[derive(Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InputProof(Vec<u8>);

impl InputProof {
    /// Wrap raw bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<String> for InputProof {
    type Error = hex::FromHexError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let digits = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(digits).map(Self)
    }
}

impl From<InputProof> for String {
    fn from(proof: InputProof) -> Self {
        format!("0x{}", hex::encode(proof.0))
    }
}

impl fmt::Debug for InputProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InputProof(0x{})", hex::encode(&self.0))
    }
}

/// Contract and user a ciphertext is bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncryptTarget {
    /// Contract that will hold the handles.
    pub contract: Identity,
    /// User submitting the input.
    pub user: Identity,
}

/// Plaintext values to encrypt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptRequest {
    /// Binding target.
    pub target: EncryptTarget,
    /// One value per handle to produce.
    pub values: Vec<u64>,
}

impl EncryptRequest {
    /// Request for a board: one packed value, or one value per tile.
    pub fn for_board(target: EncryptTarget, board: &Board, packed: bool) -> Result<Self, BoardError> {
        let values = if packed {
            vec![board.pack()?]
        } else {
            board.to_values().into_iter().map(u64::from).collect()
        };
        Ok(Self { target, values })
    }
}

/// Result of an encryption.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedInput {
    /// One handle per input value, in order.
    pub handles: Vec<CiphertextHandle>,
    /// Proof checked by `InputVerifier`.
    pub proof: InputProof,
}

impl EncryptedInput {
    /// Build a board encoding from these handles.
    pub fn to_encoding(&self, packed: bool) -> Result<BoardEncoding, OracleError> {
        if packed {
            match self.handles.as_slice() {
                [handle] => Ok(BoardEncoding::Packed(*handle)),
                handles => Err(OracleError::InvalidProof(format!(
                    "packed board needs one handle, got {}",
                    handles.len()
                ))),
            }
        } else {
            Ok(BoardEncoding::PerTile(self.handles.clone()))
        }
    }
}

/// Request to release plaintext.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecryptRequest {
    /// Handles to decrypt.
    pub handles: Vec<CiphertextHandle>,
    /// Contract the handles belong to.
    pub contract: Identity,
    /// Signed authorization of the requester.
    pub authorization: DecryptAuthorization,
}

/// Oracle errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    /// Proof rejected.
    #[error("invalid input proof: {0}")]
    InvalidProof(String),
    /// Authorization rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(#[from] AuthError),
    /// Authorization does not cover the contract.
    #[error("authorization does not cover contract {0}")]
    ContractNotAuthorized(Identity),
    /// Requester not on the ciphertext's access list.
    #[error("{requester} may not decrypt {handle}")]
    AccessDenied {
        /// Ciphertext.
        handle: CiphertextHandle,
        /// Requester.
        requester: Identity,
    },
    /// Handle unknown to the oracle.
    #[error("unknown ciphertext handle {0}")]
    UnknownHandle(CiphertextHandle),
    /// Nothing to encrypt or decrypt.
    #[error("empty request")]
    EmptyRequest,
    /// Plaintext cannot be encrypted in the requested shape.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Encryption worker has shut down.
    #[error("encryption worker is gone")]
    WorkerGone,
    /// Transport or relayer failure.
    #[error("oracle unavailable: {0}")]
    Unavailable(String),
}

/// Encryption oracle client.
#[async_trait]
pub trait EncryptionOracle: Send + Sync {
    /// Encrypt values for a target.
    async fn encrypt(&self, request: EncryptRequest) -> Result<EncryptedInput, OracleError>;

    /// Decrypt handles for an authorized requester.
    async fn decrypt(
        &self,
        request: DecryptRequest,
    ) -> Result<BTreeMap<CiphertextHandle, u64>, OracleError>;
}

/// Proof check for freshly encrypted input.
pub trait InputVerifier: Send + Sync {
    /// Accept or reject `proof` for `handles` bound to `target`.
    fn verify_input(
        &self,
        target: &EncryptTarget,
        handles: &[CiphertextHandle],
        proof: &InputProof,
    ) -> Result<(), OracleError>;
}
