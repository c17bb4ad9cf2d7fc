//! Protocol Messages
//!
//! JSON bodies for the verification endpoint. Field names are camelCase
//! to match browser clients. Numeric fields accept either a JSON number
//! or a string.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::game::encrypted::CiphertextHandle;
use crate::game::state::{GameId, IdentifierError, Identity, Seed};
use crate::network::auth::DecryptAuthorization;
use crate::proof::commitment::CommitmentPreimage;

// =============================================================================
// REQUEST
// =============================================================================

/// Number given as a JSON number or a decimal/hex string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberOrString {
    /// JSON number.
    Number(u64),
    /// String form.
    Text(String),
}

/// Request body for `POST /verify`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    /// Game to verify.
    #[serde(default)]
    pub game_id: Option<NumberOrString>,
    /// Published commitment preimage; asks for a commitment report.
    #[serde(default)]
    pub proof_json: Option<ProofJson>,
    /// Signed decrypt authorization; asks for a decrypted board report.
    #[serde(default)]
    pub authorization: Option<DecryptAuthorization>,
    /// Grid columns for the board report.
    #[serde(default)]
    pub cols: Option<usize>,
}

impl VerifyRequest {
    /// Parsed game id.
    pub fn game_id(&self) -> Result<GameId, ProtocolError> {
        match self.game_id.as_ref().ok_or(ProtocolError::MissingGameId)? {
            NumberOrString::Number(n) => Ok(GameId(*n)),
            NumberOrString::Text(s) => s
                .trim()
                .parse::<u64>()
                .map(GameId)
                .map_err(|_| ProtocolError::InvalidGameId(s.clone())),
        }
    }
}

/// Commitment preimage as sent by clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofJson {
    /// Seed, as number or string.
    pub seed: NumberOrString,
    /// Player identity.
    pub player: Identity,
    /// Tile count.
    pub board_size: u8,
}

impl ProofJson {
    /// Convert to a typed preimage.
    pub fn to_preimage(&self) -> Result<CommitmentPreimage, ProtocolError> {
        let seed = match &self.seed {
            NumberOrString::Number(n) => Seed::from(*n),
            NumberOrString::Text(s) => s.parse().map_err(ProtocolError::InvalidSeed)?,
        };
        Ok(CommitmentPreimage::new(seed, self.player, self.board_size))
    }
}

// =============================================================================
// RESPONSE
// =============================================================================

/// Ciphertexts of a game, for client-side decryption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CiphertextsResponse {
    /// Stored handles (one for packed boards).
    pub ciphertexts: Vec<CiphertextHandle>,
    /// Registry contract holding the handles.
    pub contract_address: Identity,
}

impl CiphertextsResponse {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Request parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// `gameId` absent.
    #[error("Missing gameId")]
    MissingGameId,
    /// `gameId` not an unsigned integer.
    #[error("Invalid gameId: {0}")]
    InvalidGameId(String),
    /// `proofJson.seed` not a 256-bit integer.
    #[error("Invalid seed: {0}")]
    InvalidSeed(IdentifierError),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;

    #[test]
    fn test_game_id_number_or_string() {
        let numeric: VerifyRequest = serde_json::from_str(r#"{"gameId": 3}"#).unwrap();
        assert_eq!(numeric.game_id().unwrap(), GameId(3));

        let text: VerifyRequest = serde_json::from_str(r#"{"gameId": "3"}"#).unwrap();
        assert_eq!(text.game_id().unwrap(), GameId(3));
    }

    #[test]
    fn test_missing_game_id() {
        let request: VerifyRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.game_id(), Err(ProtocolError::MissingGameId));
        assert_eq!(ProtocolError::MissingGameId.to_string(), "Missing gameId");
    }

    #[test]
    fn test_invalid_game_id() {
        let request: VerifyRequest = serde_json::from_str(r#"{"gameId": "abc"}"#).unwrap();
        assert!(matches!(request.game_id(), Err(ProtocolError::InvalidGameId(_))));
    }

    #[test]
    fn test_proof_json_seed_forms() {
        let player = "0x1111111111111111111111111111111111111111";
        let numeric: ProofJson = serde_json::from_str(&format!(
            r#"{{"seed": 123456, "player": "{player}", "boardSize": 5}}"#
        ))
        .unwrap();
        let text: ProofJson = serde_json::from_str(&format!(
            r#"{{"seed": "123456", "player": "{player}", "boardSize": 5}}"#
        ))
        .unwrap();

        assert_eq!(numeric.to_preimage().unwrap(), text.to_preimage().unwrap());
        assert_eq!(numeric.to_preimage().unwrap().seed, Seed::from(123456));
    }

    #[test]
    fn test_proof_json_bad_seed() {
        let proof = ProofJson {
            seed: NumberOrString::Text("not-a-number".into()),
            player: Identity::default(),
            board_size: 5,
        };
        assert!(matches!(proof.to_preimage(), Err(ProtocolError::InvalidSeed(_))));
    }

    #[test]
    fn test_ciphertexts_response_shape() {
        let response = CiphertextsResponse {
            ciphertexts: vec![CiphertextHandle::new(B256::repeat_byte(0xab))],
            contract_address: Identity::default(),
        };

        let value: serde_json::Value = serde_json::from_str(&response.to_json().unwrap()).unwrap();
        assert!(value["ciphertexts"][0].as_str().unwrap().starts_with("0xabab"));
        assert_eq!(
            value["contractAddress"],
            "0x0000000000000000000000000000000000000000"
        );
    }
}
