//! Game Commitment Protocol
//!
//! The creator commits to `(seed, player, boardSize)` before any tile is
//! opened and reveals the seed after the game ends.
//!
//! `commit = keccak256(abi.encode(uint256 seed, address player, uint8 boardSize))`
//!
//! The encoding is three fixed 32-byte words, so commitments computed by
//! EVM clients verify here byte-for-byte. The board content is not part
//! of the commitment.

use serde::{Deserialize, Serialize};

use crate::core::hash::AbiEncoder;
use crate::game::state::{CommitHash, Identity, Seed};

/// Words in the commitment preimage.
const COMMITMENT_WORDS: usize = 3;

/// Compute the commitment for a preimage.
pub fn commit(seed: &Seed, player: &Identity, board_size: u8) -> CommitHash {
    let mut encoder = AbiEncoder::with_words(COMMITMENT_WORDS);
    encoder
        .push_uint256(seed.value())
        .push_address(player.address())
        .push_uint8(board_size);
    CommitHash::new(encoder.keccak256())
}

/// Recompute and compare byte-for-byte.
pub fn verify(hash: &CommitHash, seed: &Seed, player: &Identity, board_size: u8) -> bool {
    commit(seed, player, board_size) == *hash
}

/// Verify against a hex commitment in any case. Malformed hex never matches.
pub fn verify_hex(hash_hex: &str, seed: &Seed, player: &Identity, board_size: u8) -> bool {
    match hash_hex.parse::<CommitHash>() {
        Ok(hash) => verify(&hash, seed, player, board_size),
        Err(_) => false,
    }
}

/// Commitment preimage as published after the reveal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitmentPreimage {
    /// Secret seed.
    pub seed: Seed,
    /// Creator identity.
    pub player: Identity,
    /// Tile count.
    pub board_size: u8,
}

impl CommitmentPreimage {
    /// Create a new preimage.
    pub fn new(seed: Seed, player: Identity, board_size: u8) -> Self {
        Self {
            seed,
            player,
            board_size,
        }
    }

    /// Commitment for this preimage.
    pub fn commitment(&self) -> CommitHash {
        commit(&self.seed, &self.player, self.board_size)
    }

    /// Does this preimage open `hash`?
    pub fn verify(&self, hash: &CommitHash) -> bool {
        verify(hash, &self.seed, &self.player, self.board_size)
    }
}
