//! Ledger Journal
//!
//! Append-only record of accepted registry transitions. Replaying a journal
//! through the same transition code rebuilds the registry exactly, down to
//! its state root.
//!
//! Wire format is bincode with a leading version byte.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::board::BoardDisclosure;
use crate::game::encrypted::BoardEncoding;
use crate::game::registry::{GameRegistry, RegistryError};
use crate::game::state::{CommitHash, GameId, Identity, Seed};
use crate::oracle::{InputProof, InputVerifier};

/// Current journal format version.
pub const JOURNAL_VERSION: u8 = 1;

/// One registry transition, as submitted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transition {
    /// Create a game with a committed, encrypted board.
    CreateGame {
        /// Ciphertext layout.
        #[serde(with = "encoding_wire")]
        encoding: BoardEncoding,
        /// Oracle input proof.
        proof: InputProof,
        /// Commitment over `(seed, owner, boardSize)`.
        commit_hash: CommitHash,
        /// Tile count.
        board_size: u8,
    },
    /// Mark a tile opened.
    PickTile {
        /// Game.
        game_id: GameId,
        /// Tile index.
        index: usize,
    },
    /// End the game.
    EndGame {
        /// Game.
        game_id: GameId,
    },
    /// Reveal the committed seed.
    RevealSeed {
        /// Game.
        game_id: GameId,
        /// Seed.
        seed: Seed,
    },
    /// Disclose the plaintext board.
    RevealGame {
        /// Game.
        game_id: GameId,
        /// Plaintext board.
        #[serde(with = "disclosure_wire")]
        disclosure: BoardDisclosure,
    },
}

// Bincode cannot read the adjacently tagged JSON form of these enums, so
// journal entries store them externally tagged.

mod encoding_wire {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::game::encrypted::{BoardEncoding, CiphertextHandle};

    #[derive(Serialize, Deserialize)]
    enum Wire {
        Packed(CiphertextHandle),
        PerTile(Vec<CiphertextHandle>),
    }

    pub fn serialize<S: Serializer>(encoding: &BoardEncoding, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match encoding {
            BoardEncoding::Packed(handle) => Wire::Packed(*handle),
            BoardEncoding::PerTile(handles) => Wire::PerTile(handles.clone()),
        };
        wire.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BoardEncoding, D::Error> {
        Ok(match Wire::deserialize(deserializer)? {
            Wire::Packed(handle) => BoardEncoding::Packed(handle),
            Wire::PerTile(handles) => BoardEncoding::PerTile(handles),
        })
    }
}

mod disclosure_wire {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::core::board::BoardDisclosure;

    #[derive(Serialize, Deserialize)]
    enum Wire {
        Packed(u64),
        Tiles(Vec<u8>),
    }

    pub fn serialize<S: Serializer>(disclosure: &BoardDisclosure, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match disclosure {
            BoardDisclosure::Packed(value) => Wire::Packed(*value),
            BoardDisclosure::Tiles(values) => Wire::Tiles(values.clone()),
        };
        wire.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BoardDisclosure, D::Error> {
        Ok(match Wire::deserialize(deserializer)? {
            Wire::Packed(value) => BoardDisclosure::Packed(value),
            Wire::Tiles(values) => BoardDisclosure::Tiles(values),
        })
    }
}

impl Transition {
    /// Target game; `None` for creation (id is assigned on apply).
    pub fn game_id(&self) -> Option<GameId> {
        match self {
            Transition::CreateGame { .. } => None,
            Transition::PickTile { game_id, .. }
            | Transition::EndGame { game_id }
            | Transition::RevealSeed { game_id, .. }
            | Transition::RevealGame { game_id, .. } => Some(*game_id),
        }
    }

    /// Operation name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Transition::CreateGame { .. } => "create_game",
            Transition::PickTile { .. } => "pick_tile",
            Transition::EndGame { .. } => "end_game",
            Transition::RevealSeed { .. } => "reveal_seed",
            Transition::RevealGame { .. } => "reveal_game",
        }
    }
}

/// Accepted transition with ordering metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Position in the journal, from 0.
    pub sequence: u64,
    /// Identity that submitted the transition.
    pub caller: Identity,
    /// Unix timestamp of acceptance.
    pub timestamp: i64,
    /// The transition.
    pub transition: Transition,
}

/// Journal codec errors.
#[derive(Debug, Error)]
pub enum JournalError {
    /// No bytes.
    #[error("journal is empty")]
    Empty,
    /// Unknown format version.
    #[error("unsupported journal version {got} (expected {expected})")]
    UnsupportedVersion {
        /// Supported version.
        expected: u8,
        /// Version found.
        got: u8,
    },
    /// Serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(String),
    /// Deserialization failed.
    #[error("deserialization failed: {0}")]
    DeserializationFailed(String),
    /// File access failed.
    #[error("journal io: {0}")]
    Io(#[from] std::io::Error),
}

/// Replay errors.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// Entry sequence numbers are not contiguous.
    #[error("entry {position} has sequence {got}")]
    OutOfOrder {
        /// Index in the entry list.
        position: usize,
        /// Sequence found.
        got: u64,
    },
    /// Registry rejected an entry.
    #[error("entry {sequence} ({operation}) rejected: {source}")]
    Rejected {
        /// Sequence of the rejected entry.
        sequence: u64,
        /// Operation name.
        operation: &'static str,
        /// Registry error.
        #[source]
        source: RegistryError,
    },
}

/// Append-only transition log for one registry contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerJournal {
    /// Format version.
    pub version: u8,
    /// Registry contract identity.
    pub contract: Identity,
    /// Accepted transitions in order.
    pub entries: Vec<JournalEntry>,
}

impl LedgerJournal {
    /// Empty journal for `contract`.
    pub fn new(contract: Identity) -> Self {
        Self {
            version: JOURNAL_VERSION,
            contract,
            entries: Vec::new(),
        }
    }

    /// Append an accepted transition. Returns its sequence.
    pub fn append(&mut self, caller: Identity, timestamp: i64, transition: Transition) -> u64 {
        let sequence = self.entries.len() as u64;
        self.entries.push(JournalEntry {
            sequence,
            caller,
            timestamp,
            transition,
        });
        sequence
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries touching `game_id`, including its creation.
    pub fn entries_for(&self, game_id: GameId) -> impl Iterator<Item = &JournalEntry> + '_ {
        let mut created = 0u64;
        self.entries.iter().filter(move |entry| match entry.transition.game_id() {
            Some(id) => id == game_id,
            None => {
                let this = GameId(created);
                created += 1;
                this == game_id
            }
        })
    }

    /// Serialize to bytes using bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>, JournalError> {
        bincode::serialize(self).map_err(|e| JournalError::SerializationFailed(e.to_string()))
    }

    /// Deserialize from bytes, checking the version first.
    pub fn from_bytes(data: &[u8]) -> Result<Self, JournalError> {
        let version = *data.first().ok_or(JournalError::Empty)?;
        if version != JOURNAL_VERSION {
            return Err(JournalError::UnsupportedVersion {
                expected: JOURNAL_VERSION,
                got: version,
            });
        }
        bincode::deserialize(data).map_err(|e| JournalError::DeserializationFailed(e.to_string()))
    }

    /// Read a journal file.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, JournalError> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    /// Write a journal file.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<(), JournalError> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }
}

/// Rebuild a registry by re-applying every entry in order.
///
/// Journaled creations are not re-verified. `verifier` checks creations
/// made on the rebuilt registry afterwards.
pub fn replay(
    journal: &LedgerJournal,
    verifier: Arc<dyn InputVerifier>,
) -> Result<GameRegistry, ReplayError> {
    let mut registry = GameRegistry::new(journal.contract, verifier);

    for (position, entry) in journal.entries.iter().enumerate() {
        if entry.sequence != position as u64 {
            return Err(ReplayError::OutOfOrder {
                position,
                got: entry.sequence,
            });
        }

        registry
            .apply_replayed(&entry.caller, entry.transition.clone(), entry.timestamp)
            .map_err(|source| ReplayError::Rejected {
                sequence: entry.sequence,
                operation: entry.transition.name(),
                source,
            })?;
    }

    Ok(registry)
}
