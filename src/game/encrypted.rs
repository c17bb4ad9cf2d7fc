//! Encrypted Board Store
//!
//! Per-game storage of ciphertext handles. Each game's encoding is written
//! once at creation and never replaced. There is no update or delete.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

use crate::core::hash::DigestHasher;
use crate::game::state::{format_word, parse_word, GameId, IdentifierError};

/// Opaque reference to a value held by the encryption oracle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CiphertextHandle(B256);

impl CiphertextHandle {
    /// Wrap a word.
    pub const fn new(word: B256) -> Self {
        Self(word)
    }

    /// Underlying word.
    pub const fn word(&self) -> B256 {
        self.0
    }
}

impl FromStr for CiphertextHandle {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_word(s).map(Self)
    }
}

impl TryFrom<String> for CiphertextHandle {
    type Error = IdentifierError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<CiphertextHandle> for String {
    fn from(handle: CiphertextHandle) -> Self {
        format_word(&handle.0)
    }
}

impl fmt::Display for CiphertextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_word(&self.0))
    }
}

/// How a board's ciphertext is laid out. Chosen at creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "handles", rename_all = "snake_case")]
pub enum BoardEncoding {
    /// One handle for a bit-packed board.
    Packed(CiphertextHandle),
    /// One handle per tile.
    PerTile(Vec<CiphertextHandle>),
}

impl BoardEncoding {
    /// All handles, in tile order for per-tile boards.
    pub fn handles(&self) -> Vec<CiphertextHandle> {
        match self {
            BoardEncoding::Packed(handle) => vec![*handle],
            BoardEncoding::PerTile(handles) => handles.clone(),
        }
    }

    /// Number of stored handles.
    pub fn handle_count(&self) -> usize {
        match self {
            BoardEncoding::Packed(_) => 1,
            BoardEncoding::PerTile(handles) => handles.len(),
        }
    }

    /// True for the packed encoding.
    pub fn is_packed(&self) -> bool {
        matches!(self, BoardEncoding::Packed(_))
    }

    /// Short name for logs and messages.
    pub fn kind(&self) -> &'static str {
        match self {
            BoardEncoding::Packed(_) => "packed",
            BoardEncoding::PerTile(_) => "per_tile",
        }
    }

    /// Hash encoding into state hasher.
    pub fn hash_into(&self, hasher: &mut DigestHasher) {
        hasher.update_u8(self.is_packed() as u8);
        hasher.update_u32(self.handle_count() as u32);
        match self {
            BoardEncoding::Packed(handle) => hasher.update_word(&handle.word()),
            BoardEncoding::PerTile(handles) => {
                for handle in handles {
                    hasher.update_word(&handle.word());
                }
            }
        }
    }
}

/// Store errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Encoding already stored for this game.
    #[error("ciphertext already stored for game {0}")]
    AlreadyExists(GameId),
    /// Nothing stored for this game.
    #[error("no ciphertext found for game {0}")]
    NotFound(GameId),
    /// Tile index past the stored handles.
    #[error("index {index} out of range for game {game_id} (length {length})")]
    IndexOutOfRange {
        /// Game identifier.
        game_id: GameId,
        /// Requested index.
        index: usize,
        /// Stored handle count.
        length: usize,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct StoredBoard {
    encoding: BoardEncoding,
    board_size: u8,
}

/// Write-once ciphertext storage keyed by game.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedBoardStore {
    boards: BTreeMap<GameId, StoredBoard>,
}

impl EncryptedBoardStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a game's encoding. Fails if one is already stored.
    pub fn create(
        &mut self,
        game_id: GameId,
        encoding: BoardEncoding,
        board_size: u8,
    ) -> Result<(), StoreError> {
        if self.boards.contains_key(&game_id) {
            return Err(StoreError::AlreadyExists(game_id));
        }
        self.boards.insert(
            game_id,
            StoredBoard {
                encoding,
                board_size,
            },
        );
        Ok(())
    }

    fn stored(&self, game_id: GameId) -> Result<&StoredBoard, StoreError> {
        self.boards
            .get(&game_id)
            .ok_or(StoreError::NotFound(game_id))
    }

    /// Stored handle count: tile count for per-tile, 1 for packed.
    pub fn length(&self, game_id: GameId) -> Result<usize, StoreError> {
        Ok(self.stored(game_id)?.encoding.handle_count())
    }

    /// Logical tile count. Needed to unpack packed boards.
    pub fn board_size(&self, game_id: GameId) -> Result<u8, StoreError> {
        Ok(self.stored(game_id)?.board_size)
    }

    /// Handle for a tile. Packed boards return their single handle for any index.
    pub fn get(&self, game_id: GameId, index: usize) -> Result<CiphertextHandle, StoreError> {
        match &self.stored(game_id)?.encoding {
            BoardEncoding::Packed(handle) => Ok(*handle),
            BoardEncoding::PerTile(handles) => {
                handles
                    .get(index)
                    .copied()
                    .ok_or(StoreError::IndexOutOfRange {
                        game_id,
                        index,
                        length: handles.len(),
                    })
            }
        }
    }

    /// Stored encoding.
    pub fn encoding(&self, game_id: GameId) -> Result<&BoardEncoding, StoreError> {
        Ok(&self.stored(game_id)?.encoding)
    }

    /// Is anything stored for this game?
    pub fn contains(&self, game_id: GameId) -> bool {
        self.boards.contains_key(&game_id)
    }

    /// Number of stored boards.
    pub fn len(&self) -> usize {
        self.boards.len()
    }

    /// True if no boards are stored.
    pub fn is_empty(&self) -> bool {
        self.boards.is_empty()
    }

    /// Hash every stored encoding in game order.
    pub fn hash_into(&self, hasher: &mut DigestHasher) {
        hasher.update_u64(self.boards.len() as u64);
        for (game_id, stored) in &self.boards {
            hasher.update_u64(game_id.0);
            hasher.update_u8(stored.board_size);
            stored.encoding.hash_into(hasher);
        }
    }
}
