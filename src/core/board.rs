//! Plaintext Boards
//!
//! A board is an ordered sequence of tile flags, `true` meaning bomb.
//! Two plaintext shapes exist:
//!
//! - packed: tile `i` is bit `i` of a single `u64` (at most 64 tiles)
//! - per-tile: one `0`/`1` value per tile
//!
//! Unpacking a packed board of size `n` reads `(value >> i) & 1` for
//! `i` in `[0, n)`. Bits at or above `n` must be clear.

use serde::{Deserialize, Serialize};

use crate::core::hash::{DigestHasher, Hash32};

/// Maximum tiles representable in the packed encoding.
pub const MAX_PACKED_TILES: usize = 64;

/// Maximum tiles for any board (the commitment carries the size as a uint8).
pub const MAX_BOARD_SIZE: usize = u8::MAX as usize;

/// Board validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    /// Board has no tiles.
    #[error("board is empty")]
    Empty,
    /// Board exceeds the limit of its encoding.
    #[error("board size {size} exceeds maximum {max}")]
    TooLarge {
        /// Requested size.
        size: usize,
        /// Limit for the encoding.
        max: usize,
    },
    /// Tile count does not match the expected board size.
    #[error("expected {expected} tiles, got {actual}")]
    LengthMismatch {
        /// Expected tile count.
        expected: usize,
        /// Supplied tile count.
        actual: usize,
    },
    /// Tile value other than 0 or 1.
    #[error("tile {index} has value {value}, expected 0 or 1")]
    InvalidTile {
        /// Tile index.
        index: usize,
        /// Offending value.
        value: u64,
    },
    /// Packed value has bits set at or above the board size.
    #[error("packed value {value:#x} has bits set beyond {size} tiles")]
    StrayBits {
        /// Packed value.
        value: u64,
        /// Board size.
        size: usize,
    },
}

/// Plaintext board.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Board {
    tiles: Vec<bool>,
}

impl Board {
    /// Create from tile flags.
    pub fn new(tiles: Vec<bool>) -> Self {
        Self { tiles }
    }

    /// Parse per-tile `0`/`1` values.
    pub fn from_values<I>(values: I) -> Result<Self, BoardError>
    where
        I: IntoIterator,
        I::Item: Into<u64>,
    {
        let tiles = values
            .into_iter()
            .enumerate()
            .map(|(index, value)| match value.into() {
                0 => Ok(false),
                1 => Ok(true),
                value => Err(BoardError::InvalidTile { index, value }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { tiles })
    }

    /// Unpack `size` tiles from a packed value.
    pub fn unpack(value: u64, size: usize) -> Result<Self, BoardError> {
        if size == 0 {
            return Err(BoardError::Empty);
        }
        if size > MAX_PACKED_TILES {
            return Err(BoardError::TooLarge {
                size,
                max: MAX_PACKED_TILES,
            });
        }
        if size < MAX_PACKED_TILES && value >> size != 0 {
            return Err(BoardError::StrayBits { value, size });
        }

        let tiles = (0..size).map(|i| (value >> i) & 1 == 1).collect();
        Ok(Self { tiles })
    }

    /// Pack into a single value, bit `i` = tile `i`.
    pub fn pack(&self) -> Result<u64, BoardError> {
        if self.tiles.len() > MAX_PACKED_TILES {
            return Err(BoardError::TooLarge {
                size: self.tiles.len(),
                max: MAX_PACKED_TILES,
            });
        }

        Ok(self
            .tiles
            .iter()
            .enumerate()
            .filter(|(_, bomb)| **bomb)
            .fold(0u64, |acc, (i, _)| acc | (1u64 << i)))
    }

    /// Number of tiles.
    #[inline]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// True if the board has no tiles.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Bomb flag for a tile, `None` if out of range.
    #[inline]
    pub fn is_bomb(&self, index: usize) -> Option<bool> {
        self.tiles.get(index).copied()
    }

    /// Number of bombs.
    pub fn bomb_count(&self) -> usize {
        self.tiles.iter().filter(|b| **b).count()
    }

    /// Tile flags.
    pub fn tiles(&self) -> &[bool] {
        &self.tiles
    }

    /// Per-tile `0`/`1` values.
    pub fn to_values(&self) -> Vec<u8> {
        self.tiles.iter().map(|b| *b as u8).collect()
    }

    /// Domain-separated SHA-256 digest of the board.
    pub fn digest(&self) -> Hash32 {
        let mut hasher = DigestHasher::for_board();
        hasher.update_u32(self.tiles.len() as u32);
        for bomb in &self.tiles {
            hasher.update_bool(*bomb);
        }
        hasher.finalize()
    }
}

/// Plaintext board submitted when a game is revealed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum BoardDisclosure {
    /// Single packed value.
    Packed(u64),
    /// One `0`/`1` value per tile.
    Tiles(Vec<u8>),
}

impl BoardDisclosure {
    /// Validate against a board size and convert to a board.
    pub fn to_board(&self, size: usize) -> Result<Board, BoardError> {
        match self {
            BoardDisclosure::Packed(value) => Board::unpack(*value, size),
            BoardDisclosure::Tiles(values) => {
                if values.len() != size {
                    return Err(BoardError::LengthMismatch {
                        expected: size,
                        actual: values.len(),
                    });
                }
                Board::from_values(values.iter().copied())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::Rng;

    #[test]
    fn test_pack_reference_board() {
        let board = Board::from_values([0u8, 0, 1, 0, 0]).unwrap();
        assert_eq!(board.pack().unwrap(), 0b00100);
        assert_eq!(board.bomb_count(), 1);
    }

    #[test]
    fn test_unpack_reads_low_bits() {
        let board = Board::unpack(0b1010, 4).unwrap();
        assert_eq!(board.tiles(), &[false, true, false, true]);
    }

    #[test]
    fn test_unpack_rejects_stray_bits() {
        let result = Board::unpack(0b10000, 4);
        assert!(matches!(result, Err(BoardError::StrayBits { size: 4, .. })));
    }

    #[test]
    fn test_unpack_full_width() {
        let board = Board::unpack(u64::MAX, 64).unwrap();
        assert_eq!(board.bomb_count(), 64);
    }

    #[test]
    fn test_unpack_size_limits() {
        assert_eq!(Board::unpack(0, 0), Err(BoardError::Empty));
        assert!(matches!(
            Board::unpack(0, 65),
            Err(BoardError::TooLarge { size: 65, max: 64 })
        ));
    }

    #[test]
    fn test_pack_too_large() {
        let board = Board::new(vec![false; 65]);
        assert!(matches!(board.pack(), Err(BoardError::TooLarge { .. })));
    }

    #[test]
    fn test_invalid_tile_value() {
        let result = Board::from_values([0u8, 2, 1]);
        assert_eq!(result, Err(BoardError::InvalidTile { index: 1, value: 2 }));
    }

    #[test]
    fn test_disclosure_length_mismatch() {
        let disclosure = BoardDisclosure::Tiles(vec![0, 1, 0]);
        assert_eq!(
            disclosure.to_board(5),
            Err(BoardError::LengthMismatch {
                expected: 5,
                actual: 3
            })
        );
    }

    #[test]
    fn test_disclosure_shapes_agree() {
        let packed = BoardDisclosure::Packed(0b00100).to_board(5).unwrap();
        let tiles = BoardDisclosure::Tiles(vec![0, 0, 1, 0, 0]).to_board(5).unwrap();
        assert_eq!(packed, tiles);
        assert_eq!(packed.digest(), tiles.digest());
    }

    #[test]
    fn test_digest_depends_on_size() {
        let short = Board::new(vec![false; 4]);
        let long = Board::new(vec![false; 5]);
        assert_ne!(short.digest(), long.digest());
    }

    #[test]
    fn test_random_boards_round_trip() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let size = rng.gen_range(1..=MAX_PACKED_TILES);
            let tiles: Vec<bool> = (0..size).map(|_| rng.gen_bool(0.2)).collect();
            let board = Board::new(tiles);

            let packed = board.pack().unwrap();
            assert_eq!(Board::unpack(packed, size).unwrap(), board);
        }
    }

    proptest! {
        #[test]
        fn prop_pack_unpack_round_trip(tiles in prop::collection::vec(any::<bool>(), 1..=64)) {
            let board = Board::new(tiles.clone());
            let packed = board.pack().unwrap();
            let unpacked = Board::unpack(packed, tiles.len()).unwrap();
            prop_assert_eq!(unpacked.tiles(), tiles.as_slice());
        }
    }
}
