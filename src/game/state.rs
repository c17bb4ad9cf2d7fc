//! Game State Definitions
//!
//! Identifiers and the per-game record owned by the registry.
//! Uses BTreeMap-friendly `Ord` identifiers for deterministic iteration.
//!
//! Wire forms: identities are EIP-55 checksummed hex, seeds are decimal
//! strings, 32-byte values are lowercase `0x` hex. Parsing is lenient
//! about case and the `0x` prefix; comparison is always on bytes.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

use crate::core::board::Board;
use crate::core::hash::DigestHasher;

// =============================================================================
// PARSE ERRORS
// =============================================================================

/// Errors parsing identifiers from their text form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    /// Not valid hex.
    #[error("invalid hex: {0}")]
    InvalidHex(String),
    /// Wrong byte length.
    #[error("expected {expected} bytes, got {actual}")]
    InvalidLength {
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },
    /// Not a 256-bit unsigned integer.
    #[error("invalid seed: {0}")]
    InvalidSeed(String),
}

/// Decode a hex string with optional `0x`/`0X` prefix into a fixed array.
fn decode_hex_array<const N: usize>(s: &str) -> Result<[u8; N], IdentifierError> {
    let trimmed = s.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let bytes = hex::decode(digits).map_err(|e| IdentifierError::InvalidHex(e.to_string()))?;
    let actual = bytes.len();
    bytes
        .try_into()
        .map_err(|_| IdentifierError::InvalidLength {
            expected: N,
            actual,
        })
}

/// Parse a 32-byte word from hex.
pub(crate) fn parse_word(s: &str) -> Result<B256, IdentifierError> {
    decode_hex_array::<32>(s).map(B256::from)
}

/// Format a 32-byte word as lowercase `0x` hex.
pub(crate) fn format_word(word: &B256) -> String {
    format!("0x{}", hex::encode(word))
}

// =============================================================================
// GAME ID
// =============================================================================

/// Game identifier, assigned from 0 upward and never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(pub u64);

impl GameId {
    /// Create from raw value.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw value.
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// IDENTITY
// =============================================================================

/// 160-bit account identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(Address);

impl Identity {
    /// Wrap an address.
    pub const fn new(address: Address) -> Self {
        Self(address)
    }

    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(Address::from(bytes))
    }

    /// Underlying address.
    pub const fn address(&self) -> Address {
        self.0
    }

    /// EIP-55 checksummed hex.
    pub fn to_checksum(&self) -> String {
        self.0.to_checksum(None)
    }
}

impl FromStr for Identity {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_hex_array::<20>(s).map(Self::from_bytes)
    }
}

impl TryFrom<String> for Identity {
    type Error = IdentifierError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.to_checksum()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

// =============================================================================
// SEED
// =============================================================================

/// Secret 256-bit seed committed at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Seed(U256);

impl Seed {
    /// Wrap a 256-bit value.
    pub const fn new(value: U256) -> Self {
        Self(value)
    }

    /// Underlying value.
    pub const fn value(&self) -> U256 {
        self.0
    }

    /// Big-endian bytes.
    pub fn to_be_bytes(&self) -> [u8; 32] {
        self.0.to_be_bytes::<32>()
    }
}

impl From<u64> for Seed {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl FromStr for Seed {
    type Err = IdentifierError;

    /// Decimal, or hex with a `0x` prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(IdentifierError::InvalidSeed("empty".to_string()));
        }
        let parsed = match trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            Some(digits) => U256::from_str_radix(digits, 16),
            None => U256::from_str_radix(trimmed, 10),
        };
        parsed
            .map(Self)
            .map_err(|e| IdentifierError::InvalidSeed(format!("{trimmed}: {e}")))
    }
}

impl TryFrom<String> for Seed {
    type Error = IdentifierError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Seed> for String {
    fn from(seed: Seed) -> Self {
        seed.0.to_string()
    }
}

impl fmt::Display for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// COMMIT HASH
// =============================================================================

/// 32-byte commitment over `(seed, owner, boardSize)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommitHash(B256);

impl CommitHash {
    /// Wrap a word.
    pub const fn new(word: B256) -> Self {
        Self(word)
    }

    /// Underlying word.
    pub const fn word(&self) -> B256 {
        self.0
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0 .0
    }
}

impl FromStr for CommitHash {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_word(s).map(Self)
    }
}

impl TryFrom<String> for CommitHash {
    type Error = IdentifierError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<CommitHash> for String {
    fn from(hash: CommitHash) -> Self {
        format_word(&hash.0)
    }
}

impl fmt::Display for CommitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_word(&self.0))
    }
}

// =============================================================================
// GAME STATUS
// =============================================================================

/// Stored lifecycle status. Only `Active -> Ended` is possible.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
#[derive(Default)]
pub enum GameStatus {
    /// Tiles may be picked.
    #[default]
    Active = 0,
    /// No further picks; reveals may proceed.
    Ended = 1,
}

impl GameStatus {
    /// Numeric code as reported by `getState`.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameStatus::Active => f.write_str("active"),
            GameStatus::Ended => f.write_str("ended"),
        }
    }
}

// =============================================================================
// OPENED TILES
// =============================================================================

/// Bitmask of opened tile indices (up to 256 tiles).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct OpenedTiles {
    mask: [u64; 4],
    count: u16,
}

impl OpenedTiles {
    /// Empty mask.
    pub const fn new() -> Self {
        Self {
            mask: [0; 4],
            count: 0,
        }
    }

    /// Is `index` opened?
    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        index < 256 && self.mask[index / 64] & (1u64 << (index % 64)) != 0
    }

    /// Mark `index` opened. Returns false if it was already opened or out of range.
    pub fn insert(&mut self, index: usize) -> bool {
        if index >= 256 || self.contains(index) {
            return false;
        }
        self.mask[index / 64] |= 1u64 << (index % 64);
        self.count += 1;
        true
    }

    /// Number of opened tiles.
    #[inline]
    pub fn count(&self) -> usize {
        self.count as usize
    }

    /// Opened indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..256).filter(move |i| self.contains(*i))
    }

    /// Raw mask words.
    pub fn words(&self) -> &[u64; 4] {
        &self.mask
    }
}

// =============================================================================
// GAME RECORD
// =============================================================================

/// One game record.
///
/// Ciphertext handles live in the encrypted board store under the same id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    /// Game identifier.
    pub id: GameId,
    /// Creator, the only identity allowed to transition the game.
    pub owner: Identity,
    /// Tile count, fixed at creation.
    pub board_size: u8,
    /// Commitment, set once at creation.
    pub commit_hash: CommitHash,
    /// Opened tile bookkeeping.
    pub opened: OpenedTiles,
    /// Lifecycle status.
    pub status: GameStatus,
    /// Seed, set once the commitment check passes.
    pub seed: Option<Seed>,
    /// Board disclosed after the seed reveal.
    pub revealed_board: Option<Board>,
    /// Unix timestamp of creation.
    pub created_at: i64,
}

impl Game {
    /// Create a new active game.
    pub fn new(
        id: GameId,
        owner: Identity,
        board_size: u8,
        commit_hash: CommitHash,
        created_at: i64,
    ) -> Self {
        Self {
            id,
            owner,
            board_size,
            commit_hash,
            opened: OpenedTiles::new(),
            status: GameStatus::Active,
            seed: None,
            revealed_board: None,
            created_at,
        }
    }

    /// Tiles may still be picked.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == GameStatus::Active
    }

    /// Seed has passed the commitment check.
    #[inline]
    pub fn is_seed_revealed(&self) -> bool {
        self.seed.is_some()
    }

    /// Plaintext board has been disclosed.
    #[inline]
    pub fn is_board_revealed(&self) -> bool {
        self.revealed_board.is_some()
    }

    /// Derived `Revealed` state: ended, seed and board both disclosed.
    pub fn is_revealed(&self) -> bool {
        self.status == GameStatus::Ended && self.is_seed_revealed() && self.is_board_revealed()
    }

    /// Number of opened tiles.
    #[inline]
    pub fn opened_count(&self) -> usize {
        self.opened.count()
    }

    /// Hash game record into state hasher.
    pub fn hash_into(&self, hasher: &mut DigestHasher) {
        hasher.update_u64(self.id.0);
        hasher.update_address(&self.owner.address());
        hasher.update_u8(self.board_size);
        hasher.update_word(&self.commit_hash.word());
        hasher.update_u8(self.status.as_u8());
        for word in self.opened.words() {
            hasher.update_u64(*word);
        }

        match &self.seed {
            Some(seed) => {
                hasher.update_bool(true);
                hasher.update_bytes(&seed.to_be_bytes());
            }
            None => hasher.update_bool(false),
        }

        match &self.revealed_board {
            Some(board) => {
                hasher.update_bool(true);
                hasher.update_bytes(&board.digest());
            }
            None => hasher.update_bool(false),
        }

        hasher.update_u64(self.created_at as u64);
    }
}
