//! Hashing Primitives
//!
//! Two hash families live here:
//! - Keccak-256 over ABI-style 32-byte words, for commitments that EVM
//!   clients compute as `keccak256(abi.encode(...))`
//! - SHA-256 with domain separators, for registry state roots, oracle
//!   handle derivation and board digests

use alloy_primitives::{keccak256, Address, B256, U256};
use sha2::{Digest, Sha256};

/// Digest output type (256 bits / 32 bytes).
pub type Hash32 = [u8; 32];

/// Size of one ABI word in bytes.
pub const WORD_SIZE: usize = 32;

/// Static ABI encoder.
///
/// Every value occupies exactly one big-endian 32-byte word, left-padded
/// with zeros. No length prefixes, no delimiters. The output of
/// `push_uint256(s).push_address(p).push_uint8(n)` is byte-identical to
/// Solidity's `abi.encode(uint256 s, address p, uint8 n)`.
#[derive(Clone, Debug, Default)]
pub struct AbiEncoder {
    buf: Vec<u8>,
}

impl AbiEncoder {
    /// Create an empty encoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an encoder with room for `words` words.
    pub fn with_words(words: usize) -> Self {
        Self {
            buf: Vec::with_capacity(words * WORD_SIZE),
        }
    }

    /// Append a uint256 word.
    pub fn push_uint256(&mut self, value: U256) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes::<WORD_SIZE>());
        self
    }

    /// Append an address word (20 bytes, left-padded).
    pub fn push_address(&mut self, address: Address) -> &mut Self {
        self.buf.extend_from_slice(address.into_word().as_slice());
        self
    }

    /// Append a uint8 word.
    pub fn push_uint8(&mut self, value: u8) -> &mut Self {
        let mut word = [0u8; WORD_SIZE];
        word[WORD_SIZE - 1] = value;
        self.buf.extend_from_slice(&word);
        self
    }

    /// Append a raw 32-byte word.
    pub fn push_word(&mut self, word: B256) -> &mut Self {
        self.buf.extend_from_slice(word.as_slice());
        self
    }

    /// Encoded bytes so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Number of encoded bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing has been encoded.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Keccak-256 of the encoded bytes.
    pub fn keccak256(&self) -> B256 {
        keccak256(&self.buf)
    }
}

/// Domain-separated SHA-256 hasher.
///
/// Order of updates is part of the digest. Integers are little-endian.
pub struct DigestHasher {
    hasher: Sha256,
}

impl DigestHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Hasher for registry state roots.
    pub fn for_registry_state() -> Self {
        Self::new(b"CONFIDENTIAL_BOMB_STATE_V1")
    }

    /// Hasher for plaintext board digests.
    pub fn for_board() -> Self {
        Self::new(b"CONFIDENTIAL_BOMB_BOARD_V1")
    }

    /// Update with raw bytes.
    #[inline]
    pub fn update_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Update with a u8 value.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a u64 value (little-endian).
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a boolean.
    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// Update with a 32-byte word.
    #[inline]
    pub fn update_word(&mut self, word: &B256) {
        self.hasher.update(word.as_slice());
    }

    /// Update with an address (20 bytes).
    #[inline]
    pub fn update_address(&mut self, address: &Address) {
        self.hasher.update(address.as_slice());
    }

    /// Finalize and return the digest.
    pub fn finalize(self) -> Hash32 {
        self.hasher.finalize().into()
    }
}

/// Compute hash with domain separator.
pub fn hash_with_domain(domain: &[u8], data: &[u8]) -> Hash32 {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    hasher.update(data);
    hasher.finalize().into()
}

// =============================================================================
// TESTS
// =============================================================================
