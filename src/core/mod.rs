//! Core primitives.
//!
//! Plaintext boards and the hashing used for commitments, digests and
//! state roots. Nothing here touches the registry or the oracle.

pub mod board;
pub mod hash;

// Re-export core types
pub use board::{Board, BoardDisclosure, BoardError, MAX_BOARD_SIZE, MAX_PACKED_TILES};
pub use hash::{hash_with_domain, AbiEncoder, DigestHasher, Hash32};
