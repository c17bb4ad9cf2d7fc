//! # Confidential Bomb
//!
//! Commit-reveal fairness engine for an encrypted tile game.
//!
//! A creator commits to `keccak256(seed, player, boardSize)`, stores the
//! board as oracle ciphertexts, plays, then reveals. Anyone can later
//! recompute the commitment and decrypt the stored board to check it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    CONFIDENTIAL BOMB                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Plaintext primitives                      │
//! │  ├── board.rs    - Boards, bit packing, disclosures          │
//! │  └── hash.rs     - ABI words, keccak256, SHA-256 digests     │
//! │                                                              │
//! │  game/           - Authoritative registry                    │
//! │  ├── state.rs    - Identifiers and per-game state            │
//! │  ├── encrypted.rs- Write-once ciphertext store               │
//! │  ├── events.rs   - Registry events                           │
//! │  └── registry.rs - Lifecycle state machine                   │
//! │                                                              │
//! │  oracle/         - Encryption oracle seam                    │
//! │  ├── local.rs    - In-process oracle                         │
//! │  └── worker.rs   - Encrypt worker task                       │
//! │                                                              │
//! │  proof/          - Fairness verification                     │
//! │  ├── commitment.rs                                           │
//! │  ├── journal.rs  - Transition log and replay                 │
//! │  └── verify.rs   - Decrypt and report                        │
//! │                                                              │
//! │  network/        - HTTP (non-authoritative)                  │
//! │  ├── auth.rs     - Signed decrypt authorizations             │
//! │  ├── protocol.rs - Request/response bodies                   │
//! │  └── server.rs   - POST /verify                              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Replay Guarantee
//!
//! Registry transitions take the caller and timestamp as arguments and
//! keep games in a `BTreeMap`. Replaying a journal through
//! [`GameRegistry::apply_replayed`] rebuilds the same state root on any platform.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;
pub mod oracle;
pub mod proof;

// Re-export commonly used types
pub use core::board::{Board, BoardDisclosure, MAX_BOARD_SIZE, MAX_PACKED_TILES};
pub use game::registry::{GameRegistry, RegistryError};
pub use game::state::{CommitHash, GameId, GameStatus, Identity, Seed};
pub use oracle::{EncryptionOracle, InputVerifier, LocalOracle};
pub use proof::commitment::commit;
pub use proof::verify::VerificationPipeline;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
