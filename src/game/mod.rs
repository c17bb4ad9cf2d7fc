//! Game Registry Module
//!
//! Authoritative state for committed, encrypted boards.
//!
//! ## Module Structure
//!
//! - `state`: identifiers, game status, opened-tile mask
//! - `encrypted`: write-once ciphertext handle store
//! - `events`: notifications emitted on accepted transitions
//! - `registry`: lifecycle state machine and read accessors

pub mod state;
pub mod encrypted;
pub mod events;
pub mod registry;

// Re-export key types
pub use state::{CommitHash, Game, GameId, GameStatus, IdentifierError, Identity, OpenedTiles, Seed};
pub use encrypted::{BoardEncoding, CiphertextHandle, EncryptedBoardStore, StoreError};
pub use events::RegistryEvent;
pub use registry::{GameRegistry, RegistryError};
