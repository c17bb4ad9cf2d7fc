//! Game Registry
//!
//! The commit-reveal state machine. One record per game, transitions:
//!
//! ```text
//! create_game ──► Active ──pick_tile*──► end_game ──► Ended
//!                                                       │
//!                                reveal_seed (commit check)
//!                                                       │
//!                                reveal_game (disclosure) ──► revealed
//! ```
//!
//! Every transition is creator-only, validates fully before mutating,
//! and on success appends one event and one journal entry. A rejected
//! transition leaves no trace.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::board::{Board, BoardDisclosure, MAX_BOARD_SIZE, MAX_PACKED_TILES};
use crate::core::hash::{DigestHasher, Hash32};
use crate::game::encrypted::{BoardEncoding, CiphertextHandle, EncryptedBoardStore, StoreError};
use crate::game::events::RegistryEvent;
use crate::game::state::{CommitHash, Game, GameId, GameStatus, Identity, Seed};
use crate::oracle::{EncryptTarget, InputProof, InputVerifier, OracleError};
use crate::proof::commitment;
use crate::proof::journal::{LedgerJournal, Transition};

/// Registry errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No game with this id.
    #[error("game {0} not found")]
    GameNotFound(GameId),
    /// Caller is not the game's creator.
    #[error("{caller} does not own game {game_id}")]
    NotOwner {
        /// Game.
        game_id: GameId,
        /// Rejected caller.
        caller: Identity,
    },
    /// Operation not allowed in the current status.
    #[error("game {game_id} is {status}")]
    InvalidState {
        /// Game.
        game_id: GameId,
        /// Current status.
        status: GameStatus,
    },
    /// Board size is zero or exceeds the encoding's limit.
    #[error("invalid board size {size} (max {max})")]
    InvalidBoardSize {
        /// Requested size.
        size: usize,
        /// Limit for the encoding.
        max: usize,
    },
    /// Per-tile handle count differs from the board size.
    #[error("board size {board_size} but {handles} handles")]
    EncodingMismatch {
        /// Declared size.
        board_size: u8,
        /// Handles supplied.
        handles: usize,
    },
    /// Oracle rejected the input proof.
    #[error("invalid proof: {0}")]
    InvalidProof(OracleError),
    /// Tile index past the board.
    #[error("index {index} out of range for game {game_id} (length {length})")]
    IndexOutOfRange {
        /// Game.
        game_id: GameId,
        /// Requested index.
        index: usize,
        /// Valid length.
        length: usize,
    },
    /// Tile already opened.
    #[error("tile {index} of game {game_id} already opened")]
    AlreadyOpened {
        /// Game.
        game_id: GameId,
        /// Tile index.
        index: usize,
    },
    /// Seed already revealed.
    #[error("seed of game {0} already revealed")]
    SeedAlreadyRevealed(GameId),
    /// Seed does not open the commitment.
    #[error("commit mismatch for game {0}")]
    CommitMismatch(GameId),
    /// Board reveal before seed reveal.
    #[error("seed of game {0} not revealed")]
    SeedNotRevealed(GameId),
    /// Board already disclosed.
    #[error("board of game {0} already revealed")]
    BoardAlreadyRevealed(GameId),
    /// Disclosure has the wrong shape or content.
    #[error("invalid disclosure for game {game_id}: {reason}")]
    InvalidDisclosure {
        /// Game.
        game_id: GameId,
        /// What was wrong.
        reason: String,
    },
    /// Packed-only accessor on a per-tile game.
    #[error("game {0} is not packed")]
    NotPacked(GameId),
    /// Store rejected a write for a fresh id.
    #[error("ciphertext already stored for game {0}")]
    AlreadyStored(GameId),
}

impl From<StoreError> for RegistryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyExists(game_id) => RegistryError::AlreadyStored(game_id),
            StoreError::NotFound(game_id) => RegistryError::GameNotFound(game_id),
            StoreError::IndexOutOfRange {
                game_id,
                index,
                length,
            } => RegistryError::IndexOutOfRange {
                game_id,
                index,
                length,
            },
        }
    }
}

/// Where a transition comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Admission {
    /// Submitted now; input proofs are checked.
    Live,
    /// Read back from the journal.
    Replayed,
}

/// Current Unix time in seconds.
fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Game registry for one contract.
pub struct GameRegistry {
    contract: Identity,
    games: BTreeMap<GameId, Game>,
    store: EncryptedBoardStore,
    next_id: u64,
    events: Vec<RegistryEvent>,
    journal: LedgerJournal,
    verifier: Arc<dyn InputVerifier>,
}

impl GameRegistry {
    /// Empty registry for `contract`, checking input proofs with `verifier`.
    pub fn new(contract: Identity, verifier: Arc<dyn InputVerifier>) -> Self {
        Self {
            contract,
            games: BTreeMap::new(),
            store: EncryptedBoardStore::new(),
            next_id: 0,
            events: Vec::new(),
            journal: LedgerJournal::new(contract),
            verifier,
        }
    }

    // =========================================================================
    // TRANSITIONS
    // =========================================================================

    /// Create a game. Returns the new id.
    pub fn create_game(
        &mut self,
        caller: &Identity,
        encoding: BoardEncoding,
        proof: &InputProof,
        commit_hash: CommitHash,
        board_size: u8,
    ) -> Result<GameId, RegistryError> {
        let transition = Transition::CreateGame {
            encoding,
            proof: proof.clone(),
            commit_hash,
            board_size,
        };
        self.apply(caller, transition, now())
    }

    /// Mark a tile opened.
    pub fn pick_tile(
        &mut self,
        caller: &Identity,
        game_id: GameId,
        index: usize,
    ) -> Result<(), RegistryError> {
        self.apply(caller, Transition::PickTile { game_id, index }, now())
            .map(|_| ())
    }

    /// End an active game.
    pub fn end_game(&mut self, caller: &Identity, game_id: GameId) -> Result<(), RegistryError> {
        self.apply(caller, Transition::EndGame { game_id }, now())
            .map(|_| ())
    }

    /// Reveal the seed. Stored only if it opens the commitment.
    pub fn reveal_seed(
        &mut self,
        caller: &Identity,
        game_id: GameId,
        seed: Seed,
    ) -> Result<(), RegistryError> {
        self.apply(caller, Transition::RevealSeed { game_id, seed }, now())
            .map(|_| ())
    }

    /// Disclose the plaintext board. No check against the ciphertext.
    pub fn reveal_game(
        &mut self,
        caller: &Identity,
        game_id: GameId,
        disclosure: BoardDisclosure,
    ) -> Result<(), RegistryError> {
        self.apply(caller, Transition::RevealGame { game_id, disclosure }, now())
            .map(|_| ())
    }

    /// Apply one live transition at `timestamp`. Returns the affected game.
    pub fn apply(
        &mut self,
        caller: &Identity,
        transition: Transition,
        timestamp: i64,
    ) -> Result<GameId, RegistryError> {
        self.admit(caller, transition, timestamp, Admission::Live)
    }

    /// Re-apply a transition the ledger already accepted.
    ///
    /// Same checks as `apply` except the input proof, which was verified
    /// when the creation was first accepted and may refer to ciphertexts
    /// the current oracle no longer holds.
    pub fn apply_replayed(
        &mut self,
        caller: &Identity,
        transition: Transition,
        timestamp: i64,
    ) -> Result<GameId, RegistryError> {
        self.admit(caller, transition, timestamp, Admission::Replayed)
    }

    fn admit(
        &mut self,
        caller: &Identity,
        transition: Transition,
        timestamp: i64,
        admission: Admission,
    ) -> Result<GameId, RegistryError> {
        let event = match &transition {
            Transition::CreateGame {
                encoding,
                proof,
                commit_hash,
                board_size,
            } => self.apply_create(
                caller,
                encoding,
                proof,
                *commit_hash,
                *board_size,
                timestamp,
                admission,
            )?,
            Transition::PickTile { game_id, index } => self.apply_pick(caller, *game_id, *index)?,
            Transition::EndGame { game_id } => self.apply_end(caller, *game_id)?,
            Transition::RevealSeed { game_id, seed } => {
                self.apply_reveal_seed(caller, *game_id, *seed)?
            }
            Transition::RevealGame {
                game_id,
                disclosure,
            } => self.apply_reveal_game(caller, *game_id, disclosure)?,
        };

        let game_id = event.game_id();
        let sequence = self.journal.append(*caller, timestamp, transition);
        debug!(game_id = %game_id, sequence, event = event.name(), "Transition accepted");
        self.events.push(event);
        Ok(game_id)
    }

    fn apply_create(
        &mut self,
        caller: &Identity,
        encoding: &BoardEncoding,
        proof: &InputProof,
        commit_hash: CommitHash,
        board_size: u8,
        timestamp: i64,
        admission: Admission,
    ) -> Result<RegistryEvent, RegistryError> {
        let size = board_size as usize;
        match encoding {
            BoardEncoding::Packed(_) if size == 0 || size > MAX_PACKED_TILES => {
                return Err(RegistryError::InvalidBoardSize {
                    size,
                    max: MAX_PACKED_TILES,
                });
            }
            BoardEncoding::PerTile(_) if size == 0 => {
                return Err(RegistryError::InvalidBoardSize {
                    size,
                    max: MAX_BOARD_SIZE,
                });
            }
            BoardEncoding::PerTile(handles) if handles.len() != size => {
                return Err(RegistryError::EncodingMismatch {
                    board_size,
                    handles: handles.len(),
                });
            }
            _ => {}
        }

        if admission == Admission::Live {
            let target = EncryptTarget {
                contract: self.contract,
                user: *caller,
            };
            self.verifier
                .verify_input(&target, &encoding.handles(), proof)
                .map_err(RegistryError::InvalidProof)?;
        }

        let game_id = GameId(self.next_id);
        self.store.create(game_id, encoding.clone(), board_size)?;
        self.next_id += 1;
        self.games.insert(
            game_id,
            Game::new(game_id, *caller, board_size, commit_hash, timestamp),
        );

        info!(
            game_id = %game_id,
            owner = %caller,
            board_size,
            encoding = encoding.kind(),
            "Game created"
        );

        Ok(RegistryEvent::GameCreated {
            game_id,
            owner: *caller,
            board_size,
        })
    }

    fn apply_pick(
        &mut self,
        caller: &Identity,
        game_id: GameId,
        index: usize,
    ) -> Result<RegistryEvent, RegistryError> {
        let game = self.owned_game(caller, game_id)?;
        if !game.is_active() {
            return Err(RegistryError::InvalidState {
                game_id,
                status: game.status,
            });
        }
        if index >= game.board_size as usize {
            return Err(RegistryError::IndexOutOfRange {
                game_id,
                index,
                length: game.board_size as usize,
            });
        }
        if game.opened.contains(index) {
            return Err(RegistryError::AlreadyOpened { game_id, index });
        }

        let game = self.game_mut(game_id)?;
        game.opened.insert(index);
        let opened_count = game.opened_count();

        debug!(game_id = %game_id, index, opened_count, "Tile picked");
        Ok(RegistryEvent::TilePicked {
            game_id,
            index,
            opened_count,
        })
    }

    fn apply_end(
        &mut self,
        caller: &Identity,
        game_id: GameId,
    ) -> Result<RegistryEvent, RegistryError> {
        let game = self.owned_game(caller, game_id)?;
        if !game.is_active() {
            return Err(RegistryError::InvalidState {
                game_id,
                status: game.status,
            });
        }

        let game = self.game_mut(game_id)?;
        game.status = GameStatus::Ended;

        info!(game_id = %game_id, opened = game.opened_count(), "Game ended");
        Ok(RegistryEvent::GameEnded { game_id })
    }

    fn apply_reveal_seed(
        &mut self,
        caller: &Identity,
        game_id: GameId,
        seed: Seed,
    ) -> Result<RegistryEvent, RegistryError> {
        let game = self.owned_game(caller, game_id)?;
        if game.is_active() {
            return Err(RegistryError::InvalidState {
                game_id,
                status: game.status,
            });
        }
        if game.is_seed_revealed() {
            return Err(RegistryError::SeedAlreadyRevealed(game_id));
        }
        if !commitment::verify(&game.commit_hash, &seed, &game.owner, game.board_size) {
            warn!(game_id = %game_id, "Revealed seed does not match commitment");
            return Err(RegistryError::CommitMismatch(game_id));
        }

        let game = self.game_mut(game_id)?;
        game.seed = Some(seed);

        info!(game_id = %game_id, "Seed revealed");
        Ok(RegistryEvent::SeedRevealed { game_id, seed })
    }

    fn apply_reveal_game(
        &mut self,
        caller: &Identity,
        game_id: GameId,
        disclosure: &BoardDisclosure,
    ) -> Result<RegistryEvent, RegistryError> {
        let game = self.owned_game(caller, game_id)?;
        if !game.is_seed_revealed() {
            return Err(RegistryError::SeedNotRevealed(game_id));
        }
        if game.is_board_revealed() {
            return Err(RegistryError::BoardAlreadyRevealed(game_id));
        }

        let packed = self.store.encoding(game_id)?.is_packed();
        let shape_ok = matches!(
            (packed, disclosure),
            (true, BoardDisclosure::Packed(_)) | (false, BoardDisclosure::Tiles(_))
        );
        if !shape_ok {
            return Err(RegistryError::InvalidDisclosure {
                game_id,
                reason: format!(
                    "disclosure shape does not match {} encoding",
                    if packed { "packed" } else { "per-tile" }
                ),
            });
        }

        let board = disclosure
            .to_board(game.board_size as usize)
            .map_err(|e| RegistryError::InvalidDisclosure {
                game_id,
                reason: e.to_string(),
            })?;
        let bomb_count = board.bomb_count();

        let game = self.game_mut(game_id)?;
        game.revealed_board = Some(board);

        info!(game_id = %game_id, bomb_count, "Board revealed");
        Ok(RegistryEvent::BoardRevealed {
            game_id,
            bomb_count,
        })
    }

    fn owned_game(&self, caller: &Identity, game_id: GameId) -> Result<&Game, RegistryError> {
        let game = self.get_game(game_id)?;
        if game.owner != *caller {
            return Err(RegistryError::NotOwner {
                game_id,
                caller: *caller,
            });
        }
        Ok(game)
    }

    fn game_mut(&mut self, game_id: GameId) -> Result<&mut Game, RegistryError> {
        self.games
            .get_mut(&game_id)
            .ok_or(RegistryError::GameNotFound(game_id))
    }

    // =========================================================================
    // READ ACCESSORS
    // =========================================================================

    /// Game record.
    pub fn get_game(&self, game_id: GameId) -> Result<&Game, RegistryError> {
        self.games
            .get(&game_id)
            .ok_or(RegistryError::GameNotFound(game_id))
    }

    /// Stored status.
    pub fn get_state(&self, game_id: GameId) -> Result<GameStatus, RegistryError> {
        Ok(self.get_game(game_id)?.status)
    }

    /// Number of opened tiles.
    pub fn get_opened_count(&self, game_id: GameId) -> Result<usize, RegistryError> {
        Ok(self.get_game(game_id)?.opened_count())
    }

    /// Was `index` opened?
    pub fn is_opened(&self, game_id: GameId, index: usize) -> Result<bool, RegistryError> {
        Ok(self.get_game(game_id)?.opened.contains(index))
    }

    /// Creator.
    pub fn get_owner(&self, game_id: GameId) -> Result<Identity, RegistryError> {
        Ok(self.get_game(game_id)?.owner)
    }

    /// Tile count.
    pub fn get_board_size(&self, game_id: GameId) -> Result<u8, RegistryError> {
        Ok(self.get_game(game_id)?.board_size)
    }

    /// Commitment.
    pub fn get_commit_hash(&self, game_id: GameId) -> Result<CommitHash, RegistryError> {
        Ok(self.get_game(game_id)?.commit_hash)
    }

    /// Revealed seed, if any.
    pub fn get_seed(&self, game_id: GameId) -> Result<Option<Seed>, RegistryError> {
        Ok(self.get_game(game_id)?.seed)
    }

    /// Disclosed board, if any.
    pub fn get_revealed_board(&self, game_id: GameId) -> Result<Option<&Board>, RegistryError> {
        Ok(self.get_game(game_id)?.revealed_board.as_ref())
    }

    /// The single handle of a packed board.
    pub fn get_encrypted_board(&self, game_id: GameId) -> Result<CiphertextHandle, RegistryError> {
        match self.store.encoding(game_id)? {
            BoardEncoding::Packed(handle) => Ok(*handle),
            BoardEncoding::PerTile(_) => Err(RegistryError::NotPacked(game_id)),
        }
    }

    /// Stored handle count: tile count for per-tile boards, 1 for packed.
    pub fn get_encrypted_board_length(&self, game_id: GameId) -> Result<usize, RegistryError> {
        Ok(self.store.length(game_id)?)
    }

    /// Handle for one tile.
    pub fn get_encrypted_tile(
        &self,
        game_id: GameId,
        index: usize,
    ) -> Result<CiphertextHandle, RegistryError> {
        Ok(self.store.get(game_id, index)?)
    }

    /// Full encoding.
    pub fn get_encoding(&self, game_id: GameId) -> Result<&BoardEncoding, RegistryError> {
        Ok(self.store.encoding(game_id)?)
    }

    /// Number of games created.
    pub fn game_count(&self) -> u64 {
        self.next_id
    }

    /// Registry contract identity.
    pub fn contract(&self) -> Identity {
        self.contract
    }

    /// All events in acceptance order.
    pub fn events(&self) -> &[RegistryEvent] {
        &self.events
    }

    /// Events for one game.
    pub fn events_for(&self, game_id: GameId) -> impl Iterator<Item = &RegistryEvent> + '_ {
        self.events.iter().filter(move |e| e.game_id() == game_id)
    }

    /// Accepted transitions.
    pub fn journal(&self) -> &LedgerJournal {
        &self.journal
    }

    /// Digest over every game record and stored encoding.
    pub fn state_root(&self) -> Hash32 {
        let mut hasher = DigestHasher::for_registry_state();
        hasher.update_address(&self.contract.address());
        hasher.update_u64(self.next_id);
        for game in self.games.values() {
            game.hash_into(&mut hasher);
        }
        self.store.hash_into(&mut hasher);
        hasher.finalize()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proof::commitment::commit;
    use alloy_primitives::{Address, B256};
    use proptest::prelude::*;

    struct AcceptAll;

    impl InputVerifier for AcceptAll {
        fn verify_input(
            &self,
            _target: &EncryptTarget,
            _handles: &[CiphertextHandle],
            _proof: &InputProof,
        ) -> Result<(), OracleError> {
            Ok(())
        }
    }

    struct RejectAll;

    impl InputVerifier for RejectAll {
        fn verify_input(
            &self,
            _target: &EncryptTarget,
            _handles: &[CiphertextHandle],
            _proof: &InputProof,
        ) -> Result<(), OracleError> {
            Err(OracleError::InvalidProof("rejected".into()))
        }
    }

    fn contract() -> Identity {
        Identity::new(Address::repeat_byte(0xCC))
    }

    fn player() -> Identity {
        Identity::new(Address::repeat_byte(0x11))
    }

    fn stranger() -> Identity {
        Identity::new(Address::repeat_byte(0x22))
    }

    fn handle(byte: u8) -> CiphertextHandle {
        CiphertextHandle::new(B256::repeat_byte(byte))
    }

    fn registry() -> GameRegistry {
        GameRegistry::new(contract(), Arc::new(AcceptAll))
    }

    /// Packed game over `[0,0,1,0,0]` committed to seed 123456.
    fn packed_game(registry: &mut GameRegistry) -> GameId {
        let commit_hash = commit(&Seed::from(123456), &player(), 5);
        registry
            .create_game(
                &player(),
                BoardEncoding::Packed(handle(1)),
                &InputProof::default(),
                commit_hash,
                5,
            )
            .unwrap()
    }

    fn ended_game(registry: &mut GameRegistry) -> GameId {
        let id = packed_game(registry);
        registry.pick_tile(&player(), id, 0).unwrap();
        registry.end_game(&player(), id).unwrap();
        id
    }

    // -------------------------------------------------------------------------
    // Reference scenarios
    // -------------------------------------------------------------------------

    #[test]
    fn test_full_lifecycle_packed() {
        let mut registry = registry();
        let id = packed_game(&mut registry);
        assert_eq!(id, GameId(0));

        registry.pick_tile(&player(), id, 0).unwrap();
        assert_eq!(registry.get_state(id).unwrap(), GameStatus::Active);

        registry.end_game(&player(), id).unwrap();
        assert_eq!(registry.get_state(id).unwrap(), GameStatus::Ended);

        registry.reveal_seed(&player(), id, Seed::from(123456)).unwrap();
        registry
            .reveal_game(&player(), id, BoardDisclosure::Packed(0b00100))
            .unwrap();

        let game = registry.get_game(id).unwrap();
        assert!(game.is_revealed());
        assert_eq!(
            game.revealed_board.as_ref().unwrap().to_values(),
            vec![0, 0, 1, 0, 0]
        );
    }

    #[test]
    fn test_wrong_seed_commit_mismatch() {
        let mut registry = registry();
        let id = ended_game(&mut registry);
        let journal_len = registry.journal().len();

        let result = registry.reveal_seed(&player(), id, Seed::from(222));
        assert_eq!(result, Err(RegistryError::CommitMismatch(id)));

        assert_eq!(registry.get_state(id).unwrap(), GameStatus::Ended);
        assert_eq!(registry.get_seed(id).unwrap(), None);
        assert_eq!(registry.journal().len(), journal_len);
    }

    #[test]
    fn test_per_tile_length_and_index() {
        let mut registry = registry();
        let handles: Vec<_> = (0..4).map(handle).collect();
        let id = registry
            .create_game(
                &player(),
                BoardEncoding::PerTile(handles.clone()),
                &InputProof::default(),
                commit(&Seed::from(1), &player(), 4),
                4,
            )
            .unwrap();

        assert_eq!(registry.get_encrypted_board_length(id).unwrap(), 4);
        assert_eq!(registry.get_encrypted_tile(id, 0).unwrap(), handles[0]);
        assert_eq!(
            registry.get_encrypted_tile(id, 4),
            Err(RegistryError::IndexOutOfRange {
                game_id: id,
                index: 4,
                length: 4
            })
        );
    }

    #[test]
    fn test_pick_twice_already_opened() {
        let mut registry = registry();
        let id = packed_game(&mut registry);

        registry.pick_tile(&player(), id, 0).unwrap();
        let result = registry.pick_tile(&player(), id, 0);
        assert_eq!(result, Err(RegistryError::AlreadyOpened { game_id: id, index: 0 }));
        assert_eq!(registry.get_opened_count(id).unwrap(), 1);
    }

    #[test]
    fn test_zero_board_size_rejected() {
        let mut registry = registry();
        let result = registry.create_game(
            &player(),
            BoardEncoding::Packed(handle(1)),
            &InputProof::default(),
            CommitHash::default(),
            0,
        );

        assert!(matches!(result, Err(RegistryError::InvalidBoardSize { size: 0, .. })));
        assert_eq!(registry.game_count(), 0);
        assert_eq!(
            registry.get_state(GameId(0)),
            Err(RegistryError::GameNotFound(GameId(0)))
        );
    }

    // -------------------------------------------------------------------------
    // State machine
    // -------------------------------------------------------------------------

    #[test]
    fn test_end_twice_fails() {
        let mut registry = registry();
        let id = ended_game(&mut registry);

        let result = registry.end_game(&player(), id);
        assert_eq!(
            result,
            Err(RegistryError::InvalidState {
                game_id: id,
                status: GameStatus::Ended
            })
        );
    }

    #[test]
    fn test_pick_after_end_fails() {
        let mut registry = registry();
        let id = ended_game(&mut registry);

        let result = registry.pick_tile(&player(), id, 1);
        assert!(matches!(result, Err(RegistryError::InvalidState { .. })));
        assert_eq!(registry.get_opened_count(id).unwrap(), 1);
    }

    #[test]
    fn test_pick_out_of_range() {
        let mut registry = registry();
        let id = packed_game(&mut registry);

        let result = registry.pick_tile(&player(), id, 5);
        assert!(matches!(result, Err(RegistryError::IndexOutOfRange { index: 5, .. })));
    }

    #[test]
    fn test_reveal_seed_while_active() {
        let mut registry = registry();
        let id = packed_game(&mut registry);

        let result = registry.reveal_seed(&player(), id, Seed::from(123456));
        assert!(matches!(result, Err(RegistryError::InvalidState { .. })));
    }

    #[test]
    fn test_reveal_seed_once() {
        let mut registry = registry();
        let id = ended_game(&mut registry);

        registry.reveal_seed(&player(), id, Seed::from(123456)).unwrap();
        let result = registry.reveal_seed(&player(), id, Seed::from(123456));
        assert_eq!(result, Err(RegistryError::SeedAlreadyRevealed(id)));
    }

    #[test]
    fn test_reveal_game_requires_seed() {
        let mut registry = registry();
        let id = ended_game(&mut registry);

        let result = registry.reveal_game(&player(), id, BoardDisclosure::Packed(0b00100));
        assert_eq!(result, Err(RegistryError::SeedNotRevealed(id)));
    }

    #[test]
    fn test_reveal_game_once() {
        let mut registry = registry();
        let id = ended_game(&mut registry);
        registry.reveal_seed(&player(), id, Seed::from(123456)).unwrap();
        registry
            .reveal_game(&player(), id, BoardDisclosure::Packed(0b00100))
            .unwrap();

        let result = registry.reveal_game(&player(), id, BoardDisclosure::Packed(0b00001));
        assert_eq!(result, Err(RegistryError::BoardAlreadyRevealed(id)));
        assert_eq!(
            registry.get_revealed_board(id).unwrap().unwrap().to_values(),
            vec![0, 0, 1, 0, 0]
        );
    }

    #[test]
    fn test_reveal_game_shape_checked() {
        let mut registry = registry();
        let id = ended_game(&mut registry);
        registry.reveal_seed(&player(), id, Seed::from(123456)).unwrap();

        let wrong_shape = registry.reveal_game(&player(), id, BoardDisclosure::Tiles(vec![0, 0, 1, 0, 0]));
        assert!(matches!(wrong_shape, Err(RegistryError::InvalidDisclosure { .. })));

        let stray_bits = registry.reveal_game(&player(), id, BoardDisclosure::Packed(0b100000));
        assert!(matches!(stray_bits, Err(RegistryError::InvalidDisclosure { .. })));

        assert_eq!(registry.get_revealed_board(id).unwrap(), None);
    }

    #[test]
    fn test_per_tile_reveal_length_checked() {
        let mut registry = registry();
        let seed = Seed::from(9);
        let id = registry
            .create_game(
                &player(),
                BoardEncoding::PerTile((0..4).map(handle).collect()),
                &InputProof::default(),
                commit(&seed, &player(), 4),
                4,
            )
            .unwrap();
        registry.end_game(&player(), id).unwrap();
        registry.reveal_seed(&player(), id, seed).unwrap();

        let short = registry.reveal_game(&player(), id, BoardDisclosure::Tiles(vec![0, 0, 1]));
        assert!(matches!(short, Err(RegistryError::InvalidDisclosure { .. })));

        registry
            .reveal_game(&player(), id, BoardDisclosure::Tiles(vec![0, 0, 1, 0]))
            .unwrap();
        assert!(registry.get_game(id).unwrap().is_revealed());
    }

    // -------------------------------------------------------------------------
    // Creation checks
    // -------------------------------------------------------------------------

    #[test]
    fn test_packed_limit() {
        let mut registry = registry();
        let result = registry.create_game(
            &player(),
            BoardEncoding::Packed(handle(1)),
            &InputProof::default(),
            CommitHash::default(),
            65,
        );
        assert_eq!(result, Err(RegistryError::InvalidBoardSize { size: 65, max: 64 }));
    }

    #[test]
    fn test_per_tile_handle_count() {
        let mut registry = registry();
        let result = registry.create_game(
            &player(),
            BoardEncoding::PerTile(vec![handle(1), handle(2)]),
            &InputProof::default(),
            CommitHash::default(),
            3,
        );
        assert_eq!(
            result,
            Err(RegistryError::EncodingMismatch {
                board_size: 3,
                handles: 2
            })
        );
    }

    #[test]
    fn test_invalid_proof_rejected() {
        let mut registry = GameRegistry::new(contract(), Arc::new(RejectAll));
        let result = registry.create_game(
            &player(),
            BoardEncoding::Packed(handle(1)),
            &InputProof::default(),
            CommitHash::default(),
            5,
        );

        assert!(matches!(result, Err(RegistryError::InvalidProof(_))));
        assert_eq!(registry.game_count(), 0);
        assert!(registry.events().is_empty());
    }

    #[test]
    fn test_ids_monotonic() {
        let mut registry = registry();
        assert_eq!(packed_game(&mut registry), GameId(0));
        assert_eq!(packed_game(&mut registry), GameId(1));
        assert_eq!(registry.game_count(), 2);
    }

    // -------------------------------------------------------------------------
    // Access control and immutability
    // -------------------------------------------------------------------------

    #[test]
    fn test_transitions_creator_only() {
        let mut registry = registry();
        let id = packed_game(&mut registry);

        let not_owner = RegistryError::NotOwner {
            game_id: id,
            caller: stranger(),
        };
        assert_eq!(registry.pick_tile(&stranger(), id, 0), Err(not_owner.clone()));
        assert_eq!(registry.end_game(&stranger(), id), Err(not_owner.clone()));

        registry.end_game(&player(), id).unwrap();
        assert_eq!(
            registry.reveal_seed(&stranger(), id, Seed::from(123456)),
            Err(not_owner.clone())
        );
        registry.reveal_seed(&player(), id, Seed::from(123456)).unwrap();
        assert_eq!(
            registry.reveal_game(&stranger(), id, BoardDisclosure::Packed(0b00100)),
            Err(not_owner)
        );

        // Reads are open
        assert_eq!(registry.get_owner(id).unwrap(), player());
    }

    #[test]
    fn test_commitment_and_handles_immutable() {
        let mut registry = registry();
        let id = packed_game(&mut registry);
        let commit_before = registry.get_commit_hash(id).unwrap();
        let handle_before = registry.get_encrypted_board(id).unwrap();

        registry.pick_tile(&player(), id, 2).unwrap();
        registry.end_game(&player(), id).unwrap();
        let _ = registry.reveal_seed(&player(), id, Seed::from(5));
        registry.reveal_seed(&player(), id, Seed::from(123456)).unwrap();
        registry
            .reveal_game(&player(), id, BoardDisclosure::Packed(0b00100))
            .unwrap();

        assert_eq!(registry.get_commit_hash(id).unwrap(), commit_before);
        assert_eq!(registry.get_encrypted_board(id).unwrap(), handle_before);
    }

    #[test]
    fn test_packed_accessor_on_per_tile() {
        let mut registry = registry();
        let id = registry
            .create_game(
                &player(),
                BoardEncoding::PerTile(vec![handle(1)]),
                &InputProof::default(),
                CommitHash::default(),
                1,
            )
            .unwrap();
        assert_eq!(registry.get_encrypted_board(id), Err(RegistryError::NotPacked(id)));
    }

    // -------------------------------------------------------------------------
    // Events, journal, state root
    // -------------------------------------------------------------------------

    #[test]
    fn test_events_in_order() {
        let mut registry = registry();
        let id = ended_game(&mut registry);
        let _ = registry.pick_tile(&player(), id, 1);
        registry.reveal_seed(&player(), id, Seed::from(123456)).unwrap();

        let names: Vec<_> = registry.events_for(id).map(|e| e.name()).collect();
        assert_eq!(
            names,
            vec!["game_created", "tile_picked", "game_ended", "seed_revealed"]
        );
        assert_eq!(registry.journal().len(), 4);
    }

    #[test]
    fn test_state_root_tracks_changes() {
        let mut registry = registry();
        let id = packed_game(&mut registry);
        let root_before = registry.state_root();

        // Failed transition changes nothing
        let _ = registry.pick_tile(&player(), id, 9);
        assert_eq!(registry.state_root(), root_before);

        registry.pick_tile(&player(), id, 1).unwrap();
        assert_ne!(registry.state_root(), root_before);
    }

    proptest! {
        #[test]
        fn prop_opened_count_is_distinct_successful_picks(
            picks in prop::collection::vec(0usize..8, 0..40),
        ) {
            let mut registry = registry();
            let id = packed_game(&mut registry);
            let mut opened = std::collections::BTreeSet::new();

            for index in picks {
                let result = registry.pick_tile(&player(), id, index);
                if index < 5 && opened.insert(index) {
                    prop_assert!(result.is_ok());
                } else {
                    prop_assert!(result.is_err());
                }
                prop_assert_eq!(registry.get_opened_count(id).unwrap(), opened.len());
            }

            for index in 0..5 {
                prop_assert_eq!(registry.is_opened(id, index).unwrap(), opened.contains(&index));
            }
        }
    }
}
