//! Registry Events
//!
//! Emitted once per accepted transition, in acceptance order.

use serde::{Deserialize, Serialize};

use crate::game::state::{GameId, Identity, Seed};

/// Registry event data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegistryEvent {
    /// Game created and ciphertext stored.
    GameCreated {
        /// New game.
        game_id: GameId,
        /// Creator.
        owner: Identity,
        /// Tile count.
        board_size: u8,
    },

    /// Tile marked opened.
    TilePicked {
        /// Game.
        game_id: GameId,
        /// Opened index.
        index: usize,
        /// Opened count after this pick.
        opened_count: usize,
    },

    /// Game ended.
    GameEnded {
        /// Game.
        game_id: GameId,
    },

    /// Seed matched the commitment.
    SeedRevealed {
        /// Game.
        game_id: GameId,
        /// Revealed seed.
        seed: Seed,
    },

    /// Plaintext board disclosed.
    BoardRevealed {
        /// Game.
        game_id: GameId,
        /// Number of bombs in the disclosed board.
        bomb_count: usize,
    },
}

impl RegistryEvent {
    /// Game this event belongs to.
    pub fn game_id(&self) -> GameId {
        match self {
            RegistryEvent::GameCreated { game_id, .. }
            | RegistryEvent::TilePicked { game_id, .. }
            | RegistryEvent::GameEnded { game_id }
            | RegistryEvent::SeedRevealed { game_id, .. }
            | RegistryEvent::BoardRevealed { game_id, .. } => *game_id,
        }
    }

    /// Event name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            RegistryEvent::GameCreated { .. } => "game_created",
            RegistryEvent::TilePicked { .. } => "tile_picked",
            RegistryEvent::GameEnded { .. } => "game_ended",
            RegistryEvent::SeedRevealed { .. } => "seed_revealed",
            RegistryEvent::BoardRevealed { .. } => "board_revealed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_game_id() {
        let event = RegistryEvent::TilePicked {
            game_id: GameId(4),
            index: 2,
            opened_count: 1,
        };
        assert_eq!(event.game_id(), GameId(4));
        assert_eq!(event.name(), "tile_picked");
    }

    #[test]
    fn test_event_json_tag() {
        let event = RegistryEvent::GameEnded { game_id: GameId(1) };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"game_ended","game_id":1}"#);
    }
}
