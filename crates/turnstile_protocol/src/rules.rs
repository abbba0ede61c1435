//! Engine-side game rules.

use crate::game::{GameState, GameUpdate, Move, RandomSeed, SetupState};
use crate::player::Position;
use derive_more::{Display, Error};
use serde_json::Value;

/// A rules-level rejection, carried back to the host as a string.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("{}", message)]
pub struct RulesError {
    /// Human-readable reason.
    pub message: String,
}

impl RulesError {
    /// Creates a new rules error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Pure game rules evaluated inside the engine context.
///
/// Implementations must be deterministic given their inputs and the seed,
/// so that replaying a move list reproduces the same history.
pub trait Rules: Send + Sync {
    /// Builds the genesis state for the seated players.
    fn initial_state(
        &self,
        setup: &SetupState,
        seed: &RandomSeed,
    ) -> Result<GameUpdate, RulesError>;

    /// Applies one move to `previous`.
    fn process_move(
        &self,
        previous: &GameState,
        mv: &Move,
        seed: &RandomSeed,
    ) -> Result<GameUpdate, RulesError>;

    /// Projects `state` for a single position.
    fn player_state(&self, state: &GameState, position: Position) -> Result<Value, RulesError>;
}
