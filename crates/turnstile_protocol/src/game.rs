//! Game state as reported by the engine.
//!
//! The host treats almost everything here as opaque. It only reads the
//! phase, the players whose turn it is, and the winners.

use crate::player::{Player, Position};
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::instrument;

/// Free-form game settings chosen by the host before start.
pub type GameSettings = Map<String, Value>;

/// Phase of a running game as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GamePhase {
    /// Moves are being accepted.
    Started,
    /// Terminal. Winners are known.
    Finished,
}

/// Engine-owned game state.
///
/// `phase`, `currentPlayers` and `winners` are the only fields the host
/// interprets. Everything else rides along in `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    /// Current phase.
    pub phase: GamePhase,
    /// Positions allowed to move next.
    #[serde(default)]
    pub current_players: Vec<Position>,
    /// Winning positions once finished.
    #[serde(default)]
    pub winners: Vec<Position>,
    /// Engine-specific state.
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl GameState {
    /// Creates a started state waiting on the given positions.
    pub fn started(current_players: Vec<Position>, data: Map<String, Value>) -> Self {
        Self {
            phase: GamePhase::Started,
            current_players,
            winners: Vec::new(),
            data,
        }
    }

    /// Creates a finished state with the given winners.
    pub fn finished(winners: Vec<Position>, data: Map<String, Value>) -> Self {
        Self {
            phase: GamePhase::Finished,
            current_players: Vec::new(),
            winners,
            data,
        }
    }

    /// Returns true once the game has reached its terminal phase.
    pub fn is_finished(&self) -> bool {
        self.phase == GamePhase::Finished
    }

    /// Returns true if `position` may move in this state.
    #[instrument(skip(self), fields(phase = %self.phase))]
    pub fn is_turn_of(&self, position: Position) -> bool {
        self.phase == GamePhase::Started && self.current_players.contains(&position)
    }
}

/// The view one position is entitled to see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    /// Seat this view belongs to.
    pub position: Position,
    /// Engine-specific projection.
    pub state: Value,
}

/// Narrative log line produced by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Position the line is about, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Text.
    pub body: String,
}

/// Everything the engine returns after initializing or applying a move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameUpdate {
    /// New game state.
    pub game: GameState,
    /// Per-position projections of the new state.
    #[serde(default)]
    pub players: Vec<PlayerState>,
    /// Narrative produced by this step.
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl GameUpdate {
    /// Looks up the projection for `position`, if the engine provided one.
    pub fn player_state(&self, position: Position) -> Option<&Value> {
        self.players
            .iter()
            .find(|p| p.position == position)
            .map(|p| &p.state)
    }
}

/// A move submitted by a seat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Move {
    /// Mover.
    pub position: Position,
    /// Opaque move payload.
    pub data: Value,
}

/// Inputs to engine initialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupState {
    /// Seated players.
    pub players: Vec<Player>,
    /// Chosen settings.
    pub settings: GameSettings,
}

/// Session-wide randomness source, captured once and threaded through
/// every engine call that needs it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From)]
#[serde(transparent)]
pub struct RandomSeed(String);

impl RandomSeed {
    /// Generates a fresh random seed.
    #[instrument]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the seed text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RandomSeed {
    fn from(seed: &str) -> Self {
        Self(seed.to_string())
    }
}
