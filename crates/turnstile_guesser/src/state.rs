//! Typed views over the engine's opaque state map.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use turnstile_protocol::{GameSettings, Position, RulesError};

/// Settings understood by the number guesser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuesserSettings {
    /// Restrict guesses (and the hidden number) to even values.
    #[serde(default)]
    pub even_only: bool,
    /// Largest possible number.
    #[serde(default = "default_max")]
    pub max: u32,
}

fn default_max() -> u32 {
    10
}

impl Default for GuesserSettings {
    fn default() -> Self {
        Self {
            even_only: false,
            max: default_max(),
        }
    }
}

impl GuesserSettings {
    /// Reads settings from the host's free-form settings map.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError`] if a known key has the wrong type.
    pub fn from_settings(settings: &GameSettings) -> Result<Self, RulesError> {
        serde_json::from_value(Value::Object(settings.clone()))
            .map_err(|e| RulesError::new(format!("invalid settings: {}", e)))
    }

    /// All numbers a player may guess.
    pub fn possible_guesses(&self) -> Vec<u32> {
        (1..=self.max)
            .filter(|n| !self.even_only || n % 2 == 0)
            .collect()
    }
}

/// The most recent wrong guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guess {
    /// Who guessed.
    pub position: Position,
    /// What they guessed.
    pub number: u32,
}

/// Engine-specific part of the game state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuesserState {
    /// Hidden number.
    pub number: u32,
    /// Count of wrong guesses so far.
    #[serde(rename = "move")]
    pub move_count: u32,
    /// Numbers a player may guess.
    pub possible_guesses: Vec<u32>,
    /// Seated positions in turn order.
    pub positions: Vec<Position>,
    /// Most recent wrong guess.
    #[serde(default)]
    pub last_guess: Option<Guess>,
}

impl GuesserState {
    /// Parses the engine state out of a [`turnstile_protocol::GameState`] data map.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError`] if the map was not produced by this engine.
    pub fn from_data(data: &Map<String, Value>) -> Result<Self, RulesError> {
        serde_json::from_value(Value::Object(data.clone()))
            .map_err(|e| RulesError::new(format!("unrecognized game state: {}", e)))
    }

    /// Serializes back into a data map.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError`] if serialization fails.
    pub fn to_data(&self) -> Result<Map<String, Value>, RulesError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(RulesError::new("game state did not serialize to an object")),
            Err(e) => Err(RulesError::new(format!("failed to serialize state: {}", e))),
        }
    }

    /// Position that moves after `position`, wrapping around the table.
    pub fn next_after(&self, position: Position) -> Option<Position> {
        let idx = self.positions.iter().position(|p| *p == position)?;
        self.positions
            .get((idx + 1) % self.positions.len())
            .copied()
    }
}
