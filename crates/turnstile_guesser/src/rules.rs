//! The number guesser's [`Rules`] implementation.

use crate::state::{Guess, GuesserSettings, GuesserState};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};
use turnstile_protocol::{
    GameState, GameUpdate, Message, Move, PlayerState, Position, RandomSeed, Rules, RulesError,
    SetupState,
};

/// Seeded number-guessing game.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberGuesser;

impl NumberGuesser {
    /// Creates the rules.
    pub fn new() -> Self {
        Self
    }

    /// The hidden number a given seed produces under `settings`.
    ///
    /// Stable across runs and platforms: the seed text is hashed with
    /// SHA-256 and the first eight bytes pick an index into the possible
    /// guesses.
    #[instrument(skip(seed))]
    pub fn target_for(seed: &RandomSeed, settings: &GuesserSettings) -> Option<u32> {
        let guesses = settings.possible_guesses();
        if guesses.is_empty() {
            return None;
        }
        let digest = Sha256::digest(seed.as_str().as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        let idx = u64::from_be_bytes(bytes) % guesses.len() as u64;
        guesses.get(idx as usize).copied()
    }

    fn project(state: &GuesserState, game: &GameState, position: Position) -> Value {
        // The hidden number is only revealed once the game is over.
        let number = game.is_finished().then_some(state.number);
        json!({
            "position": position,
            "possibleGuesses": state.possible_guesses,
            "move": state.move_count,
            "lastGuess": state.last_guess,
            "yourTurn": game.is_turn_of(position),
            "number": number,
        })
    }

    fn update(state: &GuesserState, game: GameState, messages: Vec<Message>) -> GameUpdate {
        let players = state
            .positions
            .iter()
            .map(|&position| PlayerState {
                position,
                state: Self::project(state, &game, position),
            })
            .collect();
        GameUpdate {
            game,
            players,
            messages,
        }
    }
}

impl Rules for NumberGuesser {
    #[instrument(skip(self, setup, seed), fields(players = setup.players.len()))]
    fn initial_state(
        &self,
        setup: &SetupState,
        seed: &RandomSeed,
    ) -> Result<GameUpdate, RulesError> {
        let settings = GuesserSettings::from_settings(&setup.settings)?;
        let mut positions: Vec<Position> = setup.players.iter().map(|p| p.position).collect();
        positions.sort_unstable();
        positions.dedup();

        let first = *positions
            .first()
            .ok_or_else(|| RulesError::new("at least one player must be seated"))?;
        let number = Self::target_for(seed, &settings)
            .ok_or_else(|| RulesError::new("settings leave no possible guesses"))?;

        let state = GuesserState {
            number,
            move_count: 0,
            possible_guesses: settings.possible_guesses(),
            positions,
            last_guess: None,
        };
        info!(first, "Number guesser initialized");
        let game = GameState::started(vec![first], state.to_data()?);
        Ok(Self::update(&state, game, Vec::new()))
    }

    #[instrument(skip(self, previous, mv, _seed), fields(position = mv.position))]
    fn process_move(
        &self,
        previous: &GameState,
        mv: &Move,
        _seed: &RandomSeed,
    ) -> Result<GameUpdate, RulesError> {
        if previous.is_finished() {
            return Err(RulesError::new("game is already over"));
        }
        if !previous.is_turn_of(mv.position) {
            warn!(position = mv.position, "Move out of turn");
            return Err(RulesError::new("not your turn"));
        }

        let mut state = GuesserState::from_data(&previous.data)?;
        let number = mv
            .data
            .get("number")
            .and_then(Value::as_u64)
            .ok_or_else(|| RulesError::new("move must carry a number"))?;
        let number = u32::try_from(number)
            .map_err(|_| RulesError::new(format!("{} is not a possible guess", number)))?;
        if !state.possible_guesses.contains(&number) {
            return Err(RulesError::new(format!("{} is not a possible guess", number)));
        }

        if number == state.number {
            info!(position = mv.position, number, "Correct guess");
            let message = Message {
                position: Some(mv.position),
                body: format!("player {} guessed {} and wins", mv.position, number),
            };
            state.last_guess = None;
            let game = GameState::finished(vec![mv.position], state.to_data()?);
            return Ok(Self::update(&state, game, vec![message]));
        }

        let hint = if number < state.number { "higher" } else { "lower" };
        debug!(position = mv.position, number, hint, "Wrong guess");
        state.move_count += 1;
        state.last_guess = Some(Guess {
            position: mv.position,
            number,
        });
        let next = state
            .next_after(mv.position)
            .ok_or_else(|| RulesError::new("mover is not seated"))?;
        let message = Message {
            position: Some(mv.position),
            body: format!("player {} guessed {}, go {}", mv.position, number, hint),
        };
        let game = GameState::started(vec![next], state.to_data()?);
        Ok(Self::update(&state, game, vec![message]))
    }

    #[instrument(skip(self, state))]
    fn player_state(&self, state: &GameState, position: Position) -> Result<Value, RulesError> {
        let guesser = GuesserState::from_data(&state.data)?;
        if !guesser.positions.contains(&position) {
            return Err(RulesError::new(format!("position {} is not seated", position)));
        }
        Ok(Self::project(&guesser, state, position))
    }
}
