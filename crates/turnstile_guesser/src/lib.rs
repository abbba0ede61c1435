//! Number guesser - pure game logic for a seeded guessing game.
//!
//! Players take turns guessing a hidden number drawn from the session
//! seed. The first correct guess wins. The rules are deterministic given
//! the seed, so a recorded move list always replays to the same history.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod rules;
mod state;

pub use rules::NumberGuesser;
pub use state::{Guess, GuesserSettings, GuesserState};
