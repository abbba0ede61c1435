//! Turnstile protocol - the message shapes that cross context boundaries.
//!
//! The host, the engine and the presentation surface never share memory.
//! Everything they exchange is one of the types in this crate, serialized
//! to JSON text on one side and parsed back on the other.
//!
//! # Directions
//!
//! - **Host -> Engine**: [`EngineRequest`], answered by [`EngineResponse`]
//! - **Presentation -> Host**: [`Intent`]
//! - **Host -> Presentation**: [`PresentationEvent`]
//! - **Live reload -> Host**: [`ControlEvent`]
//!
//! Game rules plug in on the engine side through the [`Rules`] trait.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod control;
mod engine;
mod game;
mod player;
mod presentation;
mod rules;

// Crate-level exports - Players and users
pub use player::{Player, Position, User, UserId};

// Crate-level exports - Game state
pub use game::{
    GamePhase, GameSettings, GameState, GameUpdate, Message, Move, PlayerState, RandomSeed,
    SetupState,
};

// Crate-level exports - Engine envelopes
pub use engine::{Correlated, EngineRequest, EngineResponse, RequestId};

// Crate-level exports - Presentation envelopes
pub use presentation::{
    Intent, IntentId, PlayerDetails, PlayerOperation, PresentationEvent, UserSummary,
};

// Crate-level exports - Live reload
pub use control::{ControlEvent, ReloadTarget};

// Crate-level exports - Engine-side rules
pub use rules::{Rules, RulesError};
