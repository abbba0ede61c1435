//! Host <-> Engine envelopes.
//!
//! Every request carries a correlation id that the engine echoes back on
//! its response.

use crate::game::{GameState, GameUpdate, Move, RandomSeed, SetupState};
use crate::player::Position;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Correlation id pairing an outbound call with its response.
pub type RequestId = u64;

/// Calls the host makes into the engine context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EngineRequest {
    /// Build the genesis state.
    InitialState {
        /// Correlation id.
        id: RequestId,
        /// Seated players and settings.
        setup: SetupState,
        /// Session seed.
        random_seed: RandomSeed,
    },
    /// Apply one move to a previous state.
    ProcessMove {
        /// Correlation id.
        id: RequestId,
        /// State the move applies to.
        previous_state: GameState,
        /// The move.
        #[serde(rename = "move")]
        mv: Move,
        /// Session seed.
        random_seed: RandomSeed,
    },
    /// Project a state for one position.
    GetPlayerState {
        /// Correlation id.
        id: RequestId,
        /// State to project.
        state: GameState,
        /// Position to project for.
        position: Position,
    },
}

impl EngineRequest {
    /// Returns the correlation id of this request.
    pub fn id(&self) -> RequestId {
        match self {
            Self::InitialState { id, .. }
            | Self::ProcessMove { id, .. }
            | Self::GetPlayerState { id, .. } => *id,
        }
    }
}

/// Answers the engine sends back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EngineResponse {
    /// Answer to [`EngineRequest::InitialState`].
    InitialStateResult {
        /// Correlation id.
        id: RequestId,
        /// Failure reason, if the engine threw.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        /// Genesis update.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        state: Option<GameUpdate>,
    },
    /// Answer to [`EngineRequest::ProcessMove`].
    ProcessMoveResult {
        /// Correlation id.
        id: RequestId,
        /// Failure reason, if the move was rejected.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        /// Post-move update.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        state: Option<GameUpdate>,
    },
    /// Answer to [`EngineRequest::GetPlayerState`].
    GetPlayerStateResult {
        /// Correlation id.
        id: RequestId,
        /// Failure reason, if projection failed.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        /// Projected view.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        state: Option<Value>,
    },
}

/// A response that can be matched to the call that produced it.
pub trait Correlated {
    /// Id of the originating call.
    fn correlation_id(&self) -> RequestId;

    /// Failure reason carried by the response, if any.
    fn failure(&self) -> Option<&str>;
}

impl Correlated for EngineResponse {
    fn correlation_id(&self) -> RequestId {
        match self {
            Self::InitialStateResult { id, .. }
            | Self::ProcessMoveResult { id, .. }
            | Self::GetPlayerStateResult { id, .. } => *id,
        }
    }

    fn failure(&self) -> Option<&str> {
        match self {
            Self::InitialStateResult { error, .. }
            | Self::ProcessMoveResult { error, .. }
            | Self::GetPlayerStateResult { error, .. } => error.as_deref(),
        }
    }
}
