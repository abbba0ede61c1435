//! Presentation <-> Host envelopes.

use crate::game::GameSettings;
use crate::player::{Position, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Id the presentation attaches to intents that expect an acknowledgment.
pub type IntentId = String;

/// Something a presentation surface asks the host to do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Intent {
    /// The surface finished loading and wants the current picture.
    Ready,
    /// Submit a move for the viewer's seat.
    Move {
        /// Ack id.
        id: IntentId,
        /// Opaque move payload.
        data: Value,
    },
    /// Replace settings (host only).
    UpdateSettings {
        /// Ack id.
        id: IntentId,
        /// New settings.
        settings: GameSettings,
        /// Requested number of seats.
        #[serde(default)]
        seat_count: Option<usize>,
    },
    /// Apply a batch of seat operations.
    UpdatePlayers {
        /// Ack id.
        id: IntentId,
        /// Operations, applied in order, all or nothing.
        operations: Vec<PlayerOperation>,
    },
    /// Start the game (host only).
    Start {
        /// Ack id.
        id: IntentId,
    },
    /// Local key press forwarded from the surface.
    Key {
        /// Key code, e.g. `Digit1`.
        code: String,
    },
}

impl Intent {
    /// Returns the ack id if this intent expects a `messageProcessed`.
    pub fn ack_id(&self) -> Option<&IntentId> {
        match self {
            Self::Move { id, .. }
            | Self::UpdateSettings { id, .. }
            | Self::UpdatePlayers { id, .. }
            | Self::Start { id } => Some(id),
            Self::Ready | Self::Key { .. } => None,
        }
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Move { .. } => "move",
            Self::UpdateSettings { .. } => "updateSettings",
            Self::UpdatePlayers { .. } => "updatePlayers",
            Self::Start { .. } => "start",
            Self::Key { .. } => "key",
        }
    }
}

/// One seat operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PlayerOperation {
    /// Seat a user.
    Seat {
        /// Seat index.
        position: Position,
        /// User taking the seat.
        user_id: UserId,
        /// Display color.
        color: String,
        /// Display name.
        name: String,
        /// Per-player settings.
        settings: Option<Value>,
    },
    /// Free a seat.
    Unseat {
        /// Seat index.
        position: Position,
    },
    /// Change details of an occupied seat.
    Update {
        /// Seat index.
        position: Position,
        /// New color.
        color: Option<String>,
        /// New name.
        name: Option<String>,
        /// New per-player settings.
        settings: Option<Value>,
        /// New readiness.
        ready: Option<bool>,
    },
    /// Hold a seat without a user.
    Reserve {
        /// Seat index.
        position: Position,
        /// Display color.
        color: String,
        /// Display name.
        name: String,
        /// Per-player settings.
        settings: Option<Value>,
    },
}

/// Seat details attached to a user in the roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDetails {
    /// Seat index.
    pub position: Position,
    /// Display color.
    pub color: String,
    /// Per-player settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
    /// Readiness.
    pub ready: bool,
}

/// A roster entry pushed to the presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    /// User ID, absent for reserved seats.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<UserId>,
    /// Name.
    pub name: String,
    /// Seat details, if seated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_details: Option<PlayerDetails>,
}

/// Something the host pushes to the presentation surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PresentationEvent {
    /// Roster changed.
    Users {
        /// All known users.
        users: Vec<UserSummary>,
    },
    /// Settings changed before start.
    SettingsUpdate {
        /// Current settings.
        settings: GameSettings,
        /// Requested number of seats.
        seat_count: usize,
    },
    /// New view of a running game.
    GameUpdate {
        /// Viewer's seat.
        position: Position,
        /// Projected view for that seat.
        state: Value,
        /// Positions whose turn it is.
        current_players: Vec<Position>,
        /// True while the host pins an earlier point in history.
        read_only: bool,
    },
    /// The game is over.
    GameFinished {
        /// Viewer's seat.
        position: Position,
        /// Projected view for that seat.
        state: Value,
        /// Winning positions.
        winners: Vec<Position>,
    },
    /// Disposition of an intent.
    MessageProcessed {
        /// Id of the acknowledged intent.
        id: IntentId,
        /// Human-readable failure, absent on success.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}
