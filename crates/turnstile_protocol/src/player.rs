//! Seats and the users who occupy them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stable seat index. Engine and history address players by position.
pub type Position = u32;

/// Identifier of a user who may attach a presentation surface.
pub type UserId = String;

/// A seated (or reserved) player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// Occupying user. `None` for a reserved seat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<UserId>,
    /// Seat index, unique within a session.
    pub position: Position,
    /// Display name.
    pub name: String,
    /// Display color.
    pub color: String,
    /// Per-player game settings, opaque to the host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
    /// Readiness flag used by start gating.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready: Option<bool>,
}

impl Player {
    /// Returns true if this seat belongs to the given user.
    pub fn is_user(&self, user: &str) -> bool {
        self.id.as_deref() == Some(user)
    }

    /// Returns true if the player has marked themselves ready.
    pub fn is_ready(&self) -> bool {
        self.ready.unwrap_or(false)
    }
}

/// A user known to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User ID.
    pub id: UserId,
    /// User's name.
    pub name: String,
}
