//! Host error types.

use crate::channel::ContextKind;
use crate::session::SessionPhase;
use derive_more::{Display, Error};
use tracing::instrument;
use turnstile_protocol::{Position, RequestId, UserId};

/// What went wrong, without location details.
///
/// The `Display` form of this enum is what the presentation sees in a
/// `messageProcessed` ack.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum HostErrorKind {
    /// The mover is not among the current players.
    #[display("not your turn (position {})", position)]
    NotYourTurn {
        /// Position that tried to move.
        position: Position,
    },

    /// The engine rejected a call with its own reason.
    #[display("{}", _0)]
    EngineRejected(String),

    /// Replay stopped at a move the engine no longer accepts.
    #[display("replay halted at move {}: {}", index, reason)]
    ReplayHalted {
        /// Zero-based index of the failing move.
        index: usize,
        /// Engine's reason.
        reason: String,
    },

    /// Snapshot save/load failed.
    #[display("persistence failure: {}", _0)]
    PersistenceFailure(String),

    /// A response arrived for an id nobody is waiting on.
    #[display("no pending request with id {}", _0)]
    OrphanResponse(RequestId),

    /// The other side of a channel went away.
    #[display("{} context closed", _0)]
    ContextClosed(ContextKind),

    /// Operation not allowed in the current phase.
    #[display("game is {}, expected {}", actual, expected)]
    InvalidPhase {
        /// Phase the operation needs.
        expected: SessionPhase,
        /// Phase the session is in.
        actual: SessionPhase,
    },

    /// Privileged operation attempted by a non-host user.
    #[display("only the host may do that")]
    Unauthorized,

    /// Seat is already occupied.
    #[display("seat {} is already taken", _0)]
    SeatConflict(Position),

    /// Seat is empty.
    #[display("no player in seat {}", _0)]
    UnknownSeat(Position),

    /// Seated count outside configured bounds.
    #[display("{} players seated, need between {} and {}", count, min, max)]
    SeatLimit {
        /// Seated players.
        count: usize,
        /// Configured minimum.
        min: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Start gated on readiness.
    #[display("players not ready: {:?}", _0)]
    NotReady(Vec<Position>),

    /// History index out of range.
    #[display("history has no entry {}", _0)]
    HistoryOutOfRange(i64),

    /// The game already reached its terminal phase.
    #[display("game is already finished")]
    GameFinished,

    /// User is not on the roster.
    #[display("unknown user '{}'", _0)]
    UnknownUser(UserId),

    /// The viewer does not occupy a seat.
    #[display("you are not seated")]
    NotSeated,

    /// No game has been started.
    #[display("no game in progress")]
    NoGame,

    /// A message could not be encoded or decoded.
    #[display("codec error: {}", _0)]
    Codec(String),
}

/// Host error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Host error: {} at {}:{}", kind, file, line)]
pub struct HostError {
    /// What went wrong.
    pub kind: HostErrorKind,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl HostError {
    /// Creates a new host error with caller location tracking.
    #[track_caller]
    #[instrument]
    pub fn new(kind: HostErrorKind) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            kind,
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// Returns the error kind.
    pub fn kind(&self) -> &HostErrorKind {
        &self.kind
    }

    /// Human-readable reason, without the location suffix.
    pub fn reason(&self) -> String {
        self.kind.to_string()
    }
}

impl From<HostErrorKind> for HostError {
    #[track_caller]
    fn from(kind: HostErrorKind) -> Self {
        Self::new(kind)
    }
}

impl From<serde_json::Error> for HostError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        Self::new(HostErrorKind::Codec(err.to_string()))
    }
}

impl From<std::io::Error> for HostError {
    #[track_caller]
    fn from(err: std::io::Error) -> Self {
        Self::new(HostErrorKind::PersistenceFailure(err.to_string()))
    }
}
