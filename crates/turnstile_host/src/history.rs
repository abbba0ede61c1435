//! Append-only move history with time travel and deterministic replay.

use crate::engine::GameEngine;
use crate::error::{HostError, HostErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use turnstile_protocol::{GameSettings, GameUpdate, Message, Move, Player, Position, RandomSeed};

/// One accepted move and the state it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Zero-based, contiguous sequence number.
    pub seq: usize,
    /// Mover.
    pub position: Position,
    /// Opaque move payload.
    pub data: Value,
    /// Engine update after the move.
    pub state: GameUpdate,
}

impl HistoryEntry {
    /// Narrative produced by this move.
    pub fn messages(&self) -> &[Message] {
        &self.state.messages
    }

    /// The move this entry records.
    pub fn to_move(&self) -> Move {
        Move {
            position: self.position,
            data: self.data.clone(),
        }
    }
}

/// Genesis snapshot, the entry before `seq = 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialStateRecord {
    /// Engine update from initialization.
    pub state: GameUpdate,
    /// Players seated at start.
    pub players: Vec<Player>,
    /// Settings at start.
    pub settings: GameSettings,
}

/// Addresses a point in history: genesis or an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistoryPoint {
    /// Before any move.
    Genesis,
    /// After the move with this sequence number.
    Seq(usize),
}

impl HistoryPoint {
    /// Converts the `-1 = genesis` index convention.
    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            -1 => Some(Self::Genesis),
            i if i >= 0 => usize::try_from(i).ok().map(Self::Seq),
            _ => None,
        }
    }

    /// Back to the `-1 = genesis` index convention.
    pub fn index(self) -> i64 {
        match self {
            Self::Genesis => -1,
            Self::Seq(seq) => seq as i64,
        }
    }
}

/// The session's history: genesis plus every accepted move, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryLog {
    initial: InitialStateRecord,
    entries: Vec<HistoryEntry>,
}

impl HistoryLog {
    /// Starts an empty log at `initial`.
    pub fn new(initial: InitialStateRecord) -> Self {
        Self {
            initial,
            entries: Vec::new(),
        }
    }

    /// Rebuilds a log from stored parts, checking sequence numbers.
    ///
    /// # Errors
    ///
    /// Returns [`HostErrorKind::PersistenceFailure`] if entries are not
    /// numbered `0..n` in order.
    #[instrument(skip(initial, entries), fields(entries = entries.len()))]
    pub fn from_parts(
        initial: InitialStateRecord,
        entries: Vec<HistoryEntry>,
    ) -> Result<Self, HostError> {
        if let Some((i, entry)) = entries.iter().enumerate().find(|(i, e)| e.seq != *i) {
            warn!(index = i, seq = entry.seq, "History sequence gap");
            return Err(HostErrorKind::PersistenceFailure(format!(
                "history entry {} has sequence number {}",
                i, entry.seq
            ))
            .into());
        }
        Ok(Self { initial, entries })
    }

    /// Genesis record.
    pub fn initial(&self) -> &InitialStateRecord {
        &self.initial
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Number of accepted moves.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no move has been accepted.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The latest point in the log.
    pub fn tail_point(&self) -> HistoryPoint {
        match self.entries.len() {
            0 => HistoryPoint::Genesis,
            n => HistoryPoint::Seq(n - 1),
        }
    }

    /// Returns true if `point` exists in the log.
    pub fn contains(&self, point: HistoryPoint) -> bool {
        match point {
            HistoryPoint::Genesis => true,
            HistoryPoint::Seq(seq) => seq < self.entries.len(),
        }
    }

    /// State at `pin` if given and in range, else the latest state.
    pub fn current(&self, pin: Option<HistoryPoint>) -> &GameUpdate {
        match pin {
            Some(HistoryPoint::Genesis) => &self.initial.state,
            Some(HistoryPoint::Seq(seq)) if seq < self.entries.len() => &self.entries[seq].state,
            _ => self.latest(),
        }
    }

    /// Latest state, or genesis when empty.
    pub fn latest(&self) -> &GameUpdate {
        self.entries
            .last()
            .map(|e| &e.state)
            .unwrap_or(&self.initial.state)
    }

    /// Returns true once the latest state is finished.
    pub fn is_finished(&self) -> bool {
        self.latest().game.is_finished()
    }

    /// Appends an accepted move. The entry gets `seq = len()`.
    ///
    /// # Errors
    ///
    /// Returns [`HostErrorKind::GameFinished`] if the latest state is terminal.
    #[instrument(skip(self, data, update), fields(seq = self.entries.len()))]
    pub fn append(
        &mut self,
        position: Position,
        data: Value,
        update: GameUpdate,
    ) -> Result<&HistoryEntry, HostError> {
        if self.is_finished() {
            warn!("Append after game finished");
            return Err(HostErrorKind::GameFinished.into());
        }
        let seq = self.entries.len();
        self.entries.push(HistoryEntry {
            seq,
            position,
            data,
            state: update,
        });
        debug!(seq, "History entry appended");
        Ok(&self.entries[seq])
    }

    /// Drops every entry after `to`. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`HostErrorKind::HistoryOutOfRange`] if `to` does not exist.
    #[instrument(skip(self), fields(len = self.entries.len()))]
    pub fn truncate(&mut self, to: HistoryPoint) -> Result<usize, HostError> {
        if !self.contains(to) {
            return Err(HostErrorKind::HistoryOutOfRange(to.index()).into());
        }
        let keep = match to {
            HistoryPoint::Genesis => 0,
            HistoryPoint::Seq(seq) => seq + 1,
        };
        let removed = self.entries.len() - keep;
        self.entries.truncate(keep);
        info!(removed, kept = keep, "History truncated");
        Ok(removed)
    }

    /// Every recorded move, oldest first.
    pub fn moves(&self) -> Vec<Move> {
        self.entries.iter().map(HistoryEntry::to_move).collect()
    }
}

/// What a replay produced.
#[derive(Debug)]
pub struct ReplayOutcome {
    /// Entries for the successfully replayed prefix.
    pub entries: Vec<HistoryEntry>,
    /// Why replay stopped early, if it did.
    pub error: Option<HostError>,
}

impl ReplayOutcome {
    /// Index of the move replay stopped at, if it halted.
    pub fn halted_at(&self) -> Option<usize> {
        self.error.as_ref().and_then(|e| match e.kind() {
            HostErrorKind::ReplayHalted { index, .. } => Some(*index),
            _ => None,
        })
    }
}

/// Re-applies `moves` in order starting from `genesis`.
///
/// Stops at the first move the engine rejects and returns the valid
/// prefix together with a [`HostErrorKind::ReplayHalted`] error. Bad moves
/// are never skipped.
#[instrument(skip(genesis, moves, engine, seed), fields(moves = moves.len()))]
pub async fn replay<E>(
    genesis: &GameUpdate,
    moves: &[Move],
    engine: &mut E,
    seed: &RandomSeed,
) -> ReplayOutcome
where
    E: GameEngine + ?Sized,
{
    let mut entries: Vec<HistoryEntry> = Vec::with_capacity(moves.len());
    for (index, mv) in moves.iter().enumerate() {
        let previous = entries.last().map(|e| &e.state).unwrap_or(genesis);
        if previous.game.is_finished() {
            warn!(index, "Moves recorded after the game finished");
            return ReplayOutcome {
                entries,
                error: Some(
                    HostErrorKind::ReplayHalted {
                        index,
                        reason: "game is already finished".to_string(),
                    }
                    .into(),
                ),
            };
        }
        match engine.apply_move(&previous.game, mv, seed).await {
            Ok(update) => entries.push(HistoryEntry {
                seq: index,
                position: mv.position,
                data: mv.data.clone(),
                state: update,
            }),
            Err(e) => {
                warn!(index, error = %e.reason(), "Replay halted");
                return ReplayOutcome {
                    entries,
                    error: Some(
                        HostErrorKind::ReplayHalted {
                            index,
                            reason: e.reason(),
                        }
                        .into(),
                    ),
                };
            }
        }
    }
    info!(replayed = entries.len(), "Replay complete");
    ReplayOutcome {
        entries,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turnstile_protocol::GameState;

    fn update(counter: i64, finished: bool) -> GameUpdate {
        let mut data = serde_json::Map::new();
        data.insert("counter".to_string(), Value::from(counter));
        let game = if finished {
            GameState::finished(vec![1], data)
        } else {
            GameState::started(vec![1], data)
        };
        GameUpdate {
            game,
            players: Vec::new(),
            messages: Vec::new(),
        }
    }

    fn log_with(n: i64) -> HistoryLog {
        let mut log = HistoryLog::new(InitialStateRecord {
            state: update(0, false),
            players: Vec::new(),
            settings: GameSettings::new(),
        });
        for i in 1..=n {
            log.append(1, Value::from(i), update(i, false)).expect("Append");
        }
        log
    }

    #[test]
    fn test_append_assigns_contiguous_seq() {
        let log = log_with(3);
        for (i, entry) in log.entries().iter().enumerate() {
            assert_eq!(entry.seq, i);
        }
    }

    #[test]
    fn test_truncate_then_current_matches_entry() {
        let mut log = log_with(4);
        let expected = log.entries()[1].state.clone();
        assert_eq!(log.truncate(HistoryPoint::Seq(1)).expect("Truncate"), 2);
        assert_eq!(log.len(), 2);
        assert_eq!(log.current(None), &expected);
    }

    #[test]
    fn test_truncate_to_genesis_empties() {
        let mut log = log_with(2);
        log.truncate(HistoryPoint::Genesis).expect("Truncate");
        assert!(log.is_empty());
        assert_eq!(log.current(None), &log.initial().state);
    }

    #[test]
    fn test_truncate_out_of_range() {
        let mut log = log_with(2);
        let err = log.truncate(HistoryPoint::Seq(2)).unwrap_err();
        assert_eq!(err.kind(), &HostErrorKind::HistoryOutOfRange(2));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_current_honors_pin() {
        let log = log_with(3);
        assert_eq!(log.current(Some(HistoryPoint::Genesis)), &log.initial().state);
        assert_eq!(log.current(Some(HistoryPoint::Seq(0))), &log.entries()[0].state);
        assert_eq!(log.current(Some(HistoryPoint::Seq(7))), log.latest());
    }

    #[test]
    fn test_append_rejected_after_finish() {
        let mut log = log_with(1);
        log.append(1, Value::Null, update(2, true)).expect("Finishing move");
        let err = log.append(1, Value::Null, update(3, false)).unwrap_err();
        assert_eq!(err.kind(), &HostErrorKind::GameFinished);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_from_parts_rejects_gaps() {
        let log = log_with(3);
        let mut entries = log.entries().to_vec();
        entries.remove(1);
        assert!(HistoryLog::from_parts(log.initial().clone(), entries).is_err());
    }

    #[test]
    fn test_history_point_index_convention() {
        assert_eq!(HistoryPoint::from_index(-1), Some(HistoryPoint::Genesis));
        assert_eq!(HistoryPoint::from_index(3), Some(HistoryPoint::Seq(3)));
        assert_eq!(HistoryPoint::from_index(-2), None);
        assert_eq!(HistoryPoint::Seq(3).index(), 3);
    }
}
