//! Session state: phase, seating, settings and the history log.
//!
//! Nothing here talks to another context. The [`Host`](crate::Host) drives
//! the engine and feeds results in.

use crate::config::HostConfig;
use crate::error::{HostError, HostErrorKind};
use crate::history::{HistoryEntry, HistoryLog, HistoryPoint, InitialStateRecord};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use turnstile_protocol::{
    GameSettings, GameUpdate, Player, PlayerDetails, PlayerOperation, Position, RandomSeed,
    SetupState, User, UserSummary,
};

/// Lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionPhase {
    /// Seating and settings are open.
    New,
    /// Moves are being accepted.
    Started,
    /// Terminal until reset.
    Finished,
}

/// One running game.
///
/// The phase is derived from the log: no log is `new`, a log whose latest
/// state is finished is `finished`, anything else is `started`.
#[derive(Debug, Clone, Getters)]
pub struct Session {
    /// Settings chosen before start.
    settings: GameSettings,
    /// Seat count requested by the host.
    seat_count: usize,
    /// Seated and reserved players, ordered by position.
    players: Vec<Player>,
    /// Seed threaded through every engine call.
    seed: RandomSeed,
    #[getter(skip)]
    log: Option<HistoryLog>,
    #[getter(skip)]
    pin: Option<HistoryPoint>,
}

impl Session {
    /// Creates an empty session in phase `new`.
    pub fn new(seed: RandomSeed, seat_count: usize) -> Self {
        Self {
            settings: GameSettings::new(),
            seat_count,
            players: Vec::new(),
            seed,
            log: None,
            pin: None,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        match &self.log {
            None => SessionPhase::New,
            Some(log) if log.is_finished() => SessionPhase::Finished,
            Some(_) => SessionPhase::Started,
        }
    }

    /// History, once started.
    pub fn log(&self) -> Option<&HistoryLog> {
        self.log.as_ref()
    }

    /// Pinned history point, if the display is time-travelling.
    pub fn pin(&self) -> Option<HistoryPoint> {
        self.pin
    }

    /// Returns true while an earlier point in history is displayed.
    pub fn is_pinned(&self) -> bool {
        self.pin.is_some()
    }

    /// State to display, honoring the pin.
    pub fn current_update(&self) -> Option<&GameUpdate> {
        self.log.as_ref().map(|log| log.current(self.pin))
    }

    /// Latest state, ignoring the pin.
    pub fn latest_update(&self) -> Option<&GameUpdate> {
        self.log.as_ref().map(HistoryLog::latest)
    }

    /// Inputs for engine initialization.
    pub fn setup(&self) -> SetupState {
        SetupState {
            players: self.players.clone(),
            settings: self.settings.clone(),
        }
    }

    /// Seat held by `user`, if any.
    pub fn seat_of(&self, user: &str) -> Option<Position> {
        self.players
            .iter()
            .find(|p| p.is_user(user))
            .map(|p| p.position)
    }

    /// Player in `position`, if any.
    pub fn player_at(&self, position: Position) -> Option<&Player> {
        self.players.iter().find(|p| p.position == position)
    }

    fn require_phase(&self, expected: SessionPhase) -> Result<(), HostError> {
        let actual = self.phase();
        if actual != expected {
            return Err(HostErrorKind::InvalidPhase { expected, actual }.into());
        }
        Ok(())
    }

    /// Replaces settings and, if given, the requested seat count.
    ///
    /// # Errors
    ///
    /// Fails outside phase `new`, or if `seat_count` exceeds the configured
    /// bounds.
    #[instrument(skip(self, settings, config))]
    pub fn update_settings(
        &mut self,
        settings: GameSettings,
        seat_count: Option<usize>,
        config: &HostConfig,
    ) -> Result<(), HostError> {
        self.require_phase(SessionPhase::New)?;
        if let Some(count) = seat_count {
            let (min, max) = (*config.min_players(), *config.max_players());
            if count < min || count > max {
                return Err(HostErrorKind::SeatLimit { count, min, max }.into());
            }
            self.seat_count = count;
        }
        self.settings = settings;
        debug!(seat_count = self.seat_count, "Settings updated");
        Ok(())
    }

    /// Applies a batch of seat operations, all or nothing.
    ///
    /// `actor` is the user the operations are attributed to. Only the host
    /// may seat, unseat or reserve; `update` is also open to the seat's own
    /// user.
    ///
    /// # Errors
    ///
    /// Fails outside phase `new`, on the first unauthorized, conflicting or
    /// dangling operation, or if seating would exceed `max_players`. Players
    /// are unchanged on failure.
    #[instrument(skip(self, operations, config), fields(ops = operations.len()))]
    pub fn apply_operations(
        &mut self,
        actor: &str,
        is_host: bool,
        operations: &[PlayerOperation],
        config: &HostConfig,
    ) -> Result<(), HostError> {
        self.require_phase(SessionPhase::New)?;
        let mut players = self.players.clone();

        for op in operations {
            match op {
                PlayerOperation::Seat {
                    position,
                    user_id,
                    color,
                    name,
                    settings,
                } => {
                    if !is_host {
                        return Err(HostErrorKind::Unauthorized.into());
                    }
                    if players.iter().any(|p| p.position == *position) {
                        return Err(HostErrorKind::SeatConflict(*position).into());
                    }
                    // A user holds at most one seat.
                    players.retain(|p| !p.is_user(user_id));
                    check_capacity(players.len() + 1, config)?;
                    players.push(Player {
                        id: Some(user_id.clone()),
                        position: *position,
                        name: name.clone(),
                        color: color.clone(),
                        settings: settings.clone(),
                        ready: Some(false),
                    });
                }
                PlayerOperation::Unseat { position } => {
                    if !is_host {
                        return Err(HostErrorKind::Unauthorized.into());
                    }
                    let before = players.len();
                    players.retain(|p| p.position != *position);
                    if players.len() == before {
                        return Err(HostErrorKind::UnknownSeat(*position).into());
                    }
                }
                PlayerOperation::Update {
                    position,
                    color,
                    name,
                    settings,
                    ready,
                } => {
                    let player = players
                        .iter_mut()
                        .find(|p| p.position == *position)
                        .ok_or_else(|| HostError::new(HostErrorKind::UnknownSeat(*position)))?;
                    if !is_host && !player.is_user(actor) {
                        return Err(HostErrorKind::Unauthorized.into());
                    }
                    if let Some(color) = color {
                        player.color = color.clone();
                    }
                    if let Some(name) = name {
                        player.name = name.clone();
                    }
                    if let Some(settings) = settings {
                        player.settings = Some(settings.clone());
                    }
                    if let Some(ready) = ready {
                        player.ready = Some(*ready);
                    }
                }
                PlayerOperation::Reserve {
                    position,
                    color,
                    name,
                    settings,
                } => {
                    if !is_host {
                        return Err(HostErrorKind::Unauthorized.into());
                    }
                    if players.iter().any(|p| p.position == *position) {
                        return Err(HostErrorKind::SeatConflict(*position).into());
                    }
                    check_capacity(players.len() + 1, config)?;
                    players.push(Player {
                        id: None,
                        position: *position,
                        name: name.clone(),
                        color: color.clone(),
                        settings: settings.clone(),
                        ready: Some(true),
                    });
                }
            }
        }

        players.sort_by_key(|p| p.position);
        self.players = players;
        debug!(seated = self.players.len(), "Players updated");
        Ok(())
    }

    /// Checks the start guard: phase `new`, seat count within bounds and,
    /// when gated, everyone ready.
    ///
    /// # Errors
    ///
    /// Returns the first guard that fails.
    #[instrument(skip(self, config))]
    pub fn check_startable(&self, config: &HostConfig) -> Result<(), HostError> {
        self.require_phase(SessionPhase::New)?;
        let (min, max) = (*config.min_players(), *config.max_players());
        let count = self.players.len();
        if count < min || count > max {
            return Err(HostErrorKind::SeatLimit { count, min, max }.into());
        }
        if *config.require_ready() {
            let waiting: Vec<Position> = self
                .players
                .iter()
                .filter(|p| !p.is_ready())
                .map(|p| p.position)
                .collect();
            if !waiting.is_empty() {
                return Err(HostErrorKind::NotReady(waiting).into());
            }
        }
        Ok(())
    }

    /// Returns true if auto-start should fire: startable, and every
    /// requested seat is filled.
    pub fn can_auto_start(&self, config: &HostConfig) -> bool {
        self.players.len() == self.seat_count && self.check_startable(config).is_ok()
    }

    /// Enters phase `started` with a fresh genesis and empty history.
    #[instrument(skip(self, initial))]
    pub fn begin(&mut self, initial: GameUpdate) {
        let record = InitialStateRecord {
            state: initial,
            players: self.players.clone(),
            settings: self.settings.clone(),
        };
        self.log = Some(HistoryLog::new(record));
        self.pin = None;
        info!(phase = %self.phase(), "Game started");
    }

    /// Records an accepted move and clears the pin.
    ///
    /// # Errors
    ///
    /// Returns [`HostErrorKind::NoGame`] before start, or
    /// [`HostErrorKind::GameFinished`] after the end.
    #[instrument(skip(self, data, update))]
    pub fn record_move(
        &mut self,
        position: Position,
        data: Value,
        update: GameUpdate,
    ) -> Result<&HistoryEntry, HostError> {
        let log = self
            .log
            .as_mut()
            .ok_or_else(|| HostError::new(HostErrorKind::NoGame))?;
        self.pin = None;
        log.append(position, data, update)
    }

    /// Pins the display to `point`. Pinning the tail clears the pin.
    ///
    /// # Errors
    ///
    /// Fails if there is no game or `point` is out of range.
    #[instrument(skip(self))]
    pub fn view(&mut self, point: HistoryPoint) -> Result<(), HostError> {
        let log = self
            .log
            .as_ref()
            .ok_or_else(|| HostError::new(HostErrorKind::NoGame))?;
        if !log.contains(point) {
            return Err(HostErrorKind::HistoryOutOfRange(point.index()).into());
        }
        self.pin = if point == log.tail_point() {
            None
        } else {
            Some(point)
        };
        debug!(pinned = self.pin.is_some(), "View updated");
        Ok(())
    }

    /// Truncates history after `point` and clears the pin. Returns how
    /// many entries were dropped.
    ///
    /// # Errors
    ///
    /// Fails if there is no game or `point` is out of range.
    #[instrument(skip(self))]
    pub fn revert(&mut self, point: HistoryPoint) -> Result<usize, HostError> {
        let log = self
            .log
            .as_mut()
            .ok_or_else(|| HostError::new(HostErrorKind::NoGame))?;
        let removed = log.truncate(point)?;
        self.pin = None;
        Ok(removed)
    }

    /// Replaces the whole log, as reprocessing does.
    pub fn replace_log(&mut self, log: HistoryLog) {
        self.log = Some(log);
        self.pin = None;
    }

    /// Drops the log and returns to phase `new`, keeping seats and settings.
    pub fn abandon(&mut self) {
        if self.log.take().is_some() {
            warn!("Game abandoned, back to new");
        }
        self.pin = None;
    }

    /// Clears everything but the seed.
    #[instrument(skip(self))]
    pub fn reset(&mut self, seat_count: usize) {
        self.settings = GameSettings::new();
        self.seat_count = seat_count;
        self.players.clear();
        self.log = None;
        self.pin = None;
        info!("Session reset");
    }

    /// Replaces the seed. Callers reset afterwards.
    pub fn reseed(&mut self, seed: RandomSeed) {
        info!(seed = %seed, "Session reseeded");
        self.seed = seed;
    }

    /// Restores seed, settings and players from a snapshot, leaving the
    /// log empty until it is reprocessed.
    #[instrument(skip_all, fields(players = players.len()))]
    pub fn restore(&mut self, seed: RandomSeed, settings: GameSettings, players: Vec<Player>) {
        self.seed = seed;
        self.settings = settings;
        self.seat_count = players.len().max(1);
        self.players = players;
        self.log = None;
        self.pin = None;
    }

    /// Roster as pushed to the presentation: every known user, with seat
    /// details when seated, followed by reserved seats.
    pub fn roster(&self, users: &[User]) -> Vec<UserSummary> {
        let details = |p: &Player| PlayerDetails {
            position: p.position,
            color: p.color.clone(),
            settings: p.settings.clone(),
            ready: p.is_ready(),
        };
        let mut roster: Vec<UserSummary> = users
            .iter()
            .map(|u| UserSummary {
                id: Some(u.id.clone()),
                name: u.name.clone(),
                player_details: self
                    .players
                    .iter()
                    .find(|p| p.is_user(&u.id))
                    .map(details),
            })
            .collect();
        roster.extend(
            self.players
                .iter()
                .filter(|p| p.id.is_none())
                .map(|p| UserSummary {
                    id: None,
                    name: p.name.clone(),
                    player_details: Some(details(p)),
                }),
        );
        roster
    }
}

fn check_capacity(count: usize, config: &HostConfig) -> Result<(), HostError> {
    let max = *config.max_players();
    if count > max {
        return Err(HostErrorKind::SeatLimit {
            count,
            min: *config.min_players(),
            max,
        }
        .into());
    }
    Ok(())
}
