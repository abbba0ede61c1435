//! The session authority.
//!
//! [`Host`] owns the session, the engine adapter and the presentation
//! broadcaster. Every intent is validated here, turned into at most one
//! engine call and one history append, answered with exactly one ack, and
//! followed by a broadcast.

use crate::channel::Endpoint;
use crate::config::HostConfig;
use crate::engine::{EngineAdapter, GameEngine};
use crate::error::{HostError, HostErrorKind};
use crate::history::{self, HistoryLog, HistoryPoint, InitialStateRecord};
use crate::presentation::{AutoSwitch, Broadcaster, ViewerPolicy};
use crate::reload::OperatorNotice;
use crate::session::{Session, SessionPhase};
use crate::snapshot::{SaveState, SnapshotStore};
use derive_new::new;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use turnstile_protocol::{
    GameSettings, GameUpdate, Intent, IntentId, Move, PlayerOperation, PresentationEvent,
    RandomSeed, SetupState, UserId,
};

/// What to push after an intent has been acked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Followup {
    /// Settings and roster changed.
    Lobby,
    /// The game view changed.
    View,
}

/// Result of reprocessing.
#[derive(Debug, new)]
pub struct ReplayReport {
    /// Moves replayed successfully.
    pub replayed: usize,
    /// Moves that were on record.
    pub total: usize,
    /// Why replay stopped early, if it did.
    pub error: Option<HostError>,
}

impl ReplayReport {
    /// Returns true if every recorded move replayed.
    pub fn is_complete(&self) -> bool {
        self.error.is_none() && self.replayed == self.total
    }
}

/// Session orchestrator.
pub struct Host {
    config: HostConfig,
    session: Session,
    engine: EngineAdapter,
    broadcaster: Broadcaster,
    viewer: UserId,
    manual_viewer: bool,
    auto_switch: bool,
    policy: Box<dyn ViewerPolicy>,
    notices: Option<mpsc::UnboundedSender<OperatorNotice>>,
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("phase", &self.session.phase())
            .field("viewer", &self.viewer)
            .field("manual_viewer", &self.manual_viewer)
            .field("auto_switch", &self.auto_switch)
            .finish_non_exhaustive()
    }
}

impl Host {
    /// Creates a host in phase `new`, talking to the engine over `engine`
    /// and pushing presentation events into `presentation`.
    #[instrument(skip_all, fields(seed = %seed))]
    pub fn new(
        config: HostConfig,
        seed: RandomSeed,
        engine: Endpoint,
        presentation: mpsc::UnboundedSender<String>,
    ) -> Self {
        let session = Session::new(seed, config.initial_seat_count());
        info!(
            min_players = config.min_players(),
            max_players = config.max_players(),
            "Host created"
        );
        Self {
            viewer: config.host_user().clone(),
            auto_switch: *config.auto_switch(),
            session,
            engine: EngineAdapter::new(engine),
            broadcaster: Broadcaster::new(presentation),
            manual_viewer: false,
            policy: Box::new(AutoSwitch),
            notices: None,
            config,
        }
    }

    /// Replaces the viewer policy hook.
    pub fn with_policy(mut self, policy: impl ViewerPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    /// Delivers operator notices into `notices`.
    pub fn with_notices(mut self, notices: mpsc::UnboundedSender<OperatorNotice>) -> Self {
        self.notices = Some(notices);
        self
    }

    /// Session state.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Configuration.
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// User whose surface is attached.
    pub fn viewer(&self) -> &str {
        &self.viewer
    }

    /// Returns true while the viewer was picked by hand.
    pub fn is_manual_viewer(&self) -> bool {
        self.manual_viewer
    }

    /// Returns true if the viewer follows the turn.
    pub fn auto_switch(&self) -> bool {
        self.auto_switch
    }

    fn is_host(&self) -> bool {
        &self.viewer == self.config.host_user()
    }

    fn require_host(&self) -> Result<(), HostError> {
        if !self.is_host() {
            return Err(HostErrorKind::Unauthorized.into());
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // Intents
    // ─────────────────────────────────────────────────────────────

    /// Decodes and handles one intent from the presentation pipe.
    ///
    /// Undecodable text carries no id to ack, so it is logged and dropped.
    #[instrument(skip(self, text), fields(len = text.len()))]
    pub async fn handle_text(&mut self, text: &str) {
        match serde_json::from_str::<Intent>(text) {
            Ok(intent) => self.handle_intent(intent).await,
            Err(e) => warn!(error = %e, "Dropping malformed intent"),
        }
    }

    /// Handles one intent to completion.
    #[instrument(skip(self, intent), fields(kind = intent.kind(), viewer = %self.viewer))]
    pub async fn handle_intent(&mut self, intent: Intent) {
        match intent {
            Intent::Ready => self.push_all().await,
            Intent::Key { code } => self.on_key(&code).await,
            Intent::Move { id, data } => {
                let outcome = self.on_move(data).await;
                self.settle(id, outcome).await;
            }
            Intent::UpdateSettings {
                id,
                settings,
                seat_count,
            } => {
                let outcome = self.on_update_settings(settings, seat_count);
                self.settle(id, outcome).await;
            }
            Intent::UpdatePlayers { id, operations } => {
                let outcome = self.on_update_players(&operations);
                self.settle(id, outcome).await;
            }
            Intent::Start { id } => {
                let outcome = self.on_start().await;
                self.settle(id, outcome).await;
            }
        }
    }

    /// Sends the single ack for `id`, then the broadcast that follows it.
    async fn settle(&mut self, id: IntentId, outcome: Result<Followup, HostError>) {
        match outcome {
            Ok(followup) => {
                self.broadcaster.ack(id, None);
                match followup {
                    Followup::Lobby => {
                        self.push_lobby();
                        self.maybe_auto_start().await;
                    }
                    Followup::View => self.push_view().await,
                }
            }
            Err(e) => {
                warn!(intent = %id, reason = %e.reason(), "Intent rejected");
                self.broadcaster.ack(id, Some(&e));
            }
        }
    }

    #[instrument(skip(self, data))]
    async fn on_move(&mut self, data: Value) -> Result<Followup, HostError> {
        match self.session.phase() {
            SessionPhase::New => return Err(HostErrorKind::NoGame.into()),
            SessionPhase::Finished => return Err(HostErrorKind::GameFinished.into()),
            SessionPhase::Started => {}
        }
        let position = self
            .session
            .seat_of(&self.viewer)
            .ok_or_else(|| HostError::new(HostErrorKind::NotSeated))?;
        let previous = self
            .session
            .latest_update()
            .ok_or_else(|| HostError::new(HostErrorKind::NoGame))?;
        if !previous.game.is_turn_of(position) {
            return Err(HostErrorKind::NotYourTurn { position }.into());
        }

        let mv = Move { position, data };
        let update = self
            .engine
            .apply_move(&previous.game, &mv, self.session.seed())
            .await?;
        let finished = update.game.is_finished();
        let seq = self
            .session
            .record_move(mv.position, mv.data, update.clone())?
            .seq;
        info!(seq, position, finished, "Move accepted");

        self.after_move(&update);
        Ok(Followup::View)
    }

    /// Runs the viewer policy and clears any manual override.
    fn after_move(&mut self, update: &GameUpdate) {
        if self.auto_switch {
            let current = self.session.seat_of(&self.viewer);
            if let Some(next) = self
                .policy
                .after_move(update, current, self.manual_viewer)
                .and_then(|pos| self.session.player_at(pos))
                .and_then(|p| p.id.clone())
            {
                debug!(from = %self.viewer, to = %next, "Auto-switching viewer");
                self.viewer = next;
            }
        }
        self.manual_viewer = false;
    }

    #[instrument(skip(self))]
    async fn on_start(&mut self) -> Result<Followup, HostError> {
        self.require_host()?;
        self.session.check_startable(&self.config)?;
        self.start_game().await?;
        Ok(Followup::View)
    }

    async fn start_game(&mut self) -> Result<(), HostError> {
        let setup = self.session.setup();
        let genesis = self.engine.initialize(&setup, self.session.seed()).await?;
        self.session.begin(genesis);
        Ok(())
    }

    #[instrument(skip(self, settings))]
    fn on_update_settings(
        &mut self,
        settings: GameSettings,
        seat_count: Option<usize>,
    ) -> Result<Followup, HostError> {
        self.require_host()?;
        self.session.update_settings(settings, seat_count, &self.config)?;
        Ok(Followup::Lobby)
    }

    #[instrument(skip(self, operations), fields(ops = operations.len()))]
    fn on_update_players(&mut self, operations: &[PlayerOperation]) -> Result<Followup, HostError> {
        let is_host = self.is_host();
        self.session.apply_operations(&self.viewer, is_host, operations, &self.config)?;
        Ok(Followup::Lobby)
    }

    /// `Digit1`..`Digit9` pick roster users one to nine, `Digit0` the tenth.
    #[instrument(skip(self))]
    async fn on_key(&mut self, code: &str) {
        let index = match code.strip_prefix("Digit").and_then(|d| d.parse::<usize>().ok()) {
            Some(0) => 9,
            Some(d) if d <= 9 => d - 1,
            _ => {
                debug!("Ignoring key");
                return;
            }
        };
        let Some(user) = self.config.users().get(index).map(|u| u.id.clone()) else {
            debug!(index, "No user for key");
            return;
        };
        if let Err(e) = self.switch_viewer(&user).await {
            warn!(error = %e, "Viewer switch failed");
        }
    }

    async fn maybe_auto_start(&mut self) {
        if !*self.config.auto_start() || !self.session.can_auto_start(&self.config) {
            return;
        }
        info!("Auto-starting game");
        match self.start_game().await {
            Ok(()) => self.push_view().await,
            Err(e) => warn!(error = %e, "Auto-start failed"),
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Broadcasts
    // ─────────────────────────────────────────────────────────────

    fn push_users(&mut self) {
        let users = self.session.roster(self.config.users());
        self.broadcaster.broadcast(PresentationEvent::Users { users });
    }

    fn push_lobby(&mut self) {
        self.broadcaster.broadcast(PresentationEvent::SettingsUpdate {
            settings: self.session.settings().clone(),
            seat_count: *self.session.seat_count(),
        });
        self.push_users();
    }

    /// Pushes the full picture for the current phase.
    async fn push_all(&mut self) {
        match self.session.phase() {
            SessionPhase::New => self.push_lobby(),
            SessionPhase::Started | SessionPhase::Finished => {
                self.push_users();
                self.push_view().await;
            }
        }
    }

    /// Pushes the viewer's projection of the displayed state.
    async fn push_view(&mut self) {
        let Some(position) = self.session.seat_of(&self.viewer) else {
            debug!(viewer = %self.viewer, "Viewer not seated, no view to push");
            return;
        };
        let Some(update) = self.session.current_update().cloned() else {
            return;
        };
        let state = match update.player_state(position) {
            Some(view) => view.clone(),
            None => match self.engine.project_view(&update.game, position).await {
                Ok(view) => view,
                Err(e) => {
                    warn!(position, error = %e, "Projection failed");
                    return;
                }
            },
        };
        let event = if update.game.is_finished() {
            PresentationEvent::GameFinished {
                position,
                state,
                winners: update.game.winners.clone(),
            }
        } else {
            PresentationEvent::GameUpdate {
                position,
                state,
                current_players: update.game.current_players.clone(),
                read_only: self.session.is_pinned(),
            }
        };
        self.broadcaster.broadcast(event);
    }

    /// Re-pushes everything, as after a presentation reload.
    pub async fn refresh_presentation(&mut self) {
        self.push_all().await;
    }

    // ─────────────────────────────────────────────────────────────
    // Operator
    // ─────────────────────────────────────────────────────────────

    /// Sends `notice` to the operator, or logs it if nobody listens.
    pub fn notify(&self, notice: OperatorNotice) {
        match &self.notices {
            Some(tx) if tx.send(notice.clone()).is_ok() => {}
            _ => info!(%notice, "Operator notice"),
        }
    }

    /// Attaches `user`'s surface and marks the choice as a manual override.
    ///
    /// # Errors
    ///
    /// Returns [`HostErrorKind::UnknownUser`] if `user` is not on the roster.
    #[instrument(skip(self))]
    pub async fn switch_viewer(&mut self, user: &str) -> Result<(), HostError> {
        if self.config.user(user).is_none() {
            return Err(HostErrorKind::UnknownUser(user.to_string()).into());
        }
        self.viewer = user.to_string();
        self.manual_viewer = true;
        info!("Viewer switched");
        self.push_all().await;
        Ok(())
    }

    /// Turns auto-switch on or off.
    pub fn set_auto_switch(&mut self, enabled: bool) {
        self.auto_switch = enabled;
        info!(enabled, "Auto-switch toggled");
    }

    /// Pins the display to history index `index` (`-1` for genesis).
    ///
    /// # Errors
    ///
    /// Fails if there is no game or the index is out of range.
    #[instrument(skip(self))]
    pub async fn view(&mut self, index: i64) -> Result<(), HostError> {
        let point = HistoryPoint::from_index(index)
            .ok_or_else(|| HostError::new(HostErrorKind::HistoryOutOfRange(index)))?;
        self.session.view(point)?;
        self.push_view().await;
        Ok(())
    }

    /// Truncates history after index `index` (`-1` for genesis) without
    /// consulting the engine. Returns how many entries were dropped.
    ///
    /// # Errors
    ///
    /// Fails if there is no game or the index is out of range.
    #[instrument(skip(self))]
    pub async fn revert(&mut self, index: i64) -> Result<usize, HostError> {
        let point = HistoryPoint::from_index(index)
            .ok_or_else(|| HostError::new(HostErrorKind::HistoryOutOfRange(index)))?;
        let removed = self.session.revert(point)?;
        info!(removed, "History reverted");
        self.push_view().await;
        Ok(removed)
    }

    /// Returns to phase `new` with empty seats and settings. The seed is
    /// kept.
    #[instrument(skip(self))]
    pub async fn reset_game(&mut self) {
        self.session.reset(self.config.initial_seat_count());
        self.viewer = self.config.host_user().clone();
        self.manual_viewer = false;
        self.push_all().await;
    }

    /// Replaces the seed (generating one if not given) and resets.
    #[instrument(skip(self))]
    pub async fn reseed(&mut self, seed: Option<RandomSeed>) {
        self.session.reseed(seed.unwrap_or_else(RandomSeed::generate));
        self.reset_game().await;
    }

    /// Swaps in a freshly launched engine context.
    pub fn replace_engine(&mut self, endpoint: Endpoint) {
        self.engine.replace(endpoint);
    }

    /// Rebuilds history from genesis against the current engine.
    ///
    /// Broadcasts are suspended for the duration. If a move no longer
    /// replays, the valid prefix is kept and the halt is reported to the
    /// operator. If not even the first move survives, the session falls
    /// back to phase `new` with its seats and settings intact.
    ///
    /// # Errors
    ///
    /// Fails only if genesis itself cannot be rebuilt, in which case the
    /// session falls back to phase `new`.
    #[instrument(skip(self))]
    pub async fn reprocess(&mut self) -> Result<ReplayReport, HostError> {
        let Some(log) = self.session.log() else {
            debug!("Nothing to reprocess");
            self.push_all().await;
            return Ok(ReplayReport::new(0, 0, None));
        };
        let setup = SetupState {
            players: log.initial().players.clone(),
            settings: log.initial().settings.clone(),
        };
        let moves = log.moves();
        self.reprocess_from(setup, moves).await
    }

    async fn reprocess_from(
        &mut self,
        setup: SetupState,
        moves: Vec<Move>,
    ) -> Result<ReplayReport, HostError> {
        self.broadcaster.suspend();
        let result = self.rebuild(setup, &moves).await;
        self.broadcaster.resume();

        match &result {
            Ok(report) => {
                if let Some(HostErrorKind::ReplayHalted { index, reason }) =
                    report.error.as_ref().map(HostError::kind)
                {
                    self.notify(OperatorNotice::ReplayHalted {
                        index: *index,
                        reason: reason.clone(),
                    });
                    // Nothing survived: seats and settings stay, the game does not.
                    if report.replayed == 0 {
                        self.session.abandon();
                    }
                }
                info!(
                    replayed = report.replayed,
                    total = report.total,
                    "History reprocessed"
                );
            }
            Err(e) => {
                self.session.abandon();
                self.notify(OperatorNotice::ReprocessFailed(e.reason()));
            }
        }
        self.push_all().await;
        result
    }

    async fn rebuild(
        &mut self,
        setup: SetupState,
        moves: &[Move],
    ) -> Result<ReplayReport, HostError> {
        let genesis = self.engine.initialize(&setup, self.session.seed()).await?;
        let outcome =
            history::replay(&genesis, moves, &mut self.engine, self.session.seed()).await;
        let replayed = outcome.entries.len();
        let record = InitialStateRecord {
            state: genesis,
            players: setup.players,
            settings: setup.settings,
        };
        self.session.replace_log(HistoryLog::from_parts(record, outcome.entries)?);
        Ok(ReplayReport::new(replayed, moves.len(), outcome.error))
    }

    /// Builds the snapshot of the running game.
    ///
    /// # Errors
    ///
    /// Returns [`HostErrorKind::NoGame`] before start.
    pub fn snapshot(&self) -> Result<SaveState, HostError> {
        let log = self
            .session
            .log()
            .ok_or_else(|| HostError::new(HostErrorKind::NoGame))?;
        Ok(SaveState {
            random_seed: self.session.seed().clone(),
            settings: log.initial().settings.clone(),
            players: log.initial().players.clone(),
            history: log.entries().to_vec(),
            initial_state: log.initial().clone(),
        })
    }

    /// Saves the running game under `name`.
    ///
    /// # Errors
    ///
    /// Fails before start or if the store fails.
    #[instrument(skip(self, store))]
    pub async fn save(&self, store: &dyn SnapshotStore, name: &str) -> Result<(), HostError> {
        let state = self.snapshot()?;
        store.save(name, &state).await?;
        info!(moves = state.history.len(), "Game saved");
        Ok(())
    }

    /// Loads the save named `name` and reprocesses it.
    ///
    /// Stored states are never trusted: seed, settings and players are
    /// restored and every move is replayed against the current engine.
    ///
    /// # Errors
    ///
    /// Fails if the store fails or genesis cannot be rebuilt.
    #[instrument(skip(self, store))]
    pub async fn load(
        &mut self,
        store: &dyn SnapshotStore,
        name: &str,
    ) -> Result<ReplayReport, HostError> {
        let state = store.load(name).await?;
        let moves: Vec<Move> = state.history.iter().map(|e| e.to_move()).collect();
        self.session.restore(state.random_seed, state.settings.clone(), state.players.clone());
        self.manual_viewer = false;
        info!(moves = moves.len(), "Reprocessing loaded game");
        self.reprocess_from(
            SetupState {
                players: state.players,
                settings: state.settings,
            },
            moves,
        )
        .await
    }
}
