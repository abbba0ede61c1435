//! Engine adapter and the engine context runner.
//!
//! The adapter hides the correlation-id dance behind three async calls.
//! The runner hosts any [`Rules`] implementation in its own task, where it
//! can only be reached through serialized messages.

use crate::channel::{Channel, ContextKind, Endpoint};
use crate::error::{HostError, HostErrorKind};
use async_trait::async_trait;
use serde_json::Value;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use turnstile_protocol::{
    EngineRequest, EngineResponse, GameState, GameUpdate, Move, Position, RandomSeed, Rules,
    RulesError, SetupState,
};

/// The per-position projection returned by the engine.
pub type PlayerView = Value;

/// Async face of the game-rules evaluator.
///
/// Calls are not retried: moves are not idempotent.
#[async_trait]
pub trait GameEngine: Send {
    /// Builds the genesis update.
    async fn initialize(
        &mut self,
        setup: &SetupState,
        seed: &RandomSeed,
    ) -> Result<GameUpdate, HostError>;

    /// Applies one move to `previous` and returns the next update.
    async fn apply_move(
        &mut self,
        previous: &GameState,
        mv: &Move,
        seed: &RandomSeed,
    ) -> Result<GameUpdate, HostError>;

    /// Projects `state` for `position`.
    async fn project_view(
        &mut self,
        state: &GameState,
        position: Position,
    ) -> Result<PlayerView, HostError>;
}

/// [`GameEngine`] backed by a channel to an engine context.
#[derive(Debug)]
pub struct EngineAdapter {
    channel: Channel<EngineRequest, EngineResponse>,
}

impl EngineAdapter {
    /// Wraps the host's end of an engine pipe.
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            channel: Channel::new(ContextKind::Engine, endpoint),
        }
    }

    /// Swaps in a freshly launched engine context. Calls pending on the old
    /// one are rejected.
    #[instrument(skip(self, endpoint))]
    pub fn replace(&mut self, endpoint: Endpoint) {
        let rejected = self.channel.teardown();
        if rejected > 0 {
            warn!(rejected, "Rejected calls pending on replaced engine");
        }
        self.channel = Channel::new(ContextKind::Engine, endpoint);
        info!("Engine context replaced");
    }

    /// Calls awaiting a response.
    pub fn pending(&self) -> usize {
        self.channel.pending()
    }
}

#[track_caller]
fn unexpected(response: &EngineResponse) -> HostError {
    HostError::new(HostErrorKind::Codec(format!(
        "unexpected engine response: {:?}",
        response
    )))
}

#[async_trait]
impl GameEngine for EngineAdapter {
    #[instrument(skip(self, setup, seed), fields(players = setup.players.len()))]
    async fn initialize(
        &mut self,
        setup: &SetupState,
        seed: &RandomSeed,
    ) -> Result<GameUpdate, HostError> {
        let response = self
            .channel
            .call(|id| EngineRequest::InitialState {
                id,
                setup: setup.clone(),
                random_seed: seed.clone(),
            })
            .await?;
        match response {
            EngineResponse::InitialStateResult {
                state: Some(update),
                ..
            } => Ok(update),
            other => Err(unexpected(&other)),
        }
    }

    #[instrument(skip(self, previous, mv, seed), fields(position = mv.position))]
    async fn apply_move(
        &mut self,
        previous: &GameState,
        mv: &Move,
        seed: &RandomSeed,
    ) -> Result<GameUpdate, HostError> {
        let response = self
            .channel
            .call(|id| EngineRequest::ProcessMove {
                id,
                previous_state: previous.clone(),
                mv: mv.clone(),
                random_seed: seed.clone(),
            })
            .await?;
        match response {
            EngineResponse::ProcessMoveResult {
                state: Some(update),
                ..
            } => Ok(update),
            other => Err(unexpected(&other)),
        }
    }

    #[instrument(skip(self, state))]
    async fn project_view(
        &mut self,
        state: &GameState,
        position: Position,
    ) -> Result<PlayerView, HostError> {
        let response = self
            .channel
            .call(|id| EngineRequest::GetPlayerState {
                id,
                state: state.clone(),
                position,
            })
            .await?;
        match response {
            EngineResponse::GetPlayerStateResult {
                state: Some(view), ..
            } => Ok(view),
            other => Err(unexpected(&other)),
        }
    }
}

/// Starts a new engine context. Called once at startup and again on every
/// engine reload.
pub trait EngineLauncher: Send + Sync {
    /// Spawns the context and returns the host's end of its pipe.
    fn launch(&self) -> Endpoint;
}

impl<F> EngineLauncher for F
where
    F: Fn() -> Endpoint + Send + Sync,
{
    fn launch(&self) -> Endpoint {
        self()
    }
}

/// Launcher that runs the same rules in a fresh context each time.
pub fn rules_launcher(rules: Arc<dyn Rules>) -> impl EngineLauncher {
    move || spawn_engine(Arc::clone(&rules))
}

/// Runs `rules` in a dedicated task that speaks only JSON text.
///
/// The task ends when the host drops its end of the pipe.
#[instrument(skip(rules))]
pub fn spawn_engine(rules: Arc<dyn Rules>) -> Endpoint {
    let (host_end, mut engine_end) = Endpoint::pair();
    tokio::spawn(async move {
        debug!("Engine context started");
        while let Some(text) = engine_end.recv().await {
            let request: EngineRequest = match serde_json::from_str(&text) {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, "Engine dropped undecodable request");
                    continue;
                }
            };
            let response = evaluate(rules.as_ref(), request);
            let text = match serde_json::to_string(&response) {
                Ok(t) => t,
                Err(e) => {
                    warn!(error = %e, "Engine failed to encode response");
                    continue;
                }
            };
            if !engine_end.send(text) {
                break;
            }
        }
        debug!("Engine context stopped");
    });
    host_end
}

/// Runs one request against the rules, turning errors and panics into an
/// error string on the response.
fn evaluate(rules: &dyn Rules, request: EngineRequest) -> EngineResponse {
    match request {
        EngineRequest::InitialState {
            id,
            setup,
            random_seed,
        } => {
            let (state, error) = split(guarded(|| rules.initial_state(&setup, &random_seed)));
            EngineResponse::InitialStateResult { id, error, state }
        }
        EngineRequest::ProcessMove {
            id,
            previous_state,
            mv,
            random_seed,
        } => {
            let (state, error) =
                split(guarded(|| rules.process_move(&previous_state, &mv, &random_seed)));
            EngineResponse::ProcessMoveResult { id, error, state }
        }
        EngineRequest::GetPlayerState {
            id,
            state,
            position,
        } => {
            let (view, error) = split(guarded(|| rules.player_state(&state, position)));
            EngineResponse::GetPlayerStateResult {
                id,
                error,
                state: view,
            }
        }
    }
}

fn guarded<T>(f: impl FnOnce() -> Result<T, RulesError>) -> Result<T, String> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "engine panicked".to_string());
            warn!(%reason, "Engine rules panicked");
            Err(reason)
        }
    }
}

fn split<T>(result: Result<T, String>) -> (Option<T>, Option<String>) {
    match result {
        Ok(value) => (Some(value), None),
        Err(e) => (None, Some(e)),
    }
}
