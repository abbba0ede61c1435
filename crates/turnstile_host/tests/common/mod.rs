//! Shared fixtures for host integration tests.

#![allow(dead_code)]

use serde_json::{Map, Value, json};
use std::sync::Arc;
use tokio::sync::mpsc;
use turnstile_guesser::{GuesserSettings, NumberGuesser};
use turnstile_host::{Host, HostConfig, OperatorNotice, spawn_engine};
use turnstile_protocol::{
    GameState, GameUpdate, Intent, Move, PlayerOperation, PresentationEvent, RandomSeed, Rules,
    RulesError, SetupState,
};

/// A host plus the receiving ends of everything it emits.
pub struct Fixture {
    pub host: Host,
    pub events: mpsc::UnboundedReceiver<String>,
    pub notices: mpsc::UnboundedReceiver<OperatorNotice>,
}

impl Fixture {
    /// Everything pushed to the presentation since the last drain.
    pub fn drain(&mut self) -> Vec<PresentationEvent> {
        let mut out = Vec::new();
        while let Ok(text) = self.events.try_recv() {
            out.push(serde_json::from_str(&text).expect("Host emitted a valid event"));
        }
        out
    }

    /// Operator notices since the last drain.
    pub fn drain_notices(&mut self) -> Vec<OperatorNotice> {
        let mut out = Vec::new();
        while let Ok(notice) = self.notices.try_recv() {
            out.push(notice);
        }
        out
    }

    /// Seats the host user at 1 and user "1" at 2, sets `{evenOnly: false}`
    /// and starts.
    pub async fn start_two_player(&mut self) {
        self.host
            .handle_intent(Intent::UpdateSettings {
                id: "settings".to_string(),
                settings: settings(),
                seat_count: Some(2),
            })
            .await;
        self.host
            .handle_intent(Intent::UpdatePlayers {
                id: "seats".to_string(),
                operations: vec![seat(1, "0"), seat(2, "1")],
            })
            .await;
        self.host
            .handle_intent(Intent::Start {
                id: "start".to_string(),
            })
            .await;
    }
}

/// Config for two-player tests: readiness not required.
pub fn config() -> HostConfig {
    HostConfig::with_players(1, 4).with_require_ready(false)
}

/// `{evenOnly: false}`.
pub fn settings() -> Map<String, Value> {
    let mut settings = Map::new();
    settings.insert("evenOnly".to_string(), Value::Bool(false));
    settings
}

/// Finds a seed whose hidden number is `target` under default settings.
pub fn seed_with_target(target: u32) -> RandomSeed {
    let settings = GuesserSettings::default();
    (0..10_000)
        .map(|i| RandomSeed::from(format!("seed-{}", i)))
        .find(|seed| NumberGuesser::target_for(seed, &settings) == Some(target))
        .expect("no seed produced the target")
}

/// Host over a real engine context running the number guesser.
pub fn fixture_with(config: HostConfig, seed: RandomSeed) -> Fixture {
    let (presentation, events) = mpsc::unbounded_channel();
    let (notice_tx, notices) = mpsc::unbounded_channel();
    let engine = spawn_engine(Arc::new(NumberGuesser::new()));
    let host = Host::new(config, seed, engine, presentation).with_notices(notice_tx);
    Fixture {
        host,
        events,
        notices,
    }
}

/// Two-player fixture whose hidden number is 7.
pub fn fixture() -> Fixture {
    fixture_with(config(), seed_with_target(7))
}

pub fn seat(position: u32, user: &str) -> PlayerOperation {
    PlayerOperation::Seat {
        position,
        user_id: user.to_string(),
        color: "#d50000".to_string(),
        name: format!("User {}", user),
        settings: None,
    }
}

pub fn guess(id: &str, number: u32) -> Intent {
    Intent::Move {
        id: id.to_string(),
        data: json!({ "number": number }),
    }
}

/// Acks for `id` among `events`.
pub fn acks<'a>(events: &'a [PresentationEvent], id: &str) -> Vec<&'a Option<String>> {
    events
        .iter()
        .filter_map(|e| match e {
            PresentationEvent::MessageProcessed { id: ack, error } if ack == id => Some(error),
            _ => None,
        })
        .collect()
}

/// Number guesser whose newer code no longer accepts a guess of 5.
#[derive(Debug, Default)]
pub struct RejectsFive;

impl Rules for RejectsFive {
    fn initial_state(
        &self,
        setup: &SetupState,
        seed: &RandomSeed,
    ) -> Result<GameUpdate, RulesError> {
        NumberGuesser::new().initial_state(setup, seed)
    }

    fn process_move(
        &self,
        previous: &GameState,
        mv: &Move,
        seed: &RandomSeed,
    ) -> Result<GameUpdate, RulesError> {
        if mv.data.get("number").and_then(Value::as_u64) == Some(5) {
            return Err(RulesError::new("5 is no longer allowed"));
        }
        NumberGuesser::new().process_move(previous, mv, seed)
    }

    fn player_state(
        &self,
        state: &GameState,
        position: u32,
    ) -> Result<Value, RulesError> {
        NumberGuesser::new().player_state(state, position)
    }
}
