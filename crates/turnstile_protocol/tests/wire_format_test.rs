//! Tests for the JSON shapes exchanged between contexts.

use serde_json::json;
use turnstile_protocol::{
    ControlEvent, Correlated, EngineRequest, EngineResponse, GamePhase, GameState, Intent,
    PlayerOperation, PresentationEvent, RandomSeed, ReloadTarget,
};

#[test]
fn test_game_state_keeps_engine_fields() {
    let raw = json!({
        "phase": "started",
        "currentPlayers": [1],
        "number": 7,
        "move": 0
    });
    let state: GameState = serde_json::from_value(raw).expect("Parse state");
    assert_eq!(state.phase, GamePhase::Started);
    assert_eq!(state.current_players, vec![1]);
    assert!(state.winners.is_empty());
    assert_eq!(state.data.get("number"), Some(&json!(7)));
    assert!(!state.data.contains_key("phase"));

    let back = serde_json::to_value(&state).expect("Serialize state");
    assert_eq!(back["number"], json!(7));
    assert_eq!(back["phase"], json!("started"));
}

#[test]
fn test_turn_check_requires_started_phase() {
    let started = GameState::started(vec![2], Default::default());
    assert!(started.is_turn_of(2));
    assert!(!started.is_turn_of(1));

    let finished = GameState::finished(vec![2], Default::default());
    assert!(!finished.is_turn_of(2));
    assert!(finished.is_finished());
}

#[test]
fn test_process_move_request_shape() {
    let request = EngineRequest::ProcessMove {
        id: 3,
        previous_state: GameState::started(vec![1], Default::default()),
        mv: turnstile_protocol::Move {
            position: 1,
            data: json!({"number": 5}),
        },
        random_seed: RandomSeed::from("abc"),
    };
    let value = serde_json::to_value(&request).expect("Serialize");
    assert_eq!(value["type"], json!("processMove"));
    assert_eq!(value["id"], json!(3));
    assert_eq!(value["move"]["data"]["number"], json!(5));
    assert_eq!(value["randomSeed"], json!("abc"));
    assert_eq!(value["previousState"]["currentPlayers"], json!([1]));
}

#[test]
fn test_response_error_is_a_failure() {
    let raw = json!({"type": "processMoveResult", "id": 9, "error": "not your turn"});
    let response: EngineResponse = serde_json::from_value(raw).expect("Parse response");
    assert_eq!(response.correlation_id(), 9);
    assert_eq!(response.failure(), Some("not your turn"));
}

#[test]
fn test_intents_parse() {
    let ready: Intent = serde_json::from_value(json!({"type": "ready"})).expect("Parse ready");
    assert_eq!(ready, Intent::Ready);
    assert!(ready.ack_id().is_none());

    let settings: Intent = serde_json::from_value(json!({
        "type": "updateSettings",
        "id": "4",
        "settings": {"evenOnly": true},
        "seatCount": 2
    }))
    .expect("Parse settings");
    assert_eq!(settings.ack_id().map(String::as_str), Some("4"));

    let players: Intent = serde_json::from_value(json!({
        "type": "updatePlayers",
        "id": "5",
        "operations": [
            {"type": "seat", "position": 1, "userId": "0", "color": "#fff", "name": "A"},
            {"type": "update", "position": 1, "ready": true},
            {"type": "unseat", "position": 2}
        ]
    }))
    .expect("Parse players");
    match players {
        Intent::UpdatePlayers { operations, .. } => {
            assert_eq!(operations.len(), 3);
            assert!(matches!(
                operations[1],
                PlayerOperation::Update {
                    ready: Some(true),
                    name: None,
                    ..
                }
            ));
        }
        other => panic!("Unexpected intent: {:?}", other),
    }
}

#[test]
fn test_ack_omits_error_on_success() {
    let ack = PresentationEvent::MessageProcessed {
        id: "1".to_string(),
        error: None,
    };
    let value = serde_json::to_value(&ack).expect("Serialize");
    assert_eq!(value, json!({"type": "messageProcessed", "id": "1"}));
}

#[test]
fn test_control_events_accept_legacy_targets() {
    let game: ControlEvent =
        serde_json::from_value(json!({"type": "reload", "target": "game"})).expect("Parse");
    assert_eq!(
        game,
        ControlEvent::Reload {
            target: ReloadTarget::Engine
        }
    );
    let ui: ControlEvent =
        serde_json::from_value(json!({"type": "reload", "target": "ui"})).expect("Parse");
    assert_eq!(
        ui,
        ControlEvent::Reload {
            target: ReloadTarget::Presentation
        }
    );
    let err: ControlEvent =
        serde_json::from_value(json!({"type": "buildError", "out": "", "err": "boom"}))
            .expect("Parse");
    assert!(matches!(err, ControlEvent::BuildError { .. }));
}
