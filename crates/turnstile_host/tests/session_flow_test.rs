//! End-to-end session tests against a real engine context.

mod common;

use common::{acks, config, fixture, fixture_with, guess, seat, seed_with_target, settings};
use std::sync::Arc;
use turnstile_host::{
    EngineLauncher, OperatorNotice, ReloadCoordinator, SessionPhase, StayPut, rules_launcher,
};
use turnstile_protocol::{
    ControlEvent, GamePhase, Intent, PlayerOperation, PresentationEvent, ReloadTarget,
};

#[tokio::test]
async fn test_number_guesser_scenario() {
    let mut f = fixture();

    // (a) start
    f.start_two_player().await;
    let events = f.drain();
    assert_eq!(acks(&events, "start"), vec![&None::<String>]);
    let log = f.host.session().log().expect("Game started");
    assert_eq!(log.len(), 0);
    assert_eq!(log.latest().game.current_players, vec![1]);
    assert_eq!(f.host.session().phase(), SessionPhase::Started);

    // (b) wrong guess by player 1
    f.host.handle_intent(guess("m1", 5)).await;
    let events = f.drain();
    assert_eq!(acks(&events, "m1"), vec![&None::<String>]);
    let log = f.host.session().log().expect("Game started");
    assert_eq!(log.len(), 1);
    assert_eq!(log.latest().game.current_players, vec![2]);
    let after_b = log.entries()[0].state.clone();
    // Auto-switch follows the turn.
    assert_eq!(f.host.viewer(), "1");
    assert!(events.iter().any(|e| matches!(
        e,
        PresentationEvent::GameUpdate { position: 2, current_players, read_only: false, .. }
            if current_players == &vec![2]
    )));

    // (c) correct guess by player 2
    f.host.handle_intent(guess("m2", 7)).await;
    let events = f.drain();
    assert_eq!(acks(&events, "m2"), vec![&None::<String>]);
    assert_eq!(f.host.session().phase(), SessionPhase::Finished);
    let log = f.host.session().log().expect("Game started");
    assert_eq!(log.latest().game.phase, GamePhase::Finished);
    assert_eq!(log.latest().game.winners, vec![2]);
    assert!(events.iter().any(|e| matches!(
        e,
        PresentationEvent::GameFinished { winners, .. } if winners == &vec![2]
    )));

    f.host.handle_intent(guess("m3", 3)).await;
    let events = f.drain();
    let rejected = acks(&events, "m3");
    assert_eq!(rejected.len(), 1);
    assert!(rejected[0].is_some());
    assert_eq!(f.host.session().log().expect("Game started").len(), 2);

    // (d) revert to after (b)
    let removed = f.host.revert(0).await.expect("Revert");
    assert_eq!(removed, 1);
    let log = f.host.session().log().expect("Game started");
    assert_eq!(log.len(), 1);
    assert_eq!(f.host.session().current_update(), Some(&after_b));
    assert_eq!(f.host.session().phase(), SessionPhase::Started);
    f.drain_notices();

    // (e) engine code changes so 5 is rejected
    let launcher: Arc<dyn EngineLauncher> =
        Arc::new(rules_launcher(Arc::new(common::RejectsFive)));
    let reload = ReloadCoordinator::new(launcher);
    reload
        .handle(
            &mut f.host,
            ControlEvent::Reload {
                target: ReloadTarget::Engine,
            },
        )
        .await;

    assert!(f.host.session().log().is_none());
    assert_eq!(f.host.session().phase(), SessionPhase::New);
    assert_eq!(f.host.session().players().len(), 2);
    let notices = f.drain_notices();
    assert!(notices.iter().any(|n| matches!(
        n,
        OperatorNotice::ReplayHalted { index: 0, .. }
    )));
    assert!(notices.contains(&OperatorNotice::Reloaded(ReloadTarget::Engine)));
}

#[tokio::test]
async fn test_engine_reload_keeps_prefix_before_rejected_move() {
    let mut f = fixture();
    f.start_two_player().await;
    for (id, number) in [("m1", 3), ("m2", 5), ("m3", 6)] {
        f.host.handle_intent(guess(id, number)).await;
    }
    let first = {
        let log = f.host.session().log().expect("Game started");
        assert_eq!(log.len(), 3);
        log.entries()[0].clone()
    };
    f.drain();
    f.drain_notices();

    let launcher: Arc<dyn EngineLauncher> =
        Arc::new(rules_launcher(Arc::new(common::RejectsFive)));
    ReloadCoordinator::new(launcher)
        .handle(
            &mut f.host,
            ControlEvent::Reload {
                target: ReloadTarget::Engine,
            },
        )
        .await;

    let log = f.host.session().log().expect("Prefix survives");
    assert_eq!(log.entries(), &[first]);
    assert_eq!(log.latest().game.current_players, vec![2]);
    assert_eq!(f.host.session().phase(), SessionPhase::Started);
    let notices = f.drain_notices();
    assert!(matches!(
        notices.first(),
        Some(OperatorNotice::ReplayHalted { index: 1, .. })
    ));
    assert_eq!(
        notices.last(),
        Some(&OperatorNotice::Reloaded(ReloadTarget::Engine))
    );
}

#[tokio::test]
async fn test_stay_put_policy_keeps_viewer() {
    let mut f = fixture();
    f.host = f.host.with_policy(StayPut);
    f.start_two_player().await;

    f.host.handle_intent(guess("m1", 5)).await;
    let events = f.drain();
    assert_eq!(acks(&events, "m1"), vec![&None::<String>]);
    assert_eq!(f.host.viewer(), "0");
    let log = f.host.session().log().expect("Game started");
    assert_eq!(log.len(), 1);
    assert_eq!(log.latest().game.current_players, vec![2]);

    // Still seated at 1, so it is not this viewer's turn.
    f.host.handle_intent(guess("m2", 7)).await;
    let events = f.drain();
    assert!(acks(&events, "m2")[0].is_some());
    assert_eq!(f.host.session().log().expect("Game started").len(), 1);
}

#[tokio::test]
async fn test_move_out_of_turn_is_rejected_without_append() {
    let mut f = fixture();
    f.start_two_player().await;
    f.drain();

    // Digit2 attaches user "1", who sits at position 2.
    f.host
        .handle_intent(Intent::Key {
            code: "Digit2".to_string(),
        })
        .await;
    assert_eq!(f.host.viewer(), "1");
    f.drain();

    f.host.handle_intent(guess("early", 3)).await;
    let events = f.drain();
    assert_eq!(
        acks(&events, "early"),
        vec![&Some("not your turn (position 2)".to_string())]
    );
    assert_eq!(f.host.session().log().expect("Game started").len(), 0);
}

#[tokio::test]
async fn test_every_acked_intent_gets_exactly_one_ack() {
    let mut f = fixture();
    f.host
        .handle_intent(Intent::Start {
            id: "too-early".to_string(),
        })
        .await;
    f.host.handle_intent(guess("no-game", 1)).await;
    f.start_two_player().await;
    f.host.handle_intent(guess("ok", 2)).await;
    f.host.handle_intent(guess("second", 3)).await;
    f.host
        .handle_intent(Intent::UpdateSettings {
            id: "late-settings".to_string(),
            settings: settings(),
            seat_count: None,
        })
        .await;

    let events = f.drain();
    for id in [
        "too-early",
        "no-game",
        "settings",
        "seats",
        "start",
        "ok",
        "second",
        "late-settings",
    ] {
        assert_eq!(acks(&events, id).len(), 1, "ack count for {}", id);
    }
    assert!(acks(&events, "too-early")[0].is_some());
    assert!(acks(&events, "late-settings")[0].is_some());
}

#[tokio::test]
async fn test_ack_precedes_view() {
    let mut f = fixture();
    f.start_two_player().await;
    let events = f.drain();
    let ack = events
        .iter()
        .position(|e| matches!(e, PresentationEvent::MessageProcessed { id, .. } if id == "start"))
        .expect("Start acked");
    let view = events
        .iter()
        .position(|e| matches!(e, PresentationEvent::GameUpdate { .. }))
        .expect("View pushed");
    assert!(ack < view);
}

#[tokio::test]
async fn test_append_is_monotonic() {
    let mut f = fixture_with(config(), seed_with_target(10));
    f.start_two_player().await;
    for (i, number) in [1, 2, 3, 4].into_iter().enumerate() {
        f.host.handle_intent(guess(&format!("m{}", i), number)).await;
        let log = f.host.session().log().expect("Game started");
        assert_eq!(log.len(), i + 1);
        assert_eq!(log.entries()[i].seq, i);
    }
}

#[tokio::test]
async fn test_seating_is_host_only_and_atomic() {
    let mut f = fixture();
    f.host
        .handle_intent(Intent::UpdatePlayers {
            id: "seats".to_string(),
            operations: vec![seat(1, "0"), seat(2, "1")],
        })
        .await;
    f.drain();

    // Second op conflicts, so the first is not applied either.
    f.host
        .handle_intent(Intent::UpdatePlayers {
            id: "conflict".to_string(),
            operations: vec![seat(3, "2"), seat(1, "3")],
        })
        .await;
    let events = f.drain();
    assert_eq!(
        acks(&events, "conflict"),
        vec![&Some("seat 1 is already taken".to_string())]
    );
    assert_eq!(f.host.session().players().len(), 2);

    // A non-host may update their own seat but not seat anyone.
    f.host.switch_viewer("1").await.expect("Switch");
    f.host
        .handle_intent(Intent::UpdatePlayers {
            id: "own".to_string(),
            operations: vec![PlayerOperation::Update {
                position: 2,
                color: Some("#304ffe".to_string()),
                name: None,
                settings: None,
                ready: Some(true),
            }],
        })
        .await;
    f.host
        .handle_intent(Intent::UpdatePlayers {
            id: "other".to_string(),
            operations: vec![seat(3, "2")],
        })
        .await;
    let events = f.drain();
    assert_eq!(acks(&events, "own"), vec![&None::<String>]);
    assert_eq!(
        acks(&events, "other"),
        vec![&Some("only the host may do that".to_string())]
    );
    let player = f.host.session().player_at(2).expect("Seated");
    assert_eq!(player.color, "#304ffe");
    assert!(player.is_ready());
}

#[tokio::test]
async fn test_start_waits_for_ready() {
    let mut f = fixture_with(config().with_require_ready(true), seed_with_target(7));
    f.start_two_player().await;
    let events = f.drain();
    assert_eq!(
        acks(&events, "start"),
        vec![&Some("players not ready: [1, 2]".to_string())]
    );
    assert_eq!(f.host.session().phase(), SessionPhase::New);
}

#[tokio::test]
async fn test_auto_start_when_seats_filled() {
    let mut f = fixture_with(config().with_auto_start(true), seed_with_target(7));
    f.host
        .handle_intent(Intent::UpdateSettings {
            id: "settings".to_string(),
            settings: settings(),
            seat_count: Some(2),
        })
        .await;
    f.host
        .handle_intent(Intent::UpdatePlayers {
            id: "one".to_string(),
            operations: vec![seat(1, "0")],
        })
        .await;
    assert_eq!(f.host.session().phase(), SessionPhase::New);

    f.host
        .handle_intent(Intent::UpdatePlayers {
            id: "two".to_string(),
            operations: vec![seat(2, "1")],
        })
        .await;
    assert_eq!(f.host.session().phase(), SessionPhase::Started);
}

#[tokio::test]
async fn test_view_pin_is_read_only_until_tail() {
    let mut f = fixture();
    f.start_two_player().await;
    f.host.handle_intent(guess("m1", 5)).await;
    f.drain();

    f.host.view(-1).await.expect("View genesis");
    assert!(f.host.session().is_pinned());
    let events = f.drain();
    assert!(events.iter().any(|e| matches!(
        e,
        PresentationEvent::GameUpdate { read_only: true, current_players, .. }
            if current_players == &vec![1]
    )));

    f.host.view(0).await.expect("View tail");
    assert!(!f.host.session().is_pinned());
    assert!(f.host.view(4).await.is_err());
}

#[tokio::test]
async fn test_manual_viewer_suppresses_one_auto_switch() {
    let mut f = fixture();
    f.start_two_player().await;
    f.host
        .handle_intent(Intent::Key {
            code: "Digit1".to_string(),
        })
        .await;
    assert!(f.host.is_manual_viewer());

    f.host.handle_intent(guess("m1", 5)).await;
    assert_eq!(f.host.viewer(), "0");
    assert!(!f.host.is_manual_viewer());
}

#[tokio::test]
async fn test_reset_and_reseed_return_to_new() {
    let mut f = fixture();
    f.start_two_player().await;
    f.host.handle_intent(guess("m1", 5)).await;

    f.host.reset_game().await;
    assert_eq!(f.host.session().phase(), SessionPhase::New);
    assert!(f.host.session().players().is_empty());
    assert_eq!(f.host.viewer(), "0");

    let before = f.host.session().seed().clone();
    f.host.reseed(None).await;
    assert_ne!(f.host.session().seed(), &before);
}

#[tokio::test]
async fn test_reprocess_reproduces_history() {
    let mut f = fixture_with(config(), seed_with_target(10));
    f.start_two_player().await;
    for (i, number) in [1, 2, 3].into_iter().enumerate() {
        f.host.handle_intent(guess(&format!("m{}", i), number)).await;
    }
    let recorded = f
        .host
        .session()
        .log()
        .expect("Game started")
        .clone();

    let report = f.host.reprocess().await.expect("Reprocess");
    assert!(report.is_complete());
    assert_eq!(report.replayed, 3);
    assert_eq!(f.host.session().log(), Some(&recorded));
}

#[tokio::test]
async fn test_ready_pushes_lobby_before_start() {
    let mut f = fixture();
    f.host.handle_intent(Intent::Ready).await;
    let events = f.drain();
    assert!(matches!(events[0], PresentationEvent::SettingsUpdate { .. }));
    assert!(matches!(events[1], PresentationEvent::Users { .. }));
}

#[tokio::test]
async fn test_malformed_intent_is_dropped() {
    let mut f = fixture();
    f.host.handle_text("{\"type\":\"teleport\"}").await;
    f.host.handle_text("not json").await;
    assert!(f.drain().is_empty());
}
