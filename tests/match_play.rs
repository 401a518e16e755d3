//! End-to-end matches against real subprocess players.

mod common;

use std::time::Duration;

use common::PlayerScripts;
use game_referee::configuration::Configuration;
use game_referee::error::{MatchError, RefereeError};
use game_referee::games::{PrisonersDilemma, TicTacToe};
use game_referee::limits::{Limits, LimitsBuilder};
use game_referee::manager::GameFactory;
use game_referee::match_runner::{run_match, MatchSettings};
use game_referee::message::Message;
use game_referee::player::PlayerId;
use game_referee::transport::{ProcessTransport, Transport};
use serde_json::json;

fn quiet() -> Configuration {
    Configuration::new().with_verbose(false)
}

fn fast_limits() -> Limits {
    LimitsBuilder::new()
        .with_move_timeout(Duration::from_secs(5))
        .with_ready_timeout(Duration::from_secs(5))
        .with_stop_grace(Duration::from_millis(200))
        .build()
        .unwrap()
}

fn settings(players: [(&str, std::path::PathBuf); 2]) -> MatchSettings {
    MatchSettings {
        players: players
            .into_iter()
            .map(|(name, path)| (PlayerId::from(name), path))
            .collect(),
    }
}

#[test]
fn echo_player_round_trips_messages() {
    let scripts = PlayerScripts::new();
    let path = scripts.echo_player("echo.sh");

    let mut transport = ProcessTransport::new(PlayerId::from("echo"), &fast_limits());
    transport.start(&path).unwrap();

    let ready = transport.receive(Duration::from_secs(5)).unwrap();
    assert!(ready.is_ready());

    let sent = Message::of_type("your_turn")
        .with("round", 7)
        .with("board", json!([0, 1, 2]))
        .with("nested", json!({"deep": {"value": true}}));
    transport.send(&sent).unwrap();
    let received = transport.receive(Duration::from_secs(5)).unwrap();
    assert_eq!(sent, received);

    transport.stop();
}

#[test]
fn stop_is_idempotent() {
    let scripts = PlayerScripts::new();
    let path = scripts.echo_player("echo.sh");

    let mut transport = ProcessTransport::new(PlayerId::from("echo"), &fast_limits());
    transport.start(&path).unwrap();
    transport.stop();
    transport.stop();

    // a stopped transport reports the stream as closed rather than hanging
    let err = transport.receive(Duration::from_millis(50)).unwrap_err();
    assert!(matches!(err, RefereeError::Disconnected));
}

#[test]
fn sleeping_player_times_out_without_deadlocking() {
    let scripts = PlayerScripts::new();
    let snail = scripts.sleeper("snail.sh", 10);
    let coop = scripts.constant_mover("coop.sh", "C");

    let limits = LimitsBuilder::new()
        .with_move_timeout(Duration::from_millis(300))
        .with_ready_timeout(Duration::from_secs(5))
        .with_stop_grace(Duration::from_millis(100))
        .build()
        .unwrap();

    let error = run_match(
        PrisonersDilemma::new(3).new_manager(),
        &settings([("snail", snail), ("coop", coop)]),
        &limits,
        &quiet(),
    )
    .unwrap_err();

    let MatchError::Faults(faults) = error else {
        panic!("expected player faults");
    };
    assert_eq!(faults.len(), 1);
    assert_eq!(faults[0].player, PlayerId::from("snail"));
    assert!(matches!(faults[0].fault, RefereeError::Timeout(_)));
}

#[test]
fn scripted_tictactoe_ends_with_a_deterministic_winner() {
    let scripts = PlayerScripts::new();
    // combined sequence 4 0 1 3 2 5 6 7 8, alternating between the players
    let crosses = scripts.scripted_mover("crosses.sh", &[4, 1, 2, 6, 8]);
    let noughts = scripts.scripted_mover("noughts.sh", &[0, 3, 5, 7]);

    let report = run_match(
        TicTacToe.new_manager(),
        &settings([("crosses", crosses), ("noughts", noughts)]),
        &fast_limits(),
        &quiet(),
    )
    .unwrap();

    // X completes the 2-4-6 diagonal on the seventh move of the game
    assert_eq!(report.outcome.winner, Some(PlayerId::from("crosses")));
    assert_eq!(report.outcome.scores[&PlayerId::from("crosses")], 1.0);
    assert_eq!(report.outcome.scores[&PlayerId::from("noughts")], 0.0);
    assert_eq!(report.outcome.history.len(), 7);
    assert_eq!(report.timing[&PlayerId::from("crosses")].moves, 4);
    assert_eq!(report.timing[&PlayerId::from("noughts")].moves, 3);
}

#[test]
fn hundred_rounds_of_cooperate_versus_defect() {
    let scripts = PlayerScripts::new();
    let coop = scripts.constant_mover("coop.sh", "C");
    let defector = scripts.constant_mover("defector.sh", "D");

    let report = run_match(
        PrisonersDilemma::default().new_manager(),
        &settings([("coop", coop), ("defector", defector)]),
        &fast_limits(),
        &quiet(),
    )
    .unwrap();

    assert_eq!(report.outcome.scores[&PlayerId::from("coop")], 0.0);
    assert_eq!(report.outcome.scores[&PlayerId::from("defector")], 500.0);
    assert_eq!(report.outcome.winner, Some(PlayerId::from("defector")));
    assert_eq!(report.outcome.history.len(), 100);
    assert_eq!(report.timing[&PlayerId::from("coop")].moves, 100);
}

#[test]
fn player_that_never_signals_ready_fails_the_handshake() {
    let scripts = PlayerScripts::new();
    let mute = scripts.never_ready("mute.sh");
    let coop = scripts.constant_mover("coop.sh", "C");

    let error = run_match(
        PrisonersDilemma::new(3).new_manager(),
        &settings([("mute", mute), ("coop", coop)]),
        &fast_limits(),
        &quiet(),
    )
    .unwrap_err();

    let MatchError::Faults(faults) = error else {
        panic!("expected player faults");
    };
    assert_eq!(faults.len(), 1);
    assert_eq!(faults[0].player, PlayerId::from("mute"));
    assert!(matches!(faults[0].fault, RefereeError::NotReady { .. }));
}

#[test]
fn invalid_move_is_attributed_to_its_author() {
    let scripts = PlayerScripts::new();
    // cell 9 is out of range: rejected on the very first ply
    let outlaw = scripts.scripted_mover("outlaw.sh", &[9]);
    let noughts = scripts.scripted_mover("noughts.sh", &[0]);

    let error = run_match(
        TicTacToe.new_manager(),
        &settings([("outlaw", outlaw), ("noughts", noughts)]),
        &fast_limits(),
        &quiet(),
    )
    .unwrap_err();

    let MatchError::Faults(faults) = error else {
        panic!("expected player faults");
    };
    assert_eq!(faults.len(), 1);
    assert_eq!(faults[0].player, PlayerId::from("outlaw"));
    assert!(matches!(faults[0].fault, RefereeError::Rejected { .. }));
}
