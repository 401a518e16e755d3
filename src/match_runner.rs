//! Runs one complete match: handshake, ply loop, teardown.
//!
//! The runner owns the manager and the transports for the duration of the
//! match. Whatever happens — clean finish, player fault, setup failure —
//! every transport is stopped before control returns to the caller.

use std::collections::HashMap;
use std::fmt::Display;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::configuration::Configuration;
use crate::error::{MatchError, PlayerFault, RefereeError};
use crate::limits::Limits;
use crate::manager::{GameManager, MatchOutcome};
use crate::message::Message;
use crate::player::PlayerId;
use crate::ply;
use crate::sandbox::SandboxTransport;
use crate::transport::{ProcessTransport, Transport};

/// Ordered roster for one match: in-match identity plus executable.
#[derive(Debug, Clone)]
pub struct MatchSettings {
    /// Players in roster order. Order is meaningful: simultaneous moves are
    /// applied in this order, and rule sets assign roles by position.
    pub players: Vec<(PlayerId, PathBuf)>,
}

impl Display for MatchSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = self
            .players
            .iter()
            .map(|(player, _)| player.as_str())
            .collect::<Vec<_>>()
            .join(" VS ");
        write!(f, "[{names}]")
    }
}

/// Cumulative interaction cost of one player within one match.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PlayerTiming {
    /// Total time spent waiting for this player's replies.
    pub response_time: Duration,
    /// Number of moves collected from this player.
    pub moves: u64,
}

/// Everything known about one finished match.
#[derive(Debug, Clone, Serialize)]
pub struct MatchReport {
    /// How the game ended, as reported by the rule set.
    pub outcome: MatchOutcome,
    /// Per-player response times and move counts.
    pub timing: HashMap<PlayerId, PlayerTiming>,
    /// Wall-clock duration of the whole match, teardown included.
    pub duration: Duration,
}

/// Runs one match to completion.
///
/// Transports are constructed from `config` (sandboxed or bare), started,
/// and stopped again on every exit path. The first fault aborts the match
/// and is attributed to the offending player(s) in the returned error.
#[instrument(skip_all, fields(roster = %settings))]
pub fn run_match(
    mut manager: Box<dyn GameManager>,
    settings: &MatchSettings,
    limits: &Limits,
    config: &Configuration,
) -> Result<MatchReport, MatchError> {
    let start = Instant::now();
    let mut transports = create_transports(settings, limits, config);

    let played = start_all(&mut transports, settings)
        .map_err(MatchError::Setup)
        .and_then(|()| drive(manager.as_mut(), &mut transports, limits, config));

    if let Err(MatchError::Faults(faults)) = &played {
        notify_faults(&mut transports, faults);
    }
    for transport in &mut transports {
        transport.stop();
    }

    let (timing, outcome) = played?;
    Ok(MatchReport {
        outcome,
        timing,
        duration: start.elapsed(),
    })
}

fn create_transports(
    settings: &MatchSettings,
    limits: &Limits,
    config: &Configuration,
) -> Vec<Box<dyn Transport>> {
    settings
        .players
        .iter()
        .enumerate()
        .map(|(slot, (player, _))| {
            if config.sandboxed {
                Box::new(SandboxTransport::new(
                    player.clone(),
                    limits,
                    slot,
                    config.allow_unsandboxed,
                )) as Box<dyn Transport>
            } else {
                Box::new(ProcessTransport::new(player.clone(), limits))
            }
        })
        .collect()
}

fn start_all(
    transports: &mut [Box<dyn Transport>],
    settings: &MatchSettings,
) -> anyhow::Result<()> {
    for (transport, (_, executable)) in transports.iter_mut().zip(&settings.players) {
        transport.start(executable)?;
    }
    Ok(())
}

/// Plays the match over already-started transports. Split out so the caller
/// can guarantee teardown around it.
fn drive(
    manager: &mut dyn GameManager,
    transports: &mut [Box<dyn Transport>],
    limits: &Limits,
    config: &Configuration,
) -> Result<(HashMap<PlayerId, PlayerTiming>, MatchOutcome), MatchError> {
    let roster: Vec<PlayerId> = transports.iter().map(|t| t.player_id().clone()).collect();
    manager
        .initialize(&roster)
        .map_err(|e| MatchError::Setup(anyhow!(e)))?;

    await_readiness(transports, limits, config)?;

    for transport in transports.iter_mut() {
        let hello = manager.initial_message(transport.player_id());
        transport
            .send(&hello)
            .map_err(|fault| MatchError::player(transport.player_id().clone(), fault))?;
    }
    surface_diagnostics(transports, config);

    let mut timing: HashMap<PlayerId, PlayerTiming> = roster
        .iter()
        .map(|player| (player.clone(), PlayerTiming::default()))
        .collect();

    while !manager.is_over() {
        let movers = manager.next_movers();
        if movers.is_empty() {
            // concluded by exhaustion rather than explicit termination
            break;
        }
        if !manager.simultaneous_moves() && movers.len() != 1 {
            return Err(MatchError::Setup(anyhow!(
                "sequential game nominated {} movers",
                movers.len()
            )));
        }
        if let Some(stranger) = movers.iter().find(|&player| !roster.contains(player)) {
            return Err(MatchError::Setup(anyhow!(
                "rules nominated unknown mover {stranger}"
            )));
        }

        let timings = ply::run_ply(manager, transports, &movers, limits.move_timeout)
            .map_err(MatchError::Faults)?;
        for (player, elapsed) in timings {
            let entry = timing.get_mut(&player).expect("timing slot for roster player");
            entry.response_time += elapsed;
            entry.moves += 1;
        }
        debug!(state = %manager.display());
        surface_diagnostics(transports, config);
    }

    let outcome = manager.outcome();
    info!(result = %outcome.summary, "match finished");

    let farewell = outcome.to_message();
    for transport in transports.iter_mut() {
        // players may exit as soon as they learn the result; a failed
        // farewell is not a fault
        if let Err(e) = transport.send(&farewell) {
            debug!(player = %transport.player_id(), "game_over delivery failed: {e}");
        }
    }
    surface_diagnostics(transports, config);

    Ok((timing, outcome))
}

/// Waits for each player's ready signal. Any other first message — or no
/// message at all — is a fault for that player, collected so the report
/// names every player that failed the handshake.
fn await_readiness(
    transports: &mut [Box<dyn Transport>],
    limits: &Limits,
    config: &Configuration,
) -> Result<(), MatchError> {
    let mut faults = Vec::new();
    for transport in transports.iter_mut() {
        match transport.receive(limits.ready_timeout) {
            Ok(message) if message.is_ready() => {
                debug!(player = %transport.player_id(), "ready");
            }
            Ok(message) => faults.push(PlayerFault {
                player: transport.player_id().clone(),
                fault: RefereeError::NotReady {
                    got: message.to_line(),
                },
            }),
            Err(fault) => faults.push(PlayerFault {
                player: transport.player_id().clone(),
                fault,
            }),
        }
    }
    surface_diagnostics(transports, config);
    if faults.is_empty() {
        Ok(())
    } else {
        Err(MatchError::Faults(faults))
    }
}

/// Best-effort error notice to the players that caused the abort.
fn notify_faults(transports: &mut [Box<dyn Transport>], faults: &[PlayerFault]) {
    for fault in faults {
        let Some(transport) = transports
            .iter_mut()
            .find(|t| *t.player_id() == fault.player)
        else {
            continue;
        };
        let notice = Message::error(&fault.fault.to_string());
        if let Err(e) = transport.send(&notice) {
            debug!(player = %fault.player, "error notice delivery failed: {e}");
        }
    }
}

fn surface_diagnostics(transports: &mut [Box<dyn Transport>], config: &Configuration) {
    for transport in transports.iter_mut() {
        for line in transport.drain_diagnostics() {
            if config.show_player_stderr {
                println!("[{} LOG] {line}", transport.player_id());
            } else {
                debug!(player = %transport.player_id(), "{line}");
            }
        }
    }
}
