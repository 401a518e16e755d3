//! One ply of the protocol: request, collect, validate, apply.
//!
//! Two collection strategies, selected by the rule set: sequential (one
//! request/response with the single eligible player) and simultaneous
//! (requests to every eligible player first, then concurrent collection so
//! that no player can observe another's move — or its timing — before
//! committing its own).
//!
//! Manager state is only ever mutated on the calling thread, after every
//! collection task has finished; the tasks themselves only read the rules
//! and write their own result slot.

use std::thread;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::error::{PlayerFault, RefereeError};
use crate::manager::GameManager;
use crate::message::Message;
use crate::player::PlayerId;
use crate::transport::Transport;

/// Response time per collected move, in roster order.
pub(crate) type PlyTimings = Vec<(PlayerId, Duration)>;

/// Runs one ply for `movers`. Faults are never retried: the caller aborts
/// the match on `Err`, which carries every fault observed in the ply.
pub(crate) fn run_ply(
    manager: &mut dyn GameManager,
    transports: &mut [Box<dyn Transport>],
    movers: &[PlayerId],
    timeout: Duration,
) -> Result<PlyTimings, Vec<PlayerFault>> {
    if manager.simultaneous_moves() {
        simultaneous_ply(manager, transports, movers, timeout)
    } else {
        sequential_ply(manager, transports, movers, timeout)
    }
}

fn sequential_ply(
    manager: &mut dyn GameManager,
    transports: &mut [Box<dyn Transport>],
    movers: &[PlayerId],
    timeout: Duration,
) -> Result<PlyTimings, Vec<PlayerFault>> {
    debug_assert_eq!(movers.len(), 1, "sequential games have a single mover");
    let player = movers[0].clone();
    let transport = transports
        .iter_mut()
        .find(|t| *t.player_id() == player)
        .expect("mover is in the roster");

    let fault = |fault: RefereeError| {
        vec![PlayerFault {
            player: player.clone(),
            fault,
        }]
    };

    transport
        .send(&manager.move_request(&player))
        .map_err(&fault)?;
    let start = Instant::now();
    let reply = transport.receive(timeout).map_err(&fault)?;
    let elapsed = start.elapsed();

    let mv = extract_move(&reply).map_err(&fault)?;
    manager
        .validate_move(&player, &mv)
        .map_err(|reason| fault(RefereeError::Rejected { reason }))?;
    manager.apply_move(&player, &mv);
    trace!(%player, %mv, "move applied");

    Ok(vec![(player, elapsed)])
}

fn simultaneous_ply(
    manager: &mut dyn GameManager,
    transports: &mut [Box<dyn Transport>],
    movers: &[PlayerId],
    timeout: Duration,
) -> Result<PlyTimings, Vec<PlayerFault>> {
    let mut eligible: Vec<&mut Box<dyn Transport>> = transports
        .iter_mut()
        .filter(|t| movers.contains(t.player_id()))
        .collect();
    debug_assert_eq!(eligible.len(), movers.len(), "movers are in the roster");

    // Every request goes out before any collection starts, so neither
    // player learns anything from the other's reply timing.
    let mut send_faults = Vec::new();
    for transport in eligible.iter_mut() {
        let player = transport.player_id().clone();
        let request = manager.move_request(&player);
        if let Err(fault) = transport.send(&request) {
            send_faults.push(PlayerFault { player, fault });
        }
    }
    if !send_faults.is_empty() {
        return Err(send_faults);
    }

    // One collection task per eligible player; the join below is the single
    // synchronization point before any manager mutation. A fault in one task
    // does not cancel the others: every live request waits out its own
    // timeout.
    let collected: Vec<(PlayerId, Result<(serde_json::Value, Duration), RefereeError>)> = {
        let rules: &dyn GameManager = &*manager;
        thread::scope(|scope| {
            let handles: Vec<_> = eligible
                .into_iter()
                .map(|transport| scope.spawn(move || collect_one(rules, transport, timeout)))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("collection task panicked"))
                .collect()
        })
    };

    let mut faults = Vec::new();
    let mut staged = Vec::new();
    for (player, outcome) in collected {
        match outcome {
            Ok((mv, elapsed)) => staged.push((player, mv, elapsed)),
            Err(fault) => faults.push(PlayerFault { player, fault }),
        }
    }
    if !faults.is_empty() {
        return Err(faults);
    }

    // Apply in roster order (collection order is roster order), never in
    // task-completion order, then resolve the ply exactly once.
    let mut timings = Vec::with_capacity(staged.len());
    for (player, mv, elapsed) in staged {
        manager.apply_move(&player, &mv);
        trace!(%player, %mv, "move staged");
        timings.push((player, elapsed));
    }
    manager.resolve_ply();

    Ok(timings)
}

fn collect_one(
    rules: &dyn GameManager,
    transport: &mut Box<dyn Transport>,
    timeout: Duration,
) -> (PlayerId, Result<(serde_json::Value, Duration), RefereeError>) {
    let player = transport.player_id().clone();
    let start = Instant::now();
    let outcome = transport.receive(timeout).and_then(|reply| {
        let elapsed = start.elapsed();
        let mv = extract_move(&reply)?;
        rules
            .validate_move(&player, &mv)
            .map_err(|reason| RefereeError::Rejected { reason })?;
        Ok((mv, elapsed))
    });
    (player, outcome)
}

fn extract_move(reply: &Message) -> Result<serde_json::Value, RefereeError> {
    reply
        .move_value()
        .cloned()
        .ok_or_else(|| RefereeError::Malformed {
            line: reply.to_line(),
        })
}
