//! Fault taxonomy for player interaction and match execution.
//!
//! Faults occurring during a ply are never retried: a single failure
//! terminates the match, attributed to the offending player, and the
//! tournament layer treats any failed match as fatal.

use std::time::Duration;

use thiserror::Error;

use crate::player::PlayerId;

/// A single fault while interacting with a player process.
#[derive(Debug, Error)]
pub enum RefereeError {
    /// No reply arrived before the deadline.
    #[error("no response within {0:?}")]
    Timeout(Duration),
    /// The player's output stream closed before a full line arrived.
    #[error("player stream closed unexpectedly")]
    Disconnected,
    /// The received line was not a well-formed protocol message.
    #[error("malformed message: {line:?}")]
    Malformed {
        /// The offending line as received.
        line: String,
    },
    /// Writing to the player failed; its process has exited or closed stdin.
    #[error("could not send message to player")]
    Send(#[source] std::io::Error),
    /// The move was structurally sound but rejected by the rules.
    #[error("move rejected: {reason}")]
    Rejected {
        /// Human-readable rejection reason from the rule set.
        reason: String,
    },
    /// The rules require a different number of participants.
    #[error("game requires exactly {expected} players, got {actual}")]
    RosterSize {
        /// Roster size the rule set requires.
        expected: usize,
        /// Roster size that was provided.
        actual: usize,
    },
    /// The player's first message was not a ready signal.
    #[error("player did not signal readiness, first message was {got:?}")]
    NotReady {
        /// What arrived instead of `{"status": "ready"}`.
        got: String,
    },
}

/// A fault attributed to the player that caused it.
#[derive(Debug, Error)]
#[error("{player}: {fault}")]
pub struct PlayerFault {
    /// The offending player.
    pub player: PlayerId,
    /// What went wrong.
    #[source]
    pub fault: RefereeError,
}

/// Why a match could not produce a result.
#[derive(Debug, Error)]
pub enum MatchError {
    /// The match could not be set up at all (spawn failure, bad roster, ...).
    /// Not attributable to any player's in-game behavior.
    #[error("match setup failed: {0:#}")]
    Setup(anyhow::Error),
    /// One or more players faulted during play.
    #[error("{}", list_faults(.0))]
    Faults(Vec<PlayerFault>),
}

impl MatchError {
    /// A failure caused by exactly one player.
    pub(crate) fn player(player: PlayerId, fault: RefereeError) -> Self {
        MatchError::Faults(vec![PlayerFault { player, fault }])
    }
}

fn list_faults(faults: &[PlayerFault]) -> String {
    faults
        .iter()
        .map(PlayerFault::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
