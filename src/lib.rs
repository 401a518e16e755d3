//! # Game Referee
//!
//! A modular Rust crate for refereeing games between autonomous, untrusted
//! player processes, and for aggregating many such games into round-robin
//! tournament standings.
//!
//! It provides:
//! - A line-oriented player [`transport`] over isolated subprocesses, with
//!   strict per-exchange timeouts and an interchangeable cgroup-confined
//!   variant ([`sandbox`])
//! - A game-agnostic rules contract (the [`GameManager`](manager::GameManager)
//!   trait) that drives both turn-based and simultaneous-move games without
//!   the game logic knowing about concurrency
//! - A [`match_runner`] wiring one rule set to its transports for one
//!   complete game: handshake, ply loop, guaranteed teardown
//! - A round-robin [`tournament`] scheduler with per-player statistics and a
//!   full game-by-game log
//! - Two built-in [`games`]: an iterated prisoner's dilemma (simultaneous)
//!   and tic-tac-toe (turn-based)
//!
//! Each player runs as a separate OS process and speaks a line-delimited
//! JSON protocol over stdin/stdout; stderr is drained out of band as
//! free-form diagnostics. A player that hangs, crashes or cheats costs at
//! most one ply: the fault is attributed to it and the match is aborted.
//!
//! # Player Protocol
//!
//! One JSON object per line:
//!
//! - Referee → player: `{"type": "game_start", ...}`, `{"type": "your_turn", ...}`,
//!   `{"type": "game_over", "result": ..., "winner": ..., ...}`,
//!   `{"type": "error", "message": ...}`
//! - Player → referee: first `{"status": "ready"}`, then one
//!   `{"move": <value>}` per `your_turn`
//!
//! Game-specific payload fields are documented by each rule set in [`games`].
//!
//! # Usage Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use game_referee::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let limits = LimitsBuilder::new()
//!         .with_move_timeout(Duration::from_secs(5))
//!         .with_ram_per_player(128) // in MB, sandboxed transports only
//!         .build()?;
//!
//!     let config = Configuration::new().with_verbose(true);
//!
//!     let tournament = Tournament::new(PrisonersDilemma::default(), config, limits)
//!         .with_games_per_matchup(5);
//!     let stats = tournament.run(&[
//!         "players/tit_for_tat".into(),
//!         "players/grudger".into(),
//!         "players/always_defect".into(),
//!     ])?;
//!
//!     println!("{stats}");
//!     Ok(())
//! }
//! ```
//!
//! A single game runs through [`match_runner::run_match`] with a manager
//! built by any [`GameFactory`](manager::GameFactory).
//!
//! # Player Requirements
//!
//! - Speak the line protocol above, one message per line, flushed
//! - Send the ready signal promptly after starting
//! - Answer every `your_turn` within the configured move timeout
//! - Exit once `game_over` arrives (stragglers are killed after a grace
//!   period)
#![warn(missing_docs)]

pub use anyhow;

pub mod configuration;
pub mod error;
pub mod games;
pub mod limits;
mod logger;
pub mod manager;
pub mod match_runner;
pub mod message;
pub mod player;
mod ply;
pub mod sandbox;
pub mod tournament;
pub mod transport;

/// Commonly used types and traits for quick access.
///
/// Import this prelude to get started easily:
/// ```rust
/// use game_referee::prelude::*;
/// ```
pub mod prelude {
    pub use crate::configuration::Configuration;
    pub use crate::error::{MatchError, PlayerFault, RefereeError};
    pub use crate::games::{PrisonersDilemma, TicTacToe};
    pub use crate::limits::{Limits, LimitsBuilder};
    pub use crate::manager::{GameFactory, GameManager, MatchOutcome};
    pub use crate::match_runner::{run_match, MatchReport, MatchSettings};
    pub use crate::message::Message;
    pub use crate::player::PlayerId;
    pub use crate::tournament::Tournament;
    pub use crate::transport::{ProcessTransport, Transport};
}
