//! The game-agnostic contract between the referee and a rule set.
//!
//! The referee drives a match exclusively through [`GameManager`]: it asks
//! who moves, builds outgoing messages from the rule set's payloads,
//! validates and applies incoming moves, and detects termination. The rule
//! set never learns whether moves were collected sequentially or
//! concurrently.
//!
//! State machine: uninitialized → initialized → (ply: request → collect →
//! validate → apply/stage → [resolve]) × n → over. There is no pause or
//! resume; a match runs to completion or aborts on the first fault.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::RefereeError;
use crate::message::Message;
use crate::player::PlayerId;

/// Game-specific rules driven by the referee.
///
/// Implementations must uphold two invariants the referee relies on:
/// [`validate_move`](GameManager::validate_move) is side-effect-free, and
/// state changes only happen in [`apply_move`](GameManager::apply_move) and
/// [`resolve_ply`](GameManager::resolve_ply).
pub trait GameManager: Send + Sync {
    /// Seeds internal state from the fixed roster of participants.
    ///
    /// # Errors
    ///
    /// [`RefereeError::RosterSize`] when the roster does not match the
    /// player count the rules require.
    fn initialize(&mut self, roster: &[PlayerId]) -> Result<(), RefereeError>;

    /// The game-start payload specific to `player` (assigned role, rules
    /// summary, ...).
    fn initial_message(&self, player: &PlayerId) -> Message;

    /// Whether all eligible players move at once. Fixed per game; selects
    /// the collection strategy for every ply of the match.
    fn simultaneous_moves(&self) -> bool;

    /// Players eligible to act in the current ply.
    ///
    /// An empty set signals that no plies remain (conclusion by exhaustion).
    /// Sequential games return exactly one player until the game is over.
    fn next_movers(&self) -> Vec<PlayerId>;

    /// The payload describing the current position from `player`'s
    /// perspective, including the opponent's prior move if relevant.
    fn move_request(&self, player: &PlayerId) -> Message;

    /// Structural and legality check. Must not mutate state.
    ///
    /// # Errors
    ///
    /// A human-readable rejection reason.
    fn validate_move(&self, player: &PlayerId, mv: &Value) -> Result<(), String>;

    /// Commits a previously validated move.
    ///
    /// Simultaneous games stage the move here without resolving outcomes;
    /// resolution happens in [`resolve_ply`](GameManager::resolve_ply) once
    /// every eligible mover has staged.
    fn apply_move(&mut self, player: &PlayerId, mv: &Value);

    /// Resolves one simultaneous ply after all stages are complete. Called
    /// exactly once per ply; sequential games keep the default no-op.
    fn resolve_ply(&mut self) {}

    /// True once the game has ended.
    fn is_over(&self) -> bool;

    /// The final outcome. Only meaningful once no plies remain.
    fn outcome(&self) -> MatchOutcome;

    /// A rendering of the current state for observers; never sent to
    /// players.
    fn display(&self) -> String;
}

/// Creates fresh [`GameManager`] instances.
///
/// Manager state is not resettable, so every match gets a brand new
/// instance; the scheduler only ever holds this interface, never a concrete
/// rule set.
pub trait GameFactory {
    /// Returns an uninitialized manager for one match.
    fn new_manager(&self) -> Box<dyn GameManager>;
}

/// Immutable record of how a finished game ended.
#[derive(Debug, Clone, Serialize)]
pub struct MatchOutcome {
    /// Human-readable result summary.
    pub summary: String,
    /// Winning player; `None` on a draw.
    pub winner: Option<PlayerId>,
    /// Final score per player.
    pub scores: HashMap<PlayerId, f64>,
    /// Full move/score history, one entry per resolved step.
    pub history: Vec<Value>,
}

impl MatchOutcome {
    /// The `game_over` payload broadcast to every player.
    pub fn to_message(&self) -> Message {
        let winner = match &self.winner {
            Some(player) => Value::String(player.to_string()),
            None => Value::Null,
        };
        let scores =
            serde_json::to_value(&self.scores).expect("string-keyed score map serializes");
        Message::of_type("game_over")
            .with("result", self.summary.as_str())
            .with("winner", winner)
            .with("final_scores", scores)
            .with("history", Value::Array(self.history.clone()))
    }
}
