//! Iterated prisoner's dilemma: simultaneous cooperate/defect rounds.

use std::collections::HashMap;

use serde_json::{json, Value};

use crate::error::RefereeError;
use crate::manager::{GameFactory, GameManager, MatchOutcome};
use crate::message::Message;
use crate::player::PlayerId;

/// Points awarded per (own move, opponent move) combination.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PayoffTable {
    /// Both cooperate.
    pub both_cooperate: (f64, f64),
    /// You cooperate, opponent defects.
    pub cooperate_defect: (f64, f64),
    /// You defect, opponent cooperates.
    pub defect_cooperate: (f64, f64),
    /// Both defect.
    pub both_defect: (f64, f64),
}

impl Default for PayoffTable {
    fn default() -> Self {
        PayoffTable {
            both_cooperate: (3.0, 3.0),
            cooperate_defect: (0.0, 5.0),
            defect_cooperate: (5.0, 0.0),
            both_defect: (1.0, 1.0),
        }
    }
}

impl PayoffTable {
    fn payoff(&self, first: Choice, second: Choice) -> (f64, f64) {
        match (first, second) {
            (Choice::Cooperate, Choice::Cooperate) => self.both_cooperate,
            (Choice::Cooperate, Choice::Defect) => self.cooperate_defect,
            (Choice::Defect, Choice::Cooperate) => self.defect_cooperate,
            (Choice::Defect, Choice::Defect) => self.both_defect,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Choice {
    Cooperate,
    Defect,
}

impl Choice {
    fn parse(mv: &Value) -> Result<Choice, String> {
        let text = mv
            .as_str()
            .ok_or_else(|| format!("move must be a string, got {mv}"))?;
        match text.to_ascii_uppercase().as_str() {
            "C" => Ok(Choice::Cooperate),
            "D" => Ok(Choice::Defect),
            other => Err(format!(
                "move must be 'C' (cooperate) or 'D' (defect), got {other:?}"
            )),
        }
    }

    fn letter(self) -> &'static str {
        match self {
            Choice::Cooperate => "C",
            Choice::Defect => "D",
        }
    }
}

/// Game parameters: factory for [`DilemmaManager`] instances.
#[derive(Debug, Clone)]
pub struct PrisonersDilemma {
    /// Rounds per match.
    pub rounds: u32,
    /// Payoff table applied every round.
    pub payoff: PayoffTable,
}

impl PrisonersDilemma {
    /// A dilemma over `rounds` rounds with the classic payoff table.
    pub fn new(rounds: u32) -> Self {
        PrisonersDilemma {
            rounds,
            payoff: PayoffTable::default(),
        }
    }
}

impl Default for PrisonersDilemma {
    /// The classic setup: 100 rounds, payoffs (3,3)/(0,5)/(5,0)/(1,1).
    fn default() -> Self {
        Self::new(100)
    }
}

impl GameFactory for PrisonersDilemma {
    fn new_manager(&self) -> Box<dyn GameManager> {
        Box::new(DilemmaManager {
            rules: self.clone(),
            roster: vec![],
            round: 0,
            scores: HashMap::new(),
            staged: HashMap::new(),
            history: vec![],
        })
    }
}

/// State of one iterated-dilemma match.
pub struct DilemmaManager {
    rules: PrisonersDilemma,
    roster: Vec<PlayerId>,
    round: u32,
    scores: HashMap<PlayerId, f64>,
    staged: HashMap<PlayerId, Choice>,
    history: Vec<(Choice, Choice, f64, f64)>,
}

impl DilemmaManager {
    fn roster_index(&self, player: &PlayerId) -> usize {
        self.roster
            .iter()
            .position(|p| p == player)
            .expect("player is in the roster")
    }
}

impl GameManager for DilemmaManager {
    fn initialize(&mut self, roster: &[PlayerId]) -> Result<(), RefereeError> {
        if roster.len() != 2 {
            return Err(RefereeError::RosterSize {
                expected: 2,
                actual: roster.len(),
            });
        }
        self.roster = roster.to_vec();
        for player in roster {
            self.scores.insert(player.clone(), 0.0);
        }
        Ok(())
    }

    fn initial_message(&self, _player: &PlayerId) -> Message {
        let payoff = &self.rules.payoff;
        let rule = |(you, opponent): (f64, f64)| json!({ "you": you, "opponent": opponent });
        Message::of_type("game_start")
            .with("game", "prisoners_dilemma")
            .with("rounds", self.rules.rounds)
            .with(
                "rules",
                json!({
                    "both_cooperate": rule(payoff.both_cooperate),
                    "you_cooperate_opponent_defects": rule(payoff.cooperate_defect),
                    "you_defect_opponent_cooperates": rule(payoff.defect_cooperate),
                    "both_defect": rule(payoff.both_defect),
                }),
            )
    }

    fn simultaneous_moves(&self) -> bool {
        true
    }

    fn next_movers(&self) -> Vec<PlayerId> {
        if self.round < self.rules.rounds {
            self.roster.clone()
        } else {
            vec![]
        }
    }

    fn move_request(&self, player: &PlayerId) -> Message {
        let mut message = Message::of_type("your_turn")
            .with("round", self.round + 1)
            .with("your_score", self.scores[player]);

        if let Some(&(first, second, first_score, second_score)) = self.history.last() {
            let (yours, others, gained) = if self.roster_index(player) == 0 {
                (first, second, first_score)
            } else {
                (second, first, second_score)
            };
            message = message.with(
                "last_round",
                json!({
                    "your_move": yours.letter(),
                    "opponent_move": others.letter(),
                    "your_score_gained": gained,
                }),
            );
        }
        message
    }

    fn validate_move(&self, _player: &PlayerId, mv: &Value) -> Result<(), String> {
        Choice::parse(mv).map(|_| ())
    }

    fn apply_move(&mut self, player: &PlayerId, mv: &Value) {
        let choice = Choice::parse(mv).expect("move was validated");
        self.staged.insert(player.clone(), choice);
    }

    fn resolve_ply(&mut self) {
        debug_assert_eq!(self.staged.len(), 2, "both moves staged before resolution");
        let first = self.staged[&self.roster[0]];
        let second = self.staged[&self.roster[1]];
        let (first_score, second_score) = self.rules.payoff.payoff(first, second);

        *self.scores.get_mut(&self.roster[0]).expect("scored player") += first_score;
        *self.scores.get_mut(&self.roster[1]).expect("scored player") += second_score;
        self.history.push((first, second, first_score, second_score));
        self.staged.clear();
        self.round += 1;
    }

    fn is_over(&self) -> bool {
        self.round >= self.rules.rounds
    }

    fn outcome(&self) -> MatchOutcome {
        let first = &self.roster[0];
        let second = &self.roster[1];
        let (first_score, second_score) = (self.scores[first], self.scores[second]);

        let (winner, summary) = if first_score > second_score {
            (Some(first.clone()), format!("{first} wins with {first_score} points"))
        } else if second_score > first_score {
            (Some(second.clone()), format!("{second} wins with {second_score} points"))
        } else {
            (None, format!("Draw with {first_score} points each"))
        };

        MatchOutcome {
            summary,
            winner,
            scores: self.scores.clone(),
            history: self
                .history
                .iter()
                .map(|&(a, b, sa, sb)| json!([a.letter(), b.letter(), sa, sb]))
                .collect(),
        }
    }

    fn display(&self) -> String {
        format!(
            "Round {}/{}\nScores: {}={}, {}={}",
            self.round,
            self.rules.rounds,
            self.roster[0],
            self.scores[&self.roster[0]],
            self.roster[1],
            self.scores[&self.roster[1]],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_players() -> (PlayerId, PlayerId) {
        (PlayerId::from("p1"), PlayerId::from("p2"))
    }

    fn initialized(rounds: u32) -> Box<dyn GameManager> {
        let mut manager = PrisonersDilemma::new(rounds).new_manager();
        let (p1, p2) = two_players();
        manager.initialize(&[p1, p2]).unwrap();
        manager
    }

    fn play_round(manager: &mut dyn GameManager, first: &str, second: &str) {
        let (p1, p2) = two_players();
        for (player, mv) in [(p1, first), (p2, second)] {
            let mv = json!(mv);
            manager.validate_move(&player, &mv).unwrap();
            manager.apply_move(&player, &mv);
        }
        manager.resolve_ply();
    }

    #[test]
    fn requires_exactly_two_players() {
        let mut manager = PrisonersDilemma::default().new_manager();
        let err = manager.initialize(&[PlayerId::from("solo")]).unwrap_err();
        assert!(matches!(
            err,
            RefereeError::RosterSize {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn classic_payoffs() {
        let mut manager = initialized(4);
        play_round(manager.as_mut(), "C", "C");
        play_round(manager.as_mut(), "C", "D");
        play_round(manager.as_mut(), "D", "C");
        play_round(manager.as_mut(), "D", "D");

        let (p1, p2) = two_players();
        let outcome = manager.outcome();
        assert_eq!(outcome.scores[&p1], 3.0 + 0.0 + 5.0 + 1.0);
        assert_eq!(outcome.scores[&p2], 3.0 + 5.0 + 0.0 + 1.0);
        assert!(outcome.winner.is_none());
        assert_eq!(outcome.history.len(), 4);
    }

    #[test]
    fn lowercase_moves_are_accepted() {
        let mut manager = initialized(1);
        play_round(manager.as_mut(), "c", "d");
        let (p1, p2) = two_players();
        let outcome = manager.outcome();
        assert_eq!(outcome.scores[&p1], 0.0);
        assert_eq!(outcome.scores[&p2], 5.0);
        assert_eq!(outcome.winner, Some(p2));
    }

    #[test]
    fn garbage_moves_are_rejected() {
        let manager = initialized(1);
        let (p1, _) = two_players();
        assert!(manager.validate_move(&p1, &json!("X")).is_err());
        assert!(manager.validate_move(&p1, &json!(3)).is_err());
        assert!(manager.validate_move(&p1, &json!(null)).is_err());
    }

    #[test]
    fn concludes_by_round_exhaustion() {
        let mut manager = initialized(2);
        assert_eq!(manager.next_movers().len(), 2);
        play_round(manager.as_mut(), "C", "C");
        assert!(!manager.is_over());
        play_round(manager.as_mut(), "C", "C");
        assert!(manager.is_over());
        assert!(manager.next_movers().is_empty());
    }

    #[test]
    fn move_request_reports_the_previous_round() {
        let mut manager = initialized(2);
        let (p1, p2) = two_players();
        assert!(manager.move_request(&p1).get("last_round").is_none());

        play_round(manager.as_mut(), "C", "D");
        let last = manager.move_request(&p2).get("last_round").cloned().unwrap();
        assert_eq!(last["your_move"], json!("D"));
        assert_eq!(last["opponent_move"], json!("C"));
        assert_eq!(last["your_score_gained"], json!(5.0));
    }
}
