//! Turn-based tic-tac-toe on a nine-cell board.

use std::collections::HashMap;
use std::fmt;

use serde_json::{json, Value};

use crate::error::RefereeError;
use crate::manager::{GameFactory, GameManager, MatchOutcome};
use crate::message::Message;
use crate::player::PlayerId;

const WINNING_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Symbol {
    X,
    O,
}

impl Symbol {
    fn other(self) -> Symbol {
        match self {
            Symbol::X => Symbol::O,
            Symbol::O => Symbol::X,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Symbol::X => "X",
            Symbol::O => "O",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ending {
    Won(Symbol),
    Draw,
}

/// Factory for [`TicTacToeManager`] instances.
#[derive(Debug, Clone, Copy, Default)]
pub struct TicTacToe;

impl GameFactory for TicTacToe {
    fn new_manager(&self) -> Box<dyn GameManager> {
        Box::new(TicTacToeManager::new())
    }
}

/// State of one tic-tac-toe match. The first roster player is X and always
/// moves first.
pub struct TicTacToeManager {
    roster: Vec<PlayerId>,
    symbols: HashMap<PlayerId, Symbol>,
    board: [Option<Symbol>; 9],
    current: Symbol,
    moves_made: u32,
    last_move: Option<usize>,
    ending: Option<Ending>,
    history: Vec<Value>,
}

impl TicTacToeManager {
    /// An empty board awaiting its roster.
    pub fn new() -> Self {
        TicTacToeManager {
            roster: vec![],
            symbols: HashMap::new(),
            board: [None; 9],
            current: Symbol::X,
            moves_made: 0,
            last_move: None,
            ending: None,
            history: vec![],
        }
    }

    fn symbol_of(&self, player: &PlayerId) -> Symbol {
        self.symbols[player]
    }

    fn player_of(&self, symbol: Symbol) -> &PlayerId {
        self.roster
            .iter()
            .find(|p| self.symbols[*p] == symbol)
            .expect("both symbols are assigned")
    }

    fn line_winner(&self) -> Option<Symbol> {
        WINNING_LINES.iter().find_map(|line| {
            let first = self.board[line[0]]?;
            (line.iter().all(|&cell| self.board[cell] == Some(first))).then_some(first)
        })
    }
}

impl Default for TicTacToeManager {
    fn default() -> Self {
        Self::new()
    }
}

impl GameManager for TicTacToeManager {
    fn initialize(&mut self, roster: &[PlayerId]) -> Result<(), RefereeError> {
        if roster.len() != 2 {
            return Err(RefereeError::RosterSize {
                expected: 2,
                actual: roster.len(),
            });
        }
        self.roster = roster.to_vec();
        self.symbols.insert(roster[0].clone(), Symbol::X);
        self.symbols.insert(roster[1].clone(), Symbol::O);
        Ok(())
    }

    fn initial_message(&self, player: &PlayerId) -> Message {
        Message::of_type("game_start")
            .with("game", "tictactoe")
            .with("symbol", self.symbol_of(player).to_string())
    }

    fn simultaneous_moves(&self) -> bool {
        false
    }

    fn next_movers(&self) -> Vec<PlayerId> {
        if self.ending.is_some() {
            vec![]
        } else {
            vec![self.player_of(self.current).clone()]
        }
    }

    fn move_request(&self, player: &PlayerId) -> Message {
        let mut message = Message::of_type("your_turn").with("time_index", self.moves_made);
        if let Some(cell) = self.last_move {
            message = message.with(
                "opponent_move",
                json!({
                    "position": cell,
                    "symbol": self.symbol_of(player).other().to_string(),
                }),
            );
        }
        message
    }

    fn validate_move(&self, player: &PlayerId, mv: &Value) -> Result<(), String> {
        let cell = mv
            .as_u64()
            .ok_or_else(|| format!("move must be an integer, got {mv}"))?;
        if cell >= 9 {
            return Err(format!("move must be between 0 and 8, got {cell}"));
        }
        if self.board[cell as usize].is_some() {
            return Err(format!("position {cell} is already occupied"));
        }
        if self.symbol_of(player) != self.current {
            return Err("it's not your turn".to_owned());
        }
        Ok(())
    }

    fn apply_move(&mut self, player: &PlayerId, mv: &Value) {
        let cell = mv.as_u64().expect("move was validated") as usize;
        let symbol = self.symbol_of(player);
        self.board[cell] = Some(symbol);
        self.last_move = Some(cell);
        self.moves_made += 1;
        self.history.push(json!([cell, symbol.to_string()]));

        if let Some(winner) = self.line_winner() {
            self.ending = Some(Ending::Won(winner));
        } else if self.board.iter().all(Option::is_some) {
            self.ending = Some(Ending::Draw);
        } else {
            self.current = self.current.other();
        }
    }

    fn is_over(&self) -> bool {
        self.ending.is_some()
    }

    fn outcome(&self) -> MatchOutcome {
        let draw_scores = || self.roster.iter().map(|p| (p.clone(), 0.5)).collect();
        let (summary, winner, scores) = match self.ending {
            Some(Ending::Won(symbol)) => {
                let winner = self.player_of(symbol).clone();
                let scores = self
                    .roster
                    .iter()
                    .map(|p| (p.clone(), if *p == winner { 1.0 } else { 0.0 }))
                    .collect();
                (format!("{winner} ({symbol}) wins"), Some(winner), scores)
            }
            Some(Ending::Draw) => ("Draw".to_owned(), None, draw_scores()),
            None => ("unfinished".to_owned(), None, draw_scores()),
        };
        MatchOutcome {
            summary,
            winner,
            scores,
            history: self.history.clone(),
        }
    }

    fn display(&self) -> String {
        let cell = |i: usize| match self.board[i] {
            Some(symbol) => symbol.to_string(),
            None => i.to_string(),
        };
        format!(
            "\n  {} | {} | {}\n -----------\n  {} | {} | {}\n -----------\n  {} | {} | {}\n",
            cell(0),
            cell(1),
            cell(2),
            cell(3),
            cell(4),
            cell(5),
            cell(6),
            cell(7),
            cell(8)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_players() -> (PlayerId, PlayerId) {
        (PlayerId::from("p1"), PlayerId::from("p2"))
    }

    fn initialized() -> TicTacToeManager {
        let mut manager = TicTacToeManager::new();
        let (p1, p2) = two_players();
        manager.initialize(&[p1, p2]).unwrap();
        manager
    }

    fn play(manager: &mut TicTacToeManager, player: &PlayerId, cell: u64) {
        let mv = json!(cell);
        manager.validate_move(player, &mv).unwrap();
        manager.apply_move(player, &mv);
    }

    #[test]
    fn exactly_one_mover_until_the_game_is_over() {
        let mut manager = initialized();
        let (p1, p2) = two_players();
        // X on the top row, O below
        for (player, cell) in [(&p1, 0), (&p2, 3), (&p1, 1), (&p2, 4), (&p1, 2)] {
            assert_eq!(manager.next_movers(), vec![player.clone()]);
            play(&mut manager, player, cell);
        }
        assert!(manager.is_over());
        assert!(manager.next_movers().is_empty());
        assert_eq!(manager.outcome().winner, Some(p1));
    }

    #[test]
    fn scripted_alternation_ends_with_a_diagonal_win() {
        let mut manager = initialized();
        let (p1, p2) = two_players();
        let script = [4u64, 0, 1, 3, 2, 5, 6, 7, 8];
        for (index, cell) in script.into_iter().enumerate() {
            if manager.is_over() {
                break;
            }
            let player = if index % 2 == 0 { &p1 } else { &p2 };
            play(&mut manager, player, cell);
        }
        // X holds 2-4-6 after its fourth move
        let outcome = manager.outcome();
        assert_eq!(outcome.winner, Some(p1.clone()));
        assert_eq!(outcome.scores[&p1], 1.0);
        assert_eq!(outcome.scores[&p2], 0.0);
        assert_eq!(outcome.history.len(), 7);
    }

    #[test]
    fn full_board_without_a_line_is_a_draw() {
        let mut manager = initialized();
        let (p1, p2) = two_players();
        // X: 0 1 5 6 8 / O: 2 3 4 7 — no line for either
        for (index, cell) in [0u64, 2, 1, 4, 5, 3, 6, 7, 8].into_iter().enumerate() {
            let player = if index % 2 == 0 { &p1 } else { &p2 };
            play(&mut manager, player, cell);
        }
        let outcome = manager.outcome();
        assert!(manager.is_over());
        assert_eq!(outcome.winner, None);
        assert_eq!(outcome.scores[&p1], 0.5);
        assert_eq!(outcome.scores[&p2], 0.5);
    }

    #[test]
    fn illegal_moves_are_rejected_with_reasons() {
        let mut manager = initialized();
        let (p1, p2) = two_players();
        play(&mut manager, &p1, 4);

        assert!(manager.validate_move(&p2, &json!("4")).is_err());
        assert!(manager.validate_move(&p2, &json!(9)).is_err());
        assert!(manager.validate_move(&p2, &json!(-1)).is_err());
        assert!(manager.validate_move(&p2, &json!(4)).is_err());
        assert!(manager.validate_move(&p1, &json!(0)).is_err());
        assert!(manager.validate_move(&p2, &json!(0)).is_ok());
    }

    #[test]
    fn move_requests_carry_the_opponents_last_move() {
        let mut manager = initialized();
        let (p1, p2) = two_players();
        assert!(manager.move_request(&p1).get("opponent_move").is_none());

        play(&mut manager, &p1, 4);
        let request = manager.move_request(&p2);
        let opponent = request.get("opponent_move").cloned().unwrap();
        assert_eq!(opponent["position"], json!(4));
        assert_eq!(opponent["symbol"], json!("X"));
    }
}
