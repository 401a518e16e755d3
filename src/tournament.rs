//! Round-robin scheduling and cumulative standings.
//!
//! The tournament enumerates every unordered pair of registered players (no
//! self-play), plays each pairing a configured number of times, and folds
//! each finished game into running statistics. Matches run strictly one at
//! a time: resource consumption stays bounded and results reproducible.
//!
//! A single failed match aborts the whole tournament. Rankings would be
//! incomparable if some matchups silently failed while others proceeded, so
//! the first fault is reported with its matchup and game number and nothing
//! else is played.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use serde::Serialize;
use tracing::{info, instrument};

use crate::configuration::Configuration;
use crate::limits::Limits;
use crate::logger::init_logger;
use crate::manager::GameFactory;
use crate::match_runner::{run_match, MatchReport, MatchSettings};
use crate::player::{unique_display_names, PlayerId};

/// Per-player cumulative statistics across a tournament.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PlayerStats {
    /// Sum of final scores over all games played.
    pub total_score: f64,
    /// Games played.
    pub games: u32,
    /// Games won outright.
    pub wins: u32,
    /// Games ending without a winner.
    pub draws: u32,
    /// Games lost.
    pub losses: u32,
    /// Total time spent waiting for this player's replies.
    pub response_time: Duration,
    /// Total moves collected from this player.
    pub moves: u64,
}

impl PlayerStats {
    /// Average score per game; zero before any game was played.
    pub fn average_score(&self) -> f64 {
        if self.games == 0 {
            0.0
        } else {
            self.total_score / f64::from(self.games)
        }
    }

    /// Average response time per move.
    pub fn average_response_time(&self) -> Duration {
        if self.moves == 0 {
            Duration::ZERO
        } else {
            self.response_time / self.moves as u32
        }
    }
}

/// One line of the game-by-game log.
#[derive(Debug, Clone, Serialize)]
pub struct GameRecord {
    /// 1-based game number in play order.
    pub number: u32,
    /// Display names of both participants, roster order.
    pub players: (String, String),
    /// Final scores, same order as `players`.
    pub scores: (f64, f64),
    /// Winner's display name; `None` on a draw.
    pub winner: Option<String>,
    /// Wall-clock duration of the game.
    pub duration: Duration,
}

/// Aggregate over all finished games. Append-only; never rolled back.
#[derive(Debug, Default, Serialize)]
pub struct TournamentStats {
    players: Vec<String>,
    stats: HashMap<String, PlayerStats>,
    games: Vec<GameRecord>,
    /// Wall-clock duration of the whole tournament.
    pub total_duration: Duration,
}

impl TournamentStats {
    fn register(&mut self, name: &str) {
        self.players.push(name.to_owned());
        self.stats.insert(name.to_owned(), PlayerStats::default());
    }

    fn record(&mut self, first: &str, second: &str, number: u32, report: &MatchReport) {
        let score_of = |name: &str| {
            report
                .outcome
                .scores
                .get(&PlayerId::from(name))
                .copied()
                .unwrap_or(0.0)
        };
        let scores = (score_of(first), score_of(second));
        let winner = report.outcome.winner.as_ref().map(PlayerId::to_string);

        for (name, score) in [(first, scores.0), (second, scores.1)] {
            let entry = self.stats.get_mut(name).expect("registered player");
            entry.total_score += score;
            entry.games += 1;
            match &winner {
                None => entry.draws += 1,
                Some(w) if w == name => entry.wins += 1,
                Some(_) => entry.losses += 1,
            }
            if let Some(timing) = report.timing.get(&PlayerId::from(name)) {
                entry.response_time += timing.response_time;
                entry.moves += timing.moves;
            }
        }

        self.games.push(GameRecord {
            number,
            players: (first.to_owned(), second.to_owned()),
            scores,
            winner,
            duration: report.duration,
        });
    }

    /// Statistics of one player, by display name.
    pub fn player(&self, name: &str) -> Option<&PlayerStats> {
        self.stats.get(name)
    }

    /// The append-only game-by-game log, in play order.
    pub fn games(&self) -> &[GameRecord] {
        &self.games
    }

    /// Display names best-first: average score per game descending, ties
    /// broken by win count descending.
    pub fn standings(&self) -> Vec<String> {
        let mut names = self.players.clone();
        names.sort_by(|a, b| {
            let (sa, sb) = (&self.stats[a], &self.stats[b]);
            sb.average_score()
                .partial_cmp(&sa.average_score())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(sb.wins.cmp(&sa.wins))
        });
        names
    }
}

impl fmt::Display for TournamentStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<6} {:<30} {:<10} {:<8} {:<8} {:<12}",
            "Rank", "Player", "Avg/Game", "Total", "Games", "W-D-L"
        )?;
        for (rank, name) in self.standings().iter().enumerate() {
            let s = &self.stats[name];
            writeln!(
                f,
                "{:<6} {:<30} {:<10.2} {:<8} {:<8} {}-{}-{}",
                rank + 1,
                name,
                s.average_score(),
                s.total_score,
                s.games,
                s.wins,
                s.draws,
                s.losses
            )?;
        }
        writeln!(
            f,
            "\n{} games in {:.3}s",
            self.games.len(),
            self.total_duration.as_secs_f64()
        )?;
        writeln!(
            f,
            "{:<30} {:<15} {:<15} {:<12}",
            "Player", "Total Time", "Avg per Move", "Move Count"
        )?;
        for name in &self.players {
            let s = &self.stats[name];
            writeln!(
                f,
                "{:<30} {:<15.3} {:<15.6} {:<12}",
                name,
                s.response_time.as_secs_f64(),
                s.average_response_time().as_secs_f64(),
                s.moves
            )?;
        }
        Ok(())
    }
}

/// Round-robin tournament runner over one game.
///
/// Holds a [`GameFactory`] rather than a concrete rule set: every game gets
/// a freshly constructed manager and fresh transports, because neither is
/// reusable across matches.
pub struct Tournament<F: GameFactory> {
    factory: F,
    limits: Limits,
    config: Configuration,
    games_per_matchup: usize,
}

impl<F: GameFactory> Tournament<F> {
    /// Creates a tournament over the game produced by `factory`.
    pub fn new(factory: F, config: Configuration, limits: Limits) -> Self {
        if config.log {
            init_logger();
        }
        Tournament {
            factory,
            limits,
            config,
            games_per_matchup: 5,
        }
    }

    /// Number of games each unordered pair plays. Default is five.
    #[must_use]
    pub fn with_games_per_matchup(mut self, games: usize) -> Self {
        self.games_per_matchup = games;
        self
    }

    /// Runs every pairing to completion and returns the standings.
    ///
    /// # Errors
    ///
    /// Fails when fewer than two executables are given, and on the first
    /// match failure (fail-fast; the error names the matchup and game).
    #[instrument(skip_all)]
    pub fn run(&self, executables: &[PathBuf]) -> anyhow::Result<TournamentStats> {
        anyhow::ensure!(
            executables.len() >= 2,
            "a round robin needs at least two players"
        );
        let names = unique_display_names(executables);
        let pairings = all_pairings(executables.len());
        let total_games = pairings.len() * self.games_per_matchup;
        info!(
            players = names.len(),
            matchups = pairings.len(),
            total_games,
            "tournament start"
        );

        let start = Instant::now();
        let mut stats = TournamentStats::default();
        for name in &names {
            stats.register(name);
        }

        let mut game_number = 0u32;
        for (i, j) in pairings {
            for repeat in 0..self.games_per_matchup {
                game_number += 1;
                let settings = MatchSettings {
                    players: vec![
                        (PlayerId::from(names[i].as_str()), executables[i].clone()),
                        (PlayerId::from(names[j].as_str()), executables[j].clone()),
                    ],
                };

                let manager = self.factory.new_manager();
                let report = run_match(manager, &settings, &self.limits, &self.config)
                    .with_context(|| {
                        format!(
                            "game {game_number}/{total_games} ({} vs {}, game {}/{}) failed, tournament aborted",
                            names[i],
                            names[j],
                            repeat + 1,
                            self.games_per_matchup
                        )
                    })?;

                if self.config.verbose {
                    println!(
                        "game {game_number}/{total_games} {settings}: {}",
                        report.outcome.summary
                    );
                }
                stats.record(&names[i], &names[j], game_number, &report);
            }
        }

        stats.total_duration = start.elapsed();
        Ok(stats)
    }
}

/// Every unordered pair of indices below `n`, no self-play.
fn all_pairings(n: usize) -> Vec<(usize, usize)> {
    let mut pairings = Vec::with_capacity(n * (n.saturating_sub(1)) / 2);
    for i in 0..n {
        for j in (i + 1)..n {
            pairings.push((i, j));
        }
    }
    pairings
}
