//! Shipped rule sets implementing the manager contract.
//!
//! Each game is a [`GameManager`](crate::manager::GameManager)
//! implementation plus a [`GameFactory`](crate::manager::GameFactory) that
//! carries its parameters. Nothing here knows how moves are collected; the
//! referee drives both games through the same contract.

pub mod dilemma;
pub mod tictactoe;

pub use dilemma::PrisonersDilemma;
pub use tictactoe::TicTacToe;
