//! Adversarial search for finite, perfect-information, turn-based games.
//!
//! The engines in [`strategies`] operate purely against the [`game::Game`]
//! contract and never see a concrete board: [`strategies::AlphaBeta`] is a
//! depth-bounded minimax with alpha-beta pruning, and [`strategies::Mcts`]
//! is a Monte-Carlo tree search with UCT selection, iteration/time budgets,
//! tree reuse across turns and optional background pondering.

pub mod game;
pub mod runner;
pub mod strategies;
