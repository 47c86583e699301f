use crate::game::Game;

/// A move-selection engine. `None` from `decide` means no move is available
/// (forfeit/tie); callers must not retry.
pub trait Strategy<G: Game> {
    type Params;
    fn create(params: Self::Params) -> Self;
    fn decide(&mut self, game: &G) -> Option<G::Move>;
}

pub mod alphabeta;
pub mod mcts;

pub use self::alphabeta::{AlphaBeta, AlphaBetaParams};
pub use self::mcts::{Mcts, MctsParams, SearchStats, SearchTree, DEFAULT_EXPLORATION};
