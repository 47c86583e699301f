pub mod tictactoe;

use std::fmt;

pub type Score = i32;

/// Reserved for decided positions; depth-biased terminal scores stay below it.
pub const INF: Score = 0xFFFF;

pub const TIE_SCORE: Score = 0;

/// One full game configuration plus whose turn it is.
///
/// Everything the search engines know about a game goes through this trait.
/// Implementors are immutable values: `apply` returns a brand-new position
/// and never mutates the receiver. Equality must compare board contents and
/// the active player, nothing else.
pub trait Game: Clone + PartialEq + Send {
    type Move: Copy + Eq + Send + fmt::Debug;
    type Agent: Copy + Eq + Send;

    fn new(first: Self::Agent) -> Self;

    fn to_act(&self) -> Self::Agent;

    /// Stable index of an agent (0 or 1 for two-player games), used by the
    /// driver to pick whose turn it is.
    fn agent_id(&self, agent: Self::Agent) -> usize;

    /// `Some` iff the position is terminal with a winner. Implementors should
    /// compute this incrementally around the last move and cache it.
    fn winner(&self) -> Option<Self::Agent>;

    /// Static heuristic score, positive favoring the reference player.
    /// Magnitude `INF` is reserved for decided positions.
    fn evaluate(&self) -> Score;

    /// The side `evaluate` speaks for.
    fn ref_player(&self) -> Self::Agent;

    /// +1 if `agent` is the reference player, -1 otherwise. Multiplying a
    /// static score by this orients it toward the searching agent.
    fn player_weight(&self, agent: Self::Agent) -> Score {
        if agent == self.ref_player() {
            1
        } else {
            -1
        }
    }

    /// Lazily enumerates the legal moves. Finite; empty at any terminal
    /// position (won or drawn). Order is implementor-defined.
    fn legal_moves(&self) -> impl Iterator<Item = Self::Move> + '_;

    /// Pure: yields a new independent position, or `None` for an illegal
    /// move. Never a partial mutation.
    fn apply(&self, m: Self::Move) -> Option<Self>;

    /// No winner and no legal moves.
    fn is_tie(&self) -> bool {
        self.winner().is_none() && self.legal_moves().next().is_none()
    }
}

/// Games whose moves can be read from human input.
pub trait ParseGame: Game {
    fn parse_move(&self, input: &str) -> Option<Self::Move>;
}
