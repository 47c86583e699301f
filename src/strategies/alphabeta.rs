use super::Strategy;
use crate::game::{Game, Score, INF, TIE_SCORE};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::marker::PhantomData;

pub struct AlphaBetaParams {
    pub max_depth: usize,
}

/// Depth-bounded minimax with alpha-beta pruning.
///
/// Stateless between calls apart from its RNG, which is only used to shuffle
/// move order and break ties among equal-score moves so play is not
/// predictable.
pub struct AlphaBeta<G> {
    pub params: AlphaBetaParams,
    rng: SmallRng,
    _phantom: PhantomData<G>,
}

impl<G: Game> AlphaBeta<G> {
    pub fn with_rng(params: AlphaBetaParams, rng: SmallRng) -> Self {
        AlphaBeta {
            params,
            rng,
            _phantom: PhantomData,
        }
    }

    /// Best move for the agent to act, with its minimax score. `(None,
    /// TIE_SCORE)` when the position has no legal moves and no winner.
    pub fn best_move(&mut self, game: &G) -> (Option<G::Move>, Score) {
        let me = game.to_act();
        self.search(game, me, 0, -INF, INF)
    }

    fn search(
        &mut self,
        game: &G,
        me: G::Agent,
        depth: usize,
        mut alpha: Score,
        mut beta: Score,
    ) -> (Option<G::Move>, Score) {
        // Depth-biased terminal scores order proven outcomes: faster forced
        // wins and slower forced losses score strictly better.
        if let Some(winner) = game.winner() {
            let score = if winner == me {
                INF - depth as Score
            } else {
                -INF + depth as Score
            };
            return (None, score);
        }

        let mut moves: Vec<G::Move> = game.legal_moves().collect();
        if moves.is_empty() {
            return (None, TIE_SCORE);
        }

        if depth >= self.params.max_depth {
            return (None, game.evaluate() * game.player_weight(me));
        }

        moves.shuffle(&mut self.rng);

        let maximizing = depth % 2 == 0;
        let mut best_score = None;
        let mut best_moves = Vec::new();
        for m in moves {
            let next = match game.apply(m) {
                Some(next) => next,
                None => continue, // a legal_moves entry must apply; skip if not
            };
            let (_, score) = self.search(&next, me, depth + 1, alpha, beta);
            let improved = match best_score {
                None => true,
                Some(best) => {
                    if maximizing {
                        score > best
                    } else {
                        score < best
                    }
                }
            };
            if improved {
                best_score = Some(score);
                best_moves.clear();
                best_moves.push(m);
                if maximizing {
                    alpha = alpha.max(score);
                } else {
                    beta = beta.min(score);
                }
            } else if best_score == Some(score) {
                best_moves.push(m);
            }

            if alpha > beta {
                break;
            }
        }

        (
            best_moves.choose(&mut self.rng).copied(),
            best_score.unwrap_or(TIE_SCORE),
        )
    }
}

impl<G: Game> Strategy<G> for AlphaBeta<G> {
    type Params = AlphaBetaParams;

    fn create(params: AlphaBetaParams) -> Self {
        Self::with_rng(params, SmallRng::from_entropy())
    }

    fn decide(&mut self, game: &G) -> Option<G::Move> {
        self.best_move(game).0
    }
}
