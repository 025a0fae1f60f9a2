//! Main search implementation.
//!
//! Fixed-depth negamax with alpha-beta pruning. The engine borrows the
//! caller's board for the duration of one `best_move` call and returns it
//! in its exact pre-call state: every move applied during the search is
//! taken back before the enclosing frame returns, enforced by
//! [`with_move`].

use rand::Rng;

use super::params::SearchParams;
use super::stats::SearchStats;
use crate::board::{Board, Color, Move};
use crate::eval::{self, CHECKMATE_SCORE};

/// Main search engine.
pub struct Search {
    /// Search parameters.
    params: SearchParams,

    /// Search statistics.
    stats: SearchStats,

    /// Move selected at the root of the current search.
    best: Option<Move>,
}

impl Search {
    /// Create a new search engine.
    pub fn new(params: SearchParams) -> Self {
        Self {
            params,
            stats: SearchStats::new(),
            best: None,
        }
    }

    /// Create a search bounded at the given depth.
    pub fn with_depth(depth: u8) -> Self {
        Self::new(SearchParams::new().max_depth(depth))
    }

    pub fn params(&self) -> &SearchParams {
        &self.params
    }

    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    /// Select a move for the side to move. Returns the selected move (if
    /// any) and the score of the search from the mover's perspective. A
    /// caller receiving `None` falls back to [`random_move`].
    pub fn best_move(&mut self, board: &mut Board) -> (Option<Move>, i16) {
        self.stats.reset();
        self.stats.start_timing();
        self.best = None;

        let moves = board.valid_moves();
        let sign: i16 = match board.side_to_move() {
            Color::White => 1,
            Color::Black => -1,
        };
        let score = self.negamax(
            board,
            &moves,
            self.params.max_depth,
            -CHECKMATE_SCORE,
            CHECKMATE_SCORE,
            sign,
        );

        self.stats.update_timing();
        tracing::debug!(
            depth = self.params.max_depth,
            nodes = self.stats.nodes,
            cutoffs = self.stats.cutoffs,
            score,
            "search complete"
        );
        (self.best, score)
    }

    /// Negamax over `moves` in generation order, window (alpha, beta),
    /// `sign` = +1 with white to move. At the root depth the maximizing
    /// move is recorded as the selection.
    fn negamax(
        &mut self,
        board: &mut Board,
        moves: &[Move],
        depth: u8,
        mut alpha: i16,
        beta: i16,
        sign: i16,
    ) -> i16 {
        self.stats.inc_node();
        if depth == 0 {
            return sign * eval::score_board(board);
        }

        let mut max_score = -CHECKMATE_SCORE;
        for &mv in moves {
            let score = with_move(board, mv, |board| {
                let replies = board.valid_moves();
                -self.negamax(board, &replies, depth - 1, -beta, -alpha, -sign)
            });
            if score > max_score {
                max_score = score;
                if depth == self.params.max_depth {
                    self.best = Some(mv);
                }
            }
            if max_score > alpha {
                alpha = max_score;
            }
            if alpha >= beta {
                self.stats.inc_cutoff();
                break;
            }
        }
        max_score
    }
}

/// Apply `mv`, run `f`, and take the move back before returning, so the
/// board leaves this frame exactly as it entered it on every path.
fn with_move<T>(board: &mut Board, mv: Move, f: impl FnOnce(&mut Board) -> T) -> T {
    board.make_move(mv);
    let result = f(board);
    board.undo_move();
    result
}

/// Uniform fallback choice over the legal moves.
pub fn random_move(moves: &[Move]) -> Option<Move> {
    if moves.is_empty() {
        return None;
    }
    let mut rng = rand::rng();
    Some(moves[rng.random_range(0..moves.len())])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_move_restores_the_board() {
        let mut board = Board::new();
        let mv = board.valid_moves()[0];
        with_move(&mut board, mv, |b| {
            assert_eq!(b.side_to_move(), Color::Black);
        });
        assert_eq!(board.side_to_move(), Color::White);
        assert!(board.move_log().is_empty());
    }

    #[test]
    fn random_move_covers_the_whole_list() {
        let mut board = Board::new();
        let moves = board.valid_moves();
        for _ in 0..50 {
            let mv = random_move(&moves).unwrap();
            assert!(moves.contains(&mv));
        }
        assert_eq!(random_move(&[]), None);
    }
}
