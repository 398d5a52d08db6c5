//! GraniteChess - Search Module
//!
//! Negamax search with alpha-beta pruning, a capture-only quiescence
//! extension at the horizon, transposition-table caching, MVV-LVA move
//! ordering, and an iterative-deepening driver under a polled time
//! budget. One recursive function covers both regular and quiescence
//! nodes and returns a (score, move) pair; scores are always from the
//! perspective of the side to move at that node.

use crate::board::{Board, Move};
use crate::eval::{evaluate, PIECE_VALUES};
use crate::movegen::{in_check, legal_moves};
use crate::time::TurnClock;
use crate::tt::{Bound, TranspositionTable, TtEntry};
use crate::types::{piece_type, EMPTY, PAWN};
use log::debug;

/// Score of a delivered checkmate; far above any material total so the
/// two can never be confused.
pub const MATE: i32 = 1_000_000;

/// Initial window bound, strictly above MATE, never stored
pub const INF: i32 = 1_048_576;

/// Hard ceiling for iterative deepening
pub const MAX_DEPTH: i32 = 128;

/// Recursion ceiling; check extensions cannot push a line past this
const MAX_PLY: i32 = 128;

/// Nodes at or below this depth skip the time poll
const TIME_CHECK_MIN_DEPTH: i32 = 2;

const TT_MOVE_SCORE: i32 = 1_000_000;
const CAPTURE_SCORE: i32 = 100_000;

pub struct SearchEngine {
    tt: TranspositionTable,
    pub use_tt: bool,
    pub nodes: u64,
    aborted: bool,
}

impl SearchEngine {
    pub fn new(tt_size_mb: usize) -> Self {
        SearchEngine {
            tt: TranspositionTable::new(tt_size_mb),
            use_tt: true,
            nodes: 0,
            aborted: false,
        }
    }

    /// Pick a move for the side to move, deepening one ply at a time
    /// until the clock or the depth ceiling stops the loop. Only moves
    /// from iterations that ran to completion are ever returned; an
    /// aborted deepest pass is discarded in favor of the previous one.
    pub fn think<F>(
        &mut self,
        board: &mut Board,
        clock: &TurnClock,
        max_depth: i32,
        mut on_depth: Option<F>,
    ) -> (Move, i32)
    where
        F: FnMut(i32, i32, u64, u64, Move),
    {
        self.nodes = 0;
        self.aborted = false;

        let mut best_move = Move::NULL;
        let mut best_score = 0;

        for depth in 1..=max_depth.clamp(1, MAX_DEPTH) {
            let (score, mv) = self.search(board, 0, depth, -INF, INF, clock);

            if self.aborted {
                // tainted pass, keep the previous iteration's answer
                break;
            }
            if mv.is_null() {
                // no legal moves at the root
                break;
            }

            best_move = mv;
            best_score = score;

            if let Some(report) = on_depth.as_mut() {
                report(depth, score, self.nodes, clock.elapsed_ms(), best_move);
            }
            if score.abs() >= MATE {
                // a forced mate cannot improve with more depth
                break;
            }
            if clock.out_of_time() {
                break;
            }
        }

        debug!(
            "think: {} nodes, {} tt hits, {} tt stores, best {}",
            self.nodes,
            self.tt.hits,
            self.tt.stores,
            best_move.uci()
        );
        (best_move, best_score)
    }

    fn search(
        &mut self,
        board: &mut Board,
        ply: i32,
        mut depth: i32,
        mut alpha: i32,
        beta: i32,
        clock: &TurnClock,
    ) -> (i32, Move) {
        self.nodes += 1;

        // A position already visited in this line is a draw, decided
        // before the table is consulted: a cached score from another
        // path knows nothing about this line's history.
        if ply > 0 && board.is_repeated_position() {
            return (0, Move::NULL);
        }

        let checked = in_check(board);
        if checked {
            depth += 1;
        }

        if ply >= MAX_PLY {
            return (evaluate(board), Move::NULL);
        }

        let quiescence = depth <= 0;
        let original_alpha = alpha;
        let mut best_score = -INF;
        let mut best_move = Move::NULL;

        if quiescence {
            // Stand pat: the side to move may decline every capture, so
            // the static score is a floor on this node's value.
            let stand_pat = evaluate(board);
            if stand_pat >= beta {
                return (stand_pat, Move::NULL);
            }
            best_score = stand_pat;
            if stand_pat > alpha {
                alpha = stand_pat;
            }
        }

        let entry = if self.use_tt {
            self.tt.probe(board.hash())
        } else {
            TtEntry::EMPTY
        };
        if ply > 0 && entry.depth >= depth {
            let usable = match entry.bound {
                Bound::Exact => true,
                Bound::Lower => entry.score >= beta,
                Bound::Upper => entry.score <= alpha,
            };
            if usable {
                return (entry.score, entry.mv);
            }
        }

        let moves = legal_moves(board, quiescence);

        if moves.is_empty() {
            if quiescence {
                // out of captures; the stand-pat floor stands
                return (best_score, Move::NULL);
            }
            return if checked {
                (-MATE, Move::NULL)
            } else {
                (0, Move::NULL)
            };
        }

        for mv in order_moves(board, moves, entry.mv) {
            if depth > TIME_CHECK_MIN_DEPTH && clock.out_of_time() {
                self.aborted = true;
                return (best_score, best_move);
            }

            let undo = board.make_move(mv);
            let (child_score, _) = self.search(board, ply + 1, depth - 1, -beta, -alpha, clock);
            board.undo_move(mv, &undo);

            if self.aborted {
                // the child's score is partial; unwind with what we have
                return (best_score, best_move);
            }

            let score = -child_score;
            if score > best_score {
                best_score = score;
                best_move = mv;
            }
            if score > alpha {
                alpha = score;
            }
            if score >= beta {
                break;
            }
        }

        if self.use_tt {
            let bound = if best_score >= beta {
                Bound::Lower
            } else if best_score > original_alpha {
                Bound::Exact
            } else {
                Bound::Upper
            };
            self.tt.store(board.hash(), best_move, depth, best_score, bound);
        }

        (best_score, best_move)
    }

    pub fn clear_tt(&mut self) {
        self.tt.clear();
    }

    pub fn tt_hashfull(&self) -> usize {
        self.tt.hashfull()
    }
}

impl Default for SearchEngine {
    fn default() -> Self {
        SearchEngine::new(64)
    }
}

/// Priority order: the cached best move first, then captures by most
/// valuable victim / least valuable aggressor, then the rest in their
/// generated order. Deterministic for identical inputs.
fn order_moves(board: &Board, moves: Vec<Move>, tt_move: Move) -> Vec<Move> {
    let mut scored: Vec<(i32, Move)> = moves
        .into_iter()
        .map(|mv| {
            let score = if !tt_move.is_null() && mv == tt_move {
                TT_MOVE_SCORE
            } else {
                let victim = if mv.en_passant {
                    PAWN
                } else {
                    piece_type(board.piece_at(mv.to as usize))
                };
                if victim != EMPTY {
                    let attacker = piece_type(board.piece_at(mv.from as usize));
                    CAPTURE_SCORE + 10 * PIECE_VALUES[victim as usize]
                        - PIECE_VALUES[attacker as usize]
                } else {
                    0
                }
            };
            (score, mv)
        })
        .collect();
    scored.sort_by_key(|&(score, _)| std::cmp::Reverse(score));
    scored.into_iter().map(|(_, mv)| mv).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::START_FEN;

    fn find_move(board: &Board, uci: &str) -> Move {
        legal_moves(board, false)
            .into_iter()
            .find(|m| m.uci() == uci)
            .unwrap_or_else(|| panic!("no legal move {}", uci))
    }

    #[test]
    fn repeated_position_scores_zero_inside_the_tree() {
        let mut board = Board::from_fen(START_FEN).unwrap();
        for uci in ["g1f3", "g8f6", "f3g1", "f6g8"] {
            let mv = find_move(&board, uci);
            board.make_move(mv);
        }
        let mut engine = SearchEngine::new(1);
        let clock = TurnClock::infinite();
        let (score, mv) = engine.search(&mut board, 1, 4, -INF, INF, &clock);
        assert_eq!(score, 0);
        assert!(mv.is_null());
    }

    #[test]
    fn cached_move_is_tried_first() {
        let board = Board::from_fen(START_FEN).unwrap();
        let moves = legal_moves(&board, false);
        let favorite = moves[7];
        let ordered = order_moves(&board, moves, favorite);
        assert_eq!(ordered[0], favorite);
    }

    #[test]
    fn captures_outrank_quiet_moves() {
        // white can take the d5 pawn with the e4 pawn or the knight
        let board =
            Board::from_fen("rnbqkbnr/ppp1pppp/8/3p4/4P3/2N5/PPPP1PPP/R1BQKBNR w KQkq - 0 1")
                .unwrap();
        let ordered = order_moves(&board, legal_moves(&board, false), Move::NULL);
        let first = ordered[0];
        assert!(board.piece_at(first.to as usize) != EMPTY);
        // pawn takes before knight takes: equal victims, lighter attacker
        assert_eq!(first.uci(), "e4d5");
    }

    #[test]
    fn stalemate_scores_zero() {
        // black to move, not in check, no legal moves
        let mut board = Board::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        let mut engine = SearchEngine::new(1);
        let clock = TurnClock::infinite();
        let (score, mv) = engine.search(&mut board, 1, 3, -INF, INF, &clock);
        assert_eq!(score, 0);
        assert!(mv.is_null());
    }

    #[test]
    fn checkmated_node_scores_minus_mate() {
        // white is mated in the corner
        let mut board = Board::from_fen("8/8/8/8/8/5k2/6q1/7K w - - 0 1").unwrap();
        let mut engine = SearchEngine::new(1);
        let clock = TurnClock::infinite();
        let (score, _) = engine.search(&mut board, 1, 3, -INF, INF, &clock);
        assert_eq!(score, -MATE);
    }
}
