//! End-to-end properties of the search on the public API.

use granite_chess::board::{Board, Move, START_FEN};
use granite_chess::eval::evaluate;
use granite_chess::movegen::{in_check, legal_moves};
use granite_chess::search::{SearchEngine, INF, MATE};
use granite_chess::time::TurnClock;

fn best_at_depth(fen: &str, depth: i32, use_tt: bool) -> (Move, i32) {
    let mut board = Board::from_fen(fen).unwrap();
    let mut engine = SearchEngine::new(8);
    engine.use_tt = use_tt;
    let clock = TurnClock::infinite();
    engine.think::<fn(i32, i32, u64, u64, Move)>(&mut board, &clock, depth, None)
}

#[test]
fn fixed_depth_search_is_deterministic() {
    let fen = "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 0 1";
    let first = best_at_depth(fen, 4, true);
    let second = best_at_depth(fen, 4, true);
    assert_eq!(first, second);
}

#[test]
fn transposition_table_changes_speed_not_scores() {
    let fen = "4k3/8/8/8/8/8/4P3/4K3 w - - 0 1";
    let (_, with_tt) = best_at_depth(fen, 3, true);
    let (_, without_tt) = best_at_depth(fen, 3, false);
    assert_eq!(with_tt, without_tt);
}

#[test]
fn pruned_search_matches_full_width_minimax() {
    let fen = "r1bqkb1r/pppp1ppp/2n2n2/4p3/2B1P3/5Q2/PPPP1PPP/RNB1K1NR b KQkq - 3 3";
    let depth = 3;
    let (_, engine_score) = best_at_depth(fen, depth, false);

    let mut board = Board::from_fen(fen).unwrap();
    let reference = minimax(&mut board, 0, depth);
    assert_eq!(engine_score, reference);
}

// Full-width negamax with the same leaf semantics as the engine but no
// window and no table; its root value is the ground truth the pruned
// search must reproduce.
fn minimax(board: &mut Board, ply: i32, mut depth: i32) -> i32 {
    if ply > 0 && board.is_repeated_position() {
        return 0;
    }
    let checked = in_check(board);
    if checked {
        depth += 1;
    }
    let quiescence = depth <= 0;
    let mut best = -INF;
    if quiescence {
        best = evaluate(board);
    }
    let moves = legal_moves(board, quiescence);
    if moves.is_empty() {
        if quiescence {
            return best;
        }
        return if checked { -MATE } else { 0 };
    }
    for mv in moves {
        let undo = board.make_move(mv);
        let score = -minimax(board, ply + 1, depth - 1);
        board.undo_move(mv, &undo);
        if score > best {
            best = score;
        }
    }
    best
}

#[test]
fn mate_in_one_is_found_and_scored_as_mate() {
    let fen = "6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1";
    let (mv, score) = best_at_depth(fen, 4, true);
    assert_eq!(score, MATE);
    assert_eq!(mv.uci(), "a1a8");

    // the chosen move really delivers checkmate
    let mut board = Board::from_fen(fen).unwrap();
    board.make_move(mv);
    assert!(in_check(&board));
    assert!(legal_moves(&board, false).is_empty());
}

#[test]
fn forced_move_is_chosen_at_every_depth() {
    let fen = "R6k/6p1/8/8/8/8/8/7K b - - 0 1";
    for depth in 1..=5 {
        let (mv, _) = best_at_depth(fen, depth, true);
        assert_eq!(mv.uci(), "h8h7", "depth {}", depth);
    }
}

#[test]
fn opening_search_returns_a_sane_legal_move() {
    let (mv, score) = best_at_depth(START_FEN, 3, true);
    let board = Board::from_fen(START_FEN).unwrap();
    assert!(legal_moves(&board, false).contains(&mv));
    assert!(score.abs() < 300, "score {}", score);
}

#[test]
fn quiescence_resolves_capture_chains() {
    // heavy pieces stacked on the d-file: depth 1 forces quiescence to
    // unwind the whole exchange sequence, which must terminate
    let fen = "3q3k/3r4/3r4/3p4/3R4/3R4/3Q4/7K w - - 0 1";
    let (mv, _) = best_at_depth(fen, 1, true);
    assert!(!mv.is_null());
}

#[test]
fn exhausted_clock_still_yields_a_validated_move() {
    // the budget is gone almost immediately: deeper passes abort and the
    // engine must fall back on a completed shallow iteration
    let fen = "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 0 1";
    let mut board = Board::from_fen(fen).unwrap();
    let mut engine = SearchEngine::new(8);
    let clock = TurnClock::from_remaining(1);
    let (mv, _) =
        engine.think::<fn(i32, i32, u64, u64, Move)>(&mut board, &clock, 64, None);
    assert!(legal_moves(&board, false).contains(&mv));
}
