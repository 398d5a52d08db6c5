//! GraniteChess - Move Generation Module
//!
//! Legal move generation and attack detection. Generation is pseudo-legal
//! first, then filtered by playing each move on a scratch board and
//! rejecting those that leave the mover's king attacked. Leaper attacks
//! come from the precomputed tables in the bitboard module; slider attacks
//! walk file/rank deltas so board edges never wrap.

use crate::bitboard::{Bits, KING_ATTACKS, KNIGHT_ATTACKS, PAWN_ATTACKS};
use crate::board::{Board, Move};
use crate::types::*;

const ORTHO_DIRS: [(i32, i32); 4] = [(0, 1), (0, -1), (1, 0), (-1, 0)];
const DIAG_DIRS: [(i32, i32); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

/// All legal moves for the side to move. With `captures_only` set, only
/// moves that take a piece (including en passant) are produced.
pub fn legal_moves(board: &Board, captures_only: bool) -> Vec<Move> {
    let white = board.white_to_move();
    let pseudo = pseudo_legal(board, captures_only);
    let mut scratch = board.clone();
    pseudo
        .into_iter()
        .filter(|&mv| {
            let undo = scratch.make_move(mv);
            let legal = !king_attacked(&scratch, white);
            scratch.undo_move(mv, &undo);
            legal
        })
        .collect()
}

/// True if the side to move is in check
pub fn in_check(board: &Board) -> bool {
    king_attacked(board, board.white_to_move())
}

fn king_attacked(board: &Board, white: bool) -> bool {
    let king_bb = board.bitboard(make_piece(KING, white));
    if king_bb == 0 {
        return false;
    }
    is_square_attacked(board, king_bb.trailing_zeros() as usize, !white)
}

/// True if any piece of the given color attacks the square
pub fn is_square_attacked(board: &Board, sq: usize, by_white: bool) -> bool {
    // a pawn of the attacking color sits on a square from which the
    // opposite color's capture pattern reaches sq
    let pawn_side = if by_white { 1 } else { 0 };
    if PAWN_ATTACKS[pawn_side][sq] & board.bitboard(make_piece(PAWN, by_white)) != 0 {
        return true;
    }
    if KNIGHT_ATTACKS[sq] & board.bitboard(make_piece(KNIGHT, by_white)) != 0 {
        return true;
    }
    if KING_ATTACKS[sq] & board.bitboard(make_piece(KING, by_white)) != 0 {
        return true;
    }
    slider_reaches(board, sq, &ORTHO_DIRS, make_piece(ROOK, by_white), make_piece(QUEEN, by_white))
        || slider_reaches(
            board,
            sq,
            &DIAG_DIRS,
            make_piece(BISHOP, by_white),
            make_piece(QUEEN, by_white),
        )
}

fn slider_reaches(board: &Board, sq: usize, dirs: &[(i32, i32); 4], slider: u8, queen: u8) -> bool {
    let file0 = (sq % 8) as i32;
    let rank0 = (sq / 8) as i32;
    for &(df, dr) in dirs {
        let mut file = file0 + df;
        let mut rank = rank0 + dr;
        while (0..8).contains(&file) && (0..8).contains(&rank) {
            let piece = board.piece_at((rank * 8 + file) as usize);
            if piece != EMPTY {
                if piece == slider || piece == queen {
                    return true;
                }
                break;
            }
            file += df;
            rank += dr;
        }
    }
    false
}

fn pseudo_legal(board: &Board, captures_only: bool) -> Vec<Move> {
    let mut moves = Vec::with_capacity(48);
    let white = board.white_to_move();
    let own = board.color_occupancy(white);
    let enemy = board.color_occupancy(!white);
    let occupied = own | enemy;

    pawn_moves(board, white, occupied, enemy, captures_only, &mut moves);

    for from in Bits(board.bitboard(make_piece(KNIGHT, white))) {
        let mut targets = KNIGHT_ATTACKS[from] & !own;
        if captures_only {
            targets &= enemy;
        }
        for to in Bits(targets) {
            moves.push(Move::new(from, to));
        }
    }

    slider_piece_moves(board, make_piece(BISHOP, white), &DIAG_DIRS, own, enemy, captures_only, &mut moves);
    slider_piece_moves(board, make_piece(ROOK, white), &ORTHO_DIRS, own, enemy, captures_only, &mut moves);
    slider_piece_moves(board, make_piece(QUEEN, white), &DIAG_DIRS, own, enemy, captures_only, &mut moves);
    slider_piece_moves(board, make_piece(QUEEN, white), &ORTHO_DIRS, own, enemy, captures_only, &mut moves);

    for from in Bits(board.bitboard(make_piece(KING, white))) {
        let mut targets = KING_ATTACKS[from] & !own;
        if captures_only {
            targets &= enemy;
        }
        for to in Bits(targets) {
            moves.push(Move::new(from, to));
        }
    }

    if !captures_only {
        castle_moves(board, white, occupied, &mut moves);
    }

    moves
}

fn pawn_moves(
    board: &Board,
    white: bool,
    occupied: u64,
    enemy: u64,
    captures_only: bool,
    moves: &mut Vec<Move>,
) {
    let (push, start_rank, promo_rank): (i32, usize, usize) =
        if white { (8, 1, 7) } else { (-8, 6, 0) };
    let pawn_side = if white { 0 } else { 1 };
    let ep = board.en_passant_square();

    for from in Bits(board.bitboard(make_piece(PAWN, white))) {
        let attacks = PAWN_ATTACKS[pawn_side][from];

        for to in Bits(attacks & enemy) {
            if to / 8 == promo_rank {
                push_promotions(from, to, moves);
            } else {
                moves.push(Move::new(from, to));
            }
        }

        if ep >= 0 && attacks & (1u64 << ep) != 0 {
            moves.push(Move::ep_capture(from, ep as usize));
        }

        if captures_only {
            continue;
        }

        let to = from as i32 + push;
        if !(0..64).contains(&to) {
            continue;
        }
        let to = to as usize;
        if occupied & (1u64 << to) == 0 {
            if to / 8 == promo_rank {
                push_promotions(from, to, moves);
            } else {
                moves.push(Move::new(from, to));
                if from / 8 == start_rank {
                    let to2 = (to as i32 + push) as usize;
                    if occupied & (1u64 << to2) == 0 {
                        moves.push(Move::new(from, to2));
                    }
                }
            }
        }
    }
}

fn push_promotions(from: usize, to: usize, moves: &mut Vec<Move>) {
    for promo in [QUEEN, ROOK, BISHOP, KNIGHT] {
        moves.push(Move::promoting(from, to, promo));
    }
}

fn slider_piece_moves(
    board: &Board,
    piece: u8,
    dirs: &[(i32, i32); 4],
    own: u64,
    enemy: u64,
    captures_only: bool,
    moves: &mut Vec<Move>,
) {
    for from in Bits(board.bitboard(piece)) {
        let file0 = (from % 8) as i32;
        let rank0 = (from / 8) as i32;
        for &(df, dr) in dirs {
            let mut file = file0 + df;
            let mut rank = rank0 + dr;
            while (0..8).contains(&file) && (0..8).contains(&rank) {
                let to = (rank * 8 + file) as usize;
                let bit = 1u64 << to;
                if own & bit != 0 {
                    break;
                }
                if enemy & bit != 0 {
                    moves.push(Move::new(from, to));
                    break;
                }
                if !captures_only {
                    moves.push(Move::new(from, to));
                }
                file += df;
                rank += dr;
            }
        }
    }
}

fn castle_moves(board: &Board, white: bool, occupied: u64, moves: &mut Vec<Move>) {
    let rights = board.castling_rights();
    let clear = |squares: &[usize]| squares.iter().all(|&sq| occupied & (1u64 << sq) == 0);
    let safe = |squares: &[usize]| {
        squares
            .iter()
            .all(|&sq| !is_square_attacked(board, sq, !white))
    };

    if white {
        if rights & CASTLE_WK != 0 && clear(&[5, 6]) && safe(&[4, 5, 6]) {
            moves.push(Move::castling(4, 6));
        }
        if rights & CASTLE_WQ != 0 && clear(&[1, 2, 3]) && safe(&[4, 3, 2]) {
            moves.push(Move::castling(4, 2));
        }
    } else {
        if rights & CASTLE_BK != 0 && clear(&[61, 62]) && safe(&[60, 61, 62]) {
            moves.push(Move::castling(60, 62));
        }
        if rights & CASTLE_BQ != 0 && clear(&[57, 58, 59]) && safe(&[60, 59, 58]) {
            moves.push(Move::castling(60, 58));
        }
    }
}

/// Node count of the legal move tree to the given depth
pub fn perft(board: &mut Board, depth: usize) -> u64 {
    if depth == 0 {
        return 1;
    }
    let moves = legal_moves(board, false);
    if depth == 1 {
        return moves.len() as u64;
    }
    let mut nodes = 0;
    for mv in moves {
        let undo = board.make_move(mv);
        nodes += perft(board, depth - 1);
        board.undo_move(mv, &undo);
    }
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::START_FEN;

    const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";

    #[test]
    fn perft_start_position() {
        let mut board = Board::from_fen(START_FEN).unwrap();
        assert_eq!(perft(&mut board, 1), 20);
        assert_eq!(perft(&mut board, 2), 400);
        assert_eq!(perft(&mut board, 3), 8902);
    }

    #[test]
    fn perft_castling_and_en_passant_position() {
        let mut board = Board::from_fen(KIWIPETE).unwrap();
        assert_eq!(perft(&mut board, 1), 48);
        assert_eq!(perft(&mut board, 2), 2039);
    }

    #[test]
    fn captures_only_is_a_subset_of_all_moves() {
        let board = Board::from_fen(KIWIPETE).unwrap();
        let all = legal_moves(&board, false);
        let captures = legal_moves(&board, true);
        assert!(!captures.is_empty());
        for mv in &captures {
            assert!(all.contains(mv));
            let takes = board.piece_at(mv.to as usize) != EMPTY || mv.en_passant;
            assert!(takes, "{} is not a capture", mv.uci());
        }
    }

    #[test]
    fn check_detection() {
        let board = Board::from_fen("4k3/8/8/8/8/8/4R3/4K3 b - - 0 1").unwrap();
        assert!(in_check(&board));
        let board = Board::from_fen(START_FEN).unwrap();
        assert!(!in_check(&board));
    }

    #[test]
    fn single_escape_from_rook_check() {
        // Ra8+ with g7 blocked by a black pawn: only Kh7 is playable
        let board = Board::from_fen("R6k/6p1/8/8/8/8/8/7K b - - 0 1").unwrap();
        let moves = legal_moves(&board, false);
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].uci(), "h8h7");
    }

    #[test]
    fn promotion_generates_all_four_pieces() {
        let board = Board::from_fen("8/4P3/8/8/8/8/8/k1K5 w - - 0 1").unwrap();
        let moves = legal_moves(&board, false);
        let promos: Vec<&Move> = moves.iter().filter(|m| m.promotion != EMPTY).collect();
        assert_eq!(promos.len(), 4);
    }
}
