//! GraniteChess - Board Representation Module
//!
//! Board state, moves, and move execution. The board keeps a mailbox array
//! and per-piece bitboards in sync through a single put/remove seam, and
//! maintains its Zobrist hash incrementally so the current position's
//! content hash is always available without a rescan. Every make_move is
//! paired with an undo_move that restores the exact prior state, hash
//! included.

use crate::types::*;
use rand::prelude::*;
use std::sync::LazyLock;
use thiserror::Error;

/// Starting position FEN
pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Represents a chess move
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Move {
    pub from: u8,
    pub to: u8,
    /// Promotion piece type, EMPTY when not a promotion
    pub promotion: u8,
    pub castle: bool,
    pub en_passant: bool,
}

impl Move {
    /// Sentinel for "no move chosen"
    pub const NULL: Move = Move {
        from: 0,
        to: 0,
        promotion: EMPTY,
        castle: false,
        en_passant: false,
    };

    pub fn new(from: usize, to: usize) -> Self {
        Move {
            from: from as u8,
            to: to as u8,
            ..Move::NULL
        }
    }

    pub fn promoting(from: usize, to: usize, promotion: u8) -> Self {
        Move {
            promotion,
            ..Move::new(from, to)
        }
    }

    pub fn castling(from: usize, to: usize) -> Self {
        Move {
            castle: true,
            ..Move::new(from, to)
        }
    }

    pub fn ep_capture(from: usize, to: usize) -> Self {
        Move {
            en_passant: true,
            ..Move::new(from, to)
        }
    }

    pub fn is_null(&self) -> bool {
        self.from == 0 && self.to == 0
    }

    /// UCI notation, e.g. "e2e4" or "e7e8q"
    pub fn uci(&self) -> String {
        let mut s = format!(
            "{}{}",
            square_name(self.from as usize),
            square_name(self.to as usize)
        );
        if let Some(c) = match self.promotion {
            QUEEN => Some('q'),
            ROOK => Some('r'),
            BISHOP => Some('b'),
            KNIGHT => Some('n'),
            _ => None,
        } {
            s.push(c);
        }
        s
    }
}

impl Default for Move {
    fn default() -> Self {
        Move::NULL
    }
}

/// State needed to take a move back
#[derive(Clone, Copy, Debug)]
pub struct Undo {
    captured: u8,
    castling_rights: u8,
    en_passant: i8,
    halfmove_clock: u16,
    hash: u64,
}

#[derive(Debug, Error)]
pub enum FenError {
    #[error("empty FEN string")]
    Empty,
    #[error("invalid piece placement character '{0}'")]
    BadPiece(char),
    #[error("invalid en passant square '{0}'")]
    BadEnPassant(String),
}

struct ZobristKeys {
    pieces: [[u64; 64]; PIECE_NB],
    side: u64,
    castling: [u64; 16],
    ep_file: [u64; 8],
}

impl ZobristKeys {
    fn new() -> Self {
        let mut rng = StdRng::seed_from_u64(0x5EED_1E55);
        let mut pieces = [[0u64; 64]; PIECE_NB];
        for piece in pieces.iter_mut() {
            for key in piece.iter_mut() {
                *key = rng.gen();
            }
        }
        let side = rng.gen();
        let mut castling = [0u64; 16];
        for key in castling.iter_mut() {
            *key = rng.gen();
        }
        let mut ep_file = [0u64; 8];
        for key in ep_file.iter_mut() {
            *key = rng.gen();
        }
        ZobristKeys {
            pieces,
            side,
            castling,
            ep_file,
        }
    }
}

static ZOBRIST: LazyLock<ZobristKeys> = LazyLock::new(ZobristKeys::new);

/// Castling rights kept when a move touches each square; moving or
/// capturing on a rook or king home square drops the matching rights.
const CASTLE_KEEP: [u8; 64] = init_castle_keep();

const fn init_castle_keep() -> [u8; 64] {
    let all = CASTLE_WK | CASTLE_WQ | CASTLE_BK | CASTLE_BQ;
    let mut keep = [all; 64];
    keep[0] = all & !CASTLE_WQ;
    keep[4] = all & !(CASTLE_WK | CASTLE_WQ);
    keep[7] = all & !CASTLE_WK;
    keep[56] = all & !CASTLE_BQ;
    keep[60] = all & !(CASTLE_BK | CASTLE_BQ);
    keep[63] = all & !CASTLE_BK;
    keep
}

/// Chess position
#[derive(Clone)]
pub struct Board {
    /// Mailbox, a1 = 0 through h8 = 63
    squares: [u8; 64],
    /// One bitboard per piece byte, kept in sync with the mailbox
    piece_bb: [u64; PIECE_NB],
    white_to_move: bool,
    castling_rights: u8,
    /// En passant target square, -1 when none
    en_passant: i8,
    halfmove_clock: u16,
    fullmove_number: u16,
    hash: u64,
    /// Hashes of every position reached in this game line, current last
    history: Vec<u64>,
}

impl Board {
    pub fn new() -> Self {
        Board::from_fen(START_FEN).unwrap_or_else(|_| Board::empty())
    }

    fn empty() -> Self {
        Board {
            squares: [EMPTY; 64],
            piece_bb: [0; PIECE_NB],
            white_to_move: true,
            castling_rights: 0,
            en_passant: -1,
            halfmove_clock: 0,
            fullmove_number: 1,
            hash: 0,
            history: Vec::new(),
        }
    }

    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        let mut parts = fen.split_whitespace();
        let placement = parts.next().ok_or(FenError::Empty)?;

        let mut board = Board::empty();

        let mut rank = 7usize;
        let mut file = 0usize;
        for c in placement.chars() {
            match c {
                '/' => {
                    rank = rank.saturating_sub(1);
                    file = 0;
                }
                '1'..='8' => file += c as usize - '0' as usize,
                _ => {
                    let piece = fen_to_piece(c).ok_or(FenError::BadPiece(c))?;
                    if file < 8 {
                        let sq = rank * 8 + file;
                        board.squares[sq] = piece;
                        board.piece_bb[piece as usize] |= 1u64 << sq;
                    }
                    file += 1;
                }
            }
        }

        if let Some(color) = parts.next() {
            board.white_to_move = color != "b";
        }

        if let Some(castling) = parts.next() {
            for c in castling.chars() {
                match c {
                    'K' => board.castling_rights |= CASTLE_WK,
                    'Q' => board.castling_rights |= CASTLE_WQ,
                    'k' => board.castling_rights |= CASTLE_BK,
                    'q' => board.castling_rights |= CASTLE_BQ,
                    _ => {}
                }
            }
        }

        if let Some(ep) = parts.next() {
            if ep != "-" {
                let sq = parse_square(ep).ok_or_else(|| FenError::BadEnPassant(ep.to_string()))?;
                board.en_passant = sq as i8;
            }
        }

        if let Some(clock) = parts.next() {
            board.halfmove_clock = clock.parse().unwrap_or(0);
        }
        if let Some(fullmove) = parts.next() {
            board.fullmove_number = fullmove.parse().unwrap_or(1);
        }

        board.hash = board.recompute_hash();
        board.history.push(board.hash);
        Ok(board)
    }

    pub fn to_fen(&self) -> String {
        let mut fen = String::new();
        for rank in (0..8).rev() {
            let mut empty_run = 0;
            for file in 0..8 {
                let piece = self.squares[rank * 8 + file];
                if piece == EMPTY {
                    empty_run += 1;
                    continue;
                }
                if empty_run > 0 {
                    fen.push_str(&empty_run.to_string());
                    empty_run = 0;
                }
                if let Some(c) = piece_to_fen(piece) {
                    fen.push(c);
                }
            }
            if empty_run > 0 {
                fen.push_str(&empty_run.to_string());
            }
            if rank > 0 {
                fen.push('/');
            }
        }

        fen.push(' ');
        fen.push(if self.white_to_move { 'w' } else { 'b' });

        fen.push(' ');
        if self.castling_rights == 0 {
            fen.push('-');
        } else {
            if self.castling_rights & CASTLE_WK != 0 {
                fen.push('K');
            }
            if self.castling_rights & CASTLE_WQ != 0 {
                fen.push('Q');
            }
            if self.castling_rights & CASTLE_BK != 0 {
                fen.push('k');
            }
            if self.castling_rights & CASTLE_BQ != 0 {
                fen.push('q');
            }
        }

        fen.push(' ');
        if self.en_passant >= 0 {
            fen.push_str(&square_name(self.en_passant as usize));
        } else {
            fen.push('-');
        }

        fen.push_str(&format!(" {} {}", self.halfmove_clock, self.fullmove_number));
        fen
    }

    #[inline]
    pub fn piece_at(&self, sq: usize) -> u8 {
        self.squares[sq]
    }

    /// Bitboard of all squares holding the given piece byte
    #[inline]
    pub fn bitboard(&self, piece: u8) -> u64 {
        self.piece_bb[piece as usize]
    }

    #[inline]
    pub fn occupancy(&self) -> u64 {
        self.piece_bb.iter().fold(0, |acc, bb| acc | bb)
    }

    pub fn color_occupancy(&self, white: bool) -> u64 {
        let mut acc = 0;
        for pt in PAWN..=KING {
            acc |= self.bitboard(make_piece(pt, white));
        }
        acc
    }

    #[inline]
    pub fn white_to_move(&self) -> bool {
        self.white_to_move
    }

    /// 64-bit content hash of the current position
    #[inline]
    pub fn hash(&self) -> u64 {
        self.hash
    }

    #[inline]
    pub fn en_passant_square(&self) -> i8 {
        self.en_passant
    }

    #[inline]
    pub fn castling_rights(&self) -> u8 {
        self.castling_rights
    }

    #[inline]
    pub fn halfmove_clock(&self) -> u16 {
        self.halfmove_clock
    }

    pub fn ply_count(&self) -> usize {
        self.history.len()
    }

    /// From-scratch hash of the current state; the incrementally maintained
    /// hash must always agree with this.
    pub fn recompute_hash(&self) -> u64 {
        let keys = &*ZOBRIST;
        let mut h = 0u64;
        for sq in 0..64 {
            let piece = self.squares[sq];
            if piece != EMPTY {
                h ^= keys.pieces[piece as usize][sq];
            }
        }
        if !self.white_to_move {
            h ^= keys.side;
        }
        h ^= keys.castling[self.castling_rights as usize];
        if self.en_passant >= 0 {
            h ^= keys.ep_file[(self.en_passant % 8) as usize];
        }
        h
    }

    /// True if this exact position occurred earlier in the game line.
    /// Only positions since the last irreversible move can match.
    pub fn is_repeated_position(&self) -> bool {
        let current = self.hash;
        self.history
            .iter()
            .rev()
            .skip(1)
            .take(self.halfmove_clock as usize)
            .any(|&h| h == current)
    }

    #[inline]
    fn put(&mut self, sq: usize, piece: u8) {
        self.squares[sq] = piece;
        self.piece_bb[piece as usize] |= 1u64 << sq;
        self.hash ^= ZOBRIST.pieces[piece as usize][sq];
    }

    #[inline]
    fn remove(&mut self, sq: usize) {
        let piece = self.squares[sq];
        self.squares[sq] = EMPTY;
        self.piece_bb[piece as usize] &= !(1u64 << sq);
        self.hash ^= ZOBRIST.pieces[piece as usize][sq];
    }

    fn shift_rook(&mut self, from: usize, to: usize) {
        let rook = self.squares[from];
        self.remove(from);
        self.put(to, rook);
    }

    /// Execute a move. Returns the record undo_move needs to take it back.
    pub fn make_move(&mut self, mv: Move) -> Undo {
        let from = mv.from as usize;
        let to = mv.to as usize;
        let piece = self.squares[from];
        let white = self.white_to_move;
        let captured = self.squares[to];

        let undo = Undo {
            captured,
            castling_rights: self.castling_rights,
            en_passant: self.en_passant,
            halfmove_clock: self.halfmove_clock,
            hash: self.hash,
        };

        let keys = &*ZOBRIST;
        if self.en_passant >= 0 {
            self.hash ^= keys.ep_file[(self.en_passant % 8) as usize];
        }
        self.hash ^= keys.castling[self.castling_rights as usize];

        if piece_type(piece) == PAWN || captured != EMPTY {
            self.halfmove_clock = 0;
        } else {
            self.halfmove_clock += 1;
        }

        if mv.en_passant {
            let cap_sq = if white { to - 8 } else { to + 8 };
            self.remove(cap_sq);
        } else if captured != EMPTY {
            self.remove(to);
        }

        self.remove(from);
        if mv.promotion != EMPTY {
            self.put(to, make_piece(mv.promotion, white));
        } else {
            self.put(to, piece);
        }

        if mv.castle {
            match to {
                6 => self.shift_rook(7, 5),
                2 => self.shift_rook(0, 3),
                62 => self.shift_rook(63, 61),
                58 => self.shift_rook(56, 59),
                _ => {}
            }
        }

        self.castling_rights &= CASTLE_KEEP[from] & CASTLE_KEEP[to];

        self.en_passant = -1;
        if piece_type(piece) == PAWN {
            let delta = to as i32 - from as i32;
            if delta == 16 || delta == -16 {
                self.en_passant = ((from + to) / 2) as i8;
            }
        }

        if self.en_passant >= 0 {
            self.hash ^= keys.ep_file[(self.en_passant % 8) as usize];
        }
        self.hash ^= keys.castling[self.castling_rights as usize];

        if !white {
            self.fullmove_number += 1;
        }
        self.white_to_move = !white;
        self.hash ^= keys.side;

        self.history.push(self.hash);
        undo
    }

    /// Take back a move made with make_move, restoring the exact prior
    /// state including the hash.
    pub fn undo_move(&mut self, mv: Move, undo: &Undo) {
        self.history.pop();
        self.white_to_move = !self.white_to_move;
        let white = self.white_to_move;

        let from = mv.from as usize;
        let to = mv.to as usize;

        let piece_on_to = self.squares[to];
        self.remove(to);
        if mv.promotion != EMPTY {
            self.put(from, make_piece(PAWN, white));
        } else {
            self.put(from, piece_on_to);
        }

        if mv.en_passant {
            let cap_sq = if white { to - 8 } else { to + 8 };
            self.put(cap_sq, make_piece(PAWN, !white));
        } else if undo.captured != EMPTY {
            self.put(to, undo.captured);
        }

        if mv.castle {
            match to {
                6 => self.shift_rook(5, 7),
                2 => self.shift_rook(3, 0),
                62 => self.shift_rook(61, 63),
                58 => self.shift_rook(59, 56),
                _ => {}
            }
        }

        self.castling_rights = undo.castling_rights;
        self.en_passant = undo.en_passant;
        self.halfmove_clock = undo.halfmove_clock;
        if !white {
            self.fullmove_number -= 1;
        }
        self.hash = undo.hash;
    }

    pub fn display(&self) -> String {
        let mut lines = Vec::new();
        lines.push("  +---+---+---+---+---+---+---+---+".to_string());
        for rank in (0..8).rev() {
            let mut row = format!("{} |", rank + 1);
            for file in 0..8 {
                let piece = self.squares[rank * 8 + file];
                match piece_to_fen(piece) {
                    Some(c) => row.push_str(&format!(" {} |", c)),
                    None => row.push_str("   |"),
                }
            }
            lines.push(row);
            lines.push("  +---+---+---+---+---+---+---+---+".to_string());
        }
        lines.push("    a   b   c   d   e   f   g   h".to_string());
        lines.join("\n")
    }
}

impl Default for Board {
    fn default() -> Self {
        Board::new()
    }
}

impl std::fmt::Display for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movegen::legal_moves;

    const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";

    #[test]
    fn fen_round_trip() {
        for fen in [START_FEN, KIWIPETE] {
            let board = Board::from_fen(fen).unwrap();
            assert_eq!(board.to_fen(), fen);
        }
    }

    #[test]
    fn from_fen_rejects_garbage_placement() {
        assert!(Board::from_fen("rnbqkbnr/ppXppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w - - 0 1").is_err());
        assert!(Board::from_fen("").is_err());
    }

    #[test]
    fn bitboards_track_mailbox() {
        let board = Board::from_fen(START_FEN).unwrap();
        assert_eq!(board.bitboard(WHITE_PAWN), 0x0000_0000_0000_FF00);
        assert_eq!(board.bitboard(BLACK_PAWN), 0x00FF_0000_0000_0000);
        assert_eq!(board.occupancy(), 0xFFFF_0000_0000_FFFF);
        assert_eq!(board.color_occupancy(true), 0x0000_0000_0000_FFFF);
    }

    #[test]
    fn make_undo_restores_exact_state() {
        let original = Board::from_fen(KIWIPETE).unwrap();
        let mut board = original.clone();
        for mv in legal_moves(&board, false) {
            let undo = board.make_move(mv);
            board.undo_move(mv, &undo);
            assert_eq!(board.to_fen(), original.to_fen(), "move {}", mv.uci());
            assert_eq!(board.hash(), original.hash(), "move {}", mv.uci());
            assert_eq!(board.ply_count(), original.ply_count(), "move {}", mv.uci());
        }
    }

    #[test]
    fn incremental_hash_matches_recompute() {
        let mut board = Board::new();
        // 1.e4 c5 2.Nf3 d6 3.d4 cxd4: double pushes, ep squares, a capture
        for uci in ["e2e4", "c7c5", "g1f3", "d7d6", "d2d4", "c5d4"] {
            let mv = find_move(&board, uci);
            board.make_move(mv);
            assert_eq!(board.hash(), board.recompute_hash(), "after {}", uci);
        }
    }

    #[test]
    fn repetition_detected_after_shuffle() {
        let mut board = Board::new();
        assert!(!board.is_repeated_position());
        for uci in ["g1f3", "g8f6", "f3g1", "f6g8"] {
            let mv = find_move(&board, uci);
            board.make_move(mv);
        }
        // back to the starting position, seen once before
        assert!(board.is_repeated_position());
    }

    #[test]
    fn pawn_move_resets_repetition_window() {
        let mut board = Board::new();
        for uci in ["g1f3", "g8f6", "f3g1", "f6g8", "e2e4"] {
            let mv = find_move(&board, uci);
            board.make_move(mv);
        }
        assert!(!board.is_repeated_position());
    }

    fn find_move(board: &Board, uci: &str) -> Move {
        legal_moves(board, false)
            .into_iter()
            .find(|m| m.uci() == uci)
            .unwrap_or_else(|| panic!("no legal move {}", uci))
    }
}
