//! GraniteChess - UCI Protocol Module
//!
//! Universal Chess Interface front-end. Reads commands from stdin, drives
//! the search, and prints protocol responses on stdout; diagnostics go
//! through the log facade so stdout stays clean for the GUI.

use std::io::{self, BufRead, Write};

use log::warn;

use crate::board::{Board, Move};
use crate::movegen::{in_check, legal_moves, perft};
use crate::search::{SearchEngine, MAX_DEPTH};
use crate::time::TurnClock;
use crate::types::*;

const ENGINE_NAME: &str = "GraniteChess";
const ENGINE_AUTHOR: &str = "the GraniteChess authors";
const ENGINE_VERSION: &str = "0.3";

/// Analysis depth used for `go infinite`; the search loop is synchronous,
/// so an unbounded request still has to terminate on its own.
const ANALYSIS_DEPTH: i32 = 30;

/// UCI option representation
#[derive(Clone)]
pub struct UciOption {
    pub name: String,
    pub opt_type: String,
    pub default: String,
    pub value: String,
    pub min: Option<i32>,
    pub max: Option<i32>,
}

impl UciOption {
    pub fn spin(name: &str, default: i32, min: i32, max: i32) -> Self {
        UciOption {
            name: name.to_string(),
            opt_type: "spin".to_string(),
            default: default.to_string(),
            value: default.to_string(),
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn check(name: &str, default: bool) -> Self {
        UciOption {
            name: name.to_string(),
            opt_type: "check".to_string(),
            default: default.to_string(),
            value: default.to_string(),
            min: None,
            max: None,
        }
    }

    pub fn button(name: &str) -> Self {
        UciOption {
            name: name.to_string(),
            opt_type: "button".to_string(),
            default: String::new(),
            value: String::new(),
            min: None,
            max: None,
        }
    }

    pub fn to_uci_string(&self) -> String {
        let mut s = format!("option name {} type {}", self.name, self.opt_type);
        match self.opt_type.as_str() {
            "spin" => s.push_str(&format!(
                " default {} min {} max {}",
                self.default,
                self.min.unwrap_or(0),
                self.max.unwrap_or(1)
            )),
            "check" => s.push_str(&format!(" default {}", self.default)),
            _ => {}
        }
        s
    }

    pub fn set_value(&mut self, value_str: &str) -> bool {
        match self.opt_type.as_str() {
            "spin" => {
                if let Ok(val) = value_str.parse::<i32>() {
                    if let (Some(min), Some(max)) = (self.min, self.max) {
                        if (min..=max).contains(&val) {
                            self.value = val.to_string();
                            return true;
                        }
                    }
                }
                false
            }
            "check" => {
                self.value = (value_str.eq_ignore_ascii_case("true")).to_string();
                true
            }
            _ => false,
        }
    }

    pub fn get_int(&self) -> i32 {
        self.value.parse().unwrap_or(0)
    }

    pub fn get_bool(&self) -> bool {
        self.value == "true"
    }
}

/// UCI session state
pub struct Uci {
    board: Board,
    engine: SearchEngine,
    running: bool,
    options: Vec<UciOption>,
}

impl Uci {
    pub fn new() -> Self {
        let mut uci = Uci {
            board: Board::new(),
            engine: SearchEngine::new(64),
            running: true,
            options: Vec::new(),
        };
        uci.init_options();
        uci
    }

    fn init_options(&mut self) {
        self.options = vec![
            UciOption::spin("Hash", 64, 1, 1024),
            UciOption::spin("Depth", 10, 1, MAX_DEPTH),
            UciOption::check("UseTranspositionTable", true),
            UciOption::button("Clear Hash"),
        ];
    }

    fn option_int(&self, name: &str) -> i32 {
        self.options
            .iter()
            .find(|o| o.name == name)
            .map(|o| o.get_int())
            .unwrap_or(0)
    }

    pub fn run(&mut self) {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let line = line.trim();
            if !line.is_empty() {
                self.process_command(line);
            }
            if !self.running {
                break;
            }
        }
    }

    pub fn process_command(&mut self, line: &str) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(&command) = parts.first() else {
            return;
        };
        let args = &parts[1..];

        match command {
            "uci" => self.cmd_uci(),
            "isready" => self.send("readyok"),
            "setoption" => self.cmd_setoption(args),
            "ucinewgame" => self.cmd_ucinewgame(),
            "position" => self.cmd_position(args),
            "go" => self.cmd_go(args),
            "stop" => {} // the search is synchronous; nothing is running here
            "quit" => self.running = false,
            "d" => self.cmd_display(),
            "perft" => self.cmd_perft(args),
            "bench" => self.cmd_bench(),
            _ => warn!("unknown command: {}", command),
        }
    }

    fn send(&self, message: &str) {
        println!("{}", message);
        io::stdout().flush().ok();
    }

    fn cmd_uci(&self) {
        self.send(&format!("id name {} {}", ENGINE_NAME, ENGINE_VERSION));
        self.send(&format!("id author {}", ENGINE_AUTHOR));
        for option in &self.options {
            self.send(&option.to_uci_string());
        }
        self.send("uciok");
    }

    fn cmd_setoption(&mut self, args: &[&str]) {
        if args.len() < 2 || args[0] != "name" {
            return;
        }

        let mut name_parts = Vec::new();
        let mut value_str: Option<String> = None;
        let mut i = 1;
        while i < args.len() {
            if args[i] == "value" {
                value_str = Some(args[i + 1..].join(" "));
                break;
            }
            name_parts.push(args[i]);
            i += 1;
        }
        let name = name_parts.join(" ");

        if name == "Clear Hash" {
            self.engine.clear_tt();
            return;
        }

        let mut changed = false;
        for opt in &mut self.options {
            if opt.name == name {
                if let Some(ref val) = value_str {
                    changed = opt.set_value(val);
                }
                break;
            }
        }
        if !changed {
            warn!("setoption ignored: {}", name);
            return;
        }

        match name.as_str() {
            "Hash" => {
                let mb = self.option_int("Hash") as usize;
                self.engine = SearchEngine::new(mb);
            }
            "UseTranspositionTable" => {
                self.engine.use_tt = self
                    .options
                    .iter()
                    .find(|o| o.name == "UseTranspositionTable")
                    .map(|o| o.get_bool())
                    .unwrap_or(true);
            }
            _ => {}
        }
    }

    fn cmd_ucinewgame(&mut self) {
        self.board = Board::new();
        self.engine.clear_tt();
    }

    fn cmd_position(&mut self, args: &[&str]) {
        let Some(&kind) = args.first() else { return };

        let mut moves_index = None;
        if kind == "startpos" {
            self.board = Board::new();
            if args.get(1) == Some(&"moves") {
                moves_index = Some(2);
            }
        } else if kind == "fen" {
            let mut i = 1;
            let mut fen_parts = Vec::new();
            while i < args.len() && args[i] != "moves" {
                fen_parts.push(args[i]);
                i += 1;
            }
            match Board::from_fen(&fen_parts.join(" ")) {
                Ok(board) => self.board = board,
                Err(err) => {
                    warn!("position rejected: {}", err);
                    return;
                }
            }
            if args.get(i) == Some(&"moves") {
                moves_index = Some(i + 1);
            }
        }

        if let Some(idx) = moves_index {
            for move_str in &args[idx..] {
                match self.parse_move(move_str) {
                    Some(mv) => {
                        self.board.make_move(mv);
                    }
                    None => {
                        warn!("illegal move in position command: {}", move_str);
                        return;
                    }
                }
            }
        }
    }

    fn parse_move(&self, move_str: &str) -> Option<Move> {
        if move_str.len() < 4 {
            return None;
        }
        let from = parse_square(&move_str[0..2])?;
        let to = parse_square(&move_str[2..4])?;
        let promotion = match move_str.as_bytes().get(4) {
            Some(b'q') | Some(b'Q') => QUEEN,
            Some(b'r') | Some(b'R') => ROOK,
            Some(b'b') | Some(b'B') => BISHOP,
            Some(b'n') | Some(b'N') => KNIGHT,
            _ => EMPTY,
        };

        legal_moves(&self.board, false).into_iter().find(|mv| {
            mv.from as usize == from && mv.to as usize == to && mv.promotion == promotion
        })
    }

    fn cmd_go(&mut self, args: &[&str]) {
        let mut depth: Option<i32> = None;
        let mut move_time: Option<u64> = None;
        let mut wtime: Option<u64> = None;
        let mut btime: Option<u64> = None;
        let mut infinite = false;

        let mut i = 0;
        while i < args.len() {
            let value = args.get(i + 1);
            match args[i] {
                "depth" => {
                    depth = value.and_then(|v| v.parse().ok());
                    i += 2;
                }
                "movetime" => {
                    move_time = value.and_then(|v| v.parse().ok());
                    i += 2;
                }
                "wtime" => {
                    wtime = value.and_then(|v| v.parse().ok());
                    i += 2;
                }
                "btime" => {
                    btime = value.and_then(|v| v.parse().ok());
                    i += 2;
                }
                "winc" | "binc" | "movestogo" | "nodes" | "mate" => i += 2,
                "infinite" => {
                    infinite = true;
                    i += 1;
                }
                _ => i += 1,
            }
        }

        let remaining = if self.board.white_to_move() {
            wtime
        } else {
            btime
        };

        // the turn budget is sampled here, once, before the search starts
        let (clock, depth_limit) = if let Some(d) = depth {
            (TurnClock::infinite(), d)
        } else if let Some(ms) = move_time {
            (TurnClock::for_move_time(ms), MAX_DEPTH)
        } else if let Some(ms) = remaining {
            (TurnClock::from_remaining(ms), MAX_DEPTH)
        } else if infinite {
            (TurnClock::infinite(), ANALYSIS_DEPTH)
        } else {
            (TurnClock::infinite(), self.option_int("Depth"))
        };

        let report = |depth: i32, score: i32, nodes: u64, time_ms: u64, mv: Move| {
            let nps = if time_ms > 0 { nodes * 1000 / time_ms } else { 0 };
            println!(
                "info depth {} score cp {} nodes {} time {} nps {} pv {}",
                depth,
                score,
                nodes,
                time_ms,
                nps,
                mv.uci()
            );
            io::stdout().flush().ok();
        };

        let (best_move, _score) =
            self.engine
                .think(&mut self.board, &clock, depth_limit, Some(report));
        log::debug!("hashfull {}", self.engine.tt_hashfull());

        if !best_move.is_null() {
            self.send(&format!("bestmove {}", best_move.uci()));
        } else {
            // always answer with something actionable when a move exists
            let fallback = legal_moves(&self.board, false);
            match fallback.first() {
                Some(mv) => self.send(&format!("bestmove {}", mv.uci())),
                None => self.send("bestmove 0000"),
            }
        }
    }

    fn cmd_display(&self) {
        self.send(&self.board.display());
        self.send(&format!("FEN: {}", self.board.to_fen()));
        self.send(&format!("Hash: {:016x}", self.board.hash()));
        self.send(&format!("In check: {}", in_check(&self.board)));
        self.send(&format!(
            "Legal moves: {}",
            legal_moves(&self.board, false).len()
        ));
    }

    fn cmd_perft(&self, args: &[&str]) {
        let depth = args
            .first()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(1);
        let mut board = self.board.clone();
        let start = std::time::Instant::now();
        let nodes = perft(&mut board, depth);
        self.send(&format!(
            "Nodes: {} ({} ms)",
            nodes,
            start.elapsed().as_millis()
        ));
    }

    fn cmd_bench(&mut self) {
        let positions = [
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        ];

        let mut total_nodes = 0u64;
        let start = std::time::Instant::now();

        for fen in positions {
            let Ok(mut board) = Board::from_fen(fen) else {
                continue;
            };
            self.engine.clear_tt();
            let clock = TurnClock::infinite();
            self.engine
                .think::<fn(i32, i32, u64, u64, Move)>(&mut board, &clock, 4, None);
            total_nodes += self.engine.nodes;
        }

        let secs = start.elapsed().as_secs_f64();
        let nps = if secs > 0.0 {
            (total_nodes as f64 / secs) as u64
        } else {
            0
        };
        self.send(&format!(
            "info string bench: {} nodes in {:.2}s ({} nps)",
            total_nodes, secs, nps
        ));
    }
}

impl Default for Uci {
    fn default() -> Self {
        Uci::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_command_applies_moves() {
        let mut uci = Uci::new();
        uci.process_command("position startpos moves e2e4 e7e5 g1f3");
        assert_eq!(
            uci.board.to_fen(),
            "rnbqkbnr/pppp1ppp/8/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R b KQkq - 1 2"
        );
    }

    #[test]
    fn position_command_accepts_fen() {
        let fen = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
        let mut uci = Uci::new();
        uci.process_command(&format!("position fen {}", fen));
        assert_eq!(uci.board.to_fen(), fen);
    }

    #[test]
    fn parse_move_distinguishes_promotions() {
        let mut uci = Uci::new();
        uci.process_command("position fen 8/4P3/8/8/8/8/8/k1K5 w - - 0 1");
        let mv = uci.parse_move("e7e8q").unwrap();
        assert_eq!(mv.promotion, QUEEN);
        let mv = uci.parse_move("e7e8n").unwrap();
        assert_eq!(mv.promotion, KNIGHT);
    }
}
