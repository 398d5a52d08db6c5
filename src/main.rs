//! GraniteChess - UCI Chess Engine
//!
//! Reads UCI commands from stdin and writes responses to stdout, so the
//! engine works with any UCI GUI. Diagnostics go to stderr through
//! env_logger; set RUST_LOG=debug for search statistics.

use granite_chess::uci::Uci;

fn main() {
    env_logger::init();
    Uci::new().run();
}
