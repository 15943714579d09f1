//! Chess move generation, notation, and PGN streaming.
//!
//! The core of the crate is a bitboard-based legal move generator
//! ([`Position::valid_moves`]) and codecs between moves and the three common
//! textual notations (SAN, long algebraic, UCI). On top of that sit
//! [`Game`] (move history, outcome, draw claims) and a streaming
//! [`Scanner`] that slices concatenated PGN databases into games, with a
//! work-stealing [`ParallelScanner`] variant for large files.
//!
//! ```
//! use chesskit::Game;
//!
//! let mut game = Game::new();
//! game.make_move_str("e4").unwrap();
//! game.make_move_str("e5").unwrap();
//! assert_eq!(game.position().to_fen(),
//!     "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq e6 0 2");
//! ```

pub mod attacks;
pub mod board;
pub mod fen;
pub mod game;
pub mod movegen;
pub mod notation;
pub mod pgn;
pub mod position;
mod san;
pub mod scanner;
pub mod types;

pub use board::Board;
pub use game::{Game, TagPair};
pub use movegen::legal_moves;
pub use notation::Notation;
pub use position::Position;
pub use scanner::{ParallelScanner, Scanner};
pub use types::*;
