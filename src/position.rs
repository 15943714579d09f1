//! Game state without regard to outcome: board, side to move, castling
//! rights, en-passant target, and the two clocks.
//!
//! Positions are immutable once constructed — [`Position::update`] returns
//! the successor position rather than mutating in place. The legal-move
//! list is computed lazily and memoized per position.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use md5::{Digest, Md5};

use crate::attacks::{RANK_2, RANK_4, RANK_5, RANK_7};
use crate::board::Board;
use crate::fen;
use crate::movegen;
use crate::types::{
    Bitboard, CastlingRights, ChessError, Color, Method, Move, PieceType, Square,
};

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// A complete chess position, translatable to and from FEN.
#[derive(Clone, Debug)]
pub struct Position {
    board: Board,
    turn: Color,
    castle_rights: CastlingRights,
    en_passant: Option<Square>,
    halfmove_clock: u32,
    fullmove_number: u32,
    in_check: bool,
    valid_moves: OnceLock<Vec<Move>>,
}

impl Position {
    /// Build a position with fresh clocks (half-move 0, full-move 1).
    pub fn new(
        board: Board,
        turn: Color,
        castle_rights: CastlingRights,
        en_passant: Option<Square>,
    ) -> Self {
        Self::at_time(board, turn, castle_rights, en_passant, 0, 1)
    }

    /// Build a position with explicit clock values.
    pub fn at_time(
        board: Board,
        turn: Color,
        castle_rights: CastlingRights,
        en_passant: Option<Square>,
        halfmove_clock: u32,
        fullmove_number: u32,
    ) -> Self {
        let in_check = movegen::is_in_check(&board, turn);
        Position {
            board,
            turn,
            castle_rights,
            en_passant,
            halfmove_clock,
            fullmove_number,
            in_check,
            valid_moves: OnceLock::new(),
        }
    }

    /// The standard starting position.
    pub fn starting() -> Self {
        Self::from_fen(fen::STARTING_FEN).expect("starting FEN is always valid")
    }

    /// Parse a six-field FEN record.
    pub fn from_fen(fen_str: &str) -> Result<Self, ChessError> {
        fen::decode_fen(fen_str)
    }

    /// The FEN record for this position.
    pub fn to_fen(&self) -> String {
        fen::encode_fen(self)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The piece placement.
    #[inline]
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// The colour to move next.
    #[inline]
    pub fn turn(&self) -> Color {
        self.turn
    }

    #[inline]
    pub fn castle_rights(&self) -> CastlingRights {
        self.castle_rights
    }

    /// The en-passant target square, set only for the ply immediately after
    /// a double pawn push.
    #[inline]
    pub fn en_passant_square(&self) -> Option<Square> {
        self.en_passant
    }

    #[inline]
    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    #[inline]
    pub fn fullmove_number(&self) -> u32 {
        self.fullmove_number
    }

    /// Whether the side to move is in check.
    #[inline]
    pub fn in_check(&self) -> bool {
        self.in_check
    }

    // -----------------------------------------------------------------------
    // Successor construction
    // -----------------------------------------------------------------------

    /// Return the position resulting from the given move.
    ///
    /// The move itself isn't validated; callers that need validation go
    /// through [`crate::game::Game::make_move`], which matches against the
    /// legal-move list first. The successor's check state is taken from the
    /// move's `CHECK` tag, so the move should come from the generator or a
    /// notation decoder.
    pub fn update(&self, m: &Move) -> Position {
        let mut fullmove_number = self.fullmove_number;
        if self.turn == Color::Black {
            fullmove_number += 1;
        }

        let castle_rights = self.updated_castle_rights(m);
        let piece = self.board.piece_at(m.from).map(|(_, pt)| pt);
        let halfmove_clock = if piece == Some(PieceType::Pawn)
            || m.flags.is_capture()
            || castle_rights != self.castle_rights
        {
            0
        } else {
            self.halfmove_clock + 1
        };

        let en_passant = self.updated_en_passant(m);

        let mut board = self.board.clone();
        board.update(m);

        Position {
            board,
            turn: !self.turn,
            castle_rights,
            en_passant,
            halfmove_clock,
            fullmove_number,
            in_check: m.flags.is_check(),
            valid_moves: OnceLock::new(),
        }
    }

    /// Strip castling rights for moves that touch a king or rook home square
    /// (covering rook captures as well as rook moves).
    fn updated_castle_rights(&self, m: &Move) -> CastlingRights {
        let mut rights = self.castle_rights;
        rights.0 &= CASTLING_MASK[m.from.0 as usize];
        rights.0 &= CASTLING_MASK[m.to.0 as usize];
        rights
    }

    /// The square passed over by a double pawn push, if this move is one.
    fn updated_en_passant(&self, m: &Move) -> Option<Square> {
        if self.board.piece_at(m.from).map(|(_, pt)| pt) != Some(PieceType::Pawn) {
            return None;
        }
        let from_bb = Bitboard::from_square(m.from);
        let to_bb = Bitboard::from_square(m.to);
        match self.turn {
            Color::White if (from_bb & RANK_2).is_not_empty() && (to_bb & RANK_4).is_not_empty() => {
                Some(Square(m.to.0 - 8))
            }
            Color::Black if (from_bb & RANK_7).is_not_empty() && (to_bb & RANK_5).is_not_empty() => {
                Some(Square(m.to.0 + 8))
            }
            _ => None,
        }
    }

    // -----------------------------------------------------------------------
    // Legal moves and status
    // -----------------------------------------------------------------------

    /// All legal moves in this position (defensive copy of the cached list).
    pub fn valid_moves(&self) -> Vec<Move> {
        self.moves_cached().to_vec()
    }

    /// Cached legal-move list, computed on first use.
    pub(crate) fn moves_cached(&self) -> &[Move] {
        self.valid_moves
            .get_or_init(|| movegen::calc_moves(self, false))
    }

    /// Terminal-state detection: `Checkmate` when in check with no legal
    /// move, `Stalemate` when not in check with no legal move, `NoMethod`
    /// otherwise.
    pub fn status(&self) -> Method {
        let has_move = match self.valid_moves.get() {
            Some(moves) => !moves.is_empty(),
            None => !movegen::calc_moves(self, true).is_empty(),
        };
        if !self.in_check && !has_move {
            Method::Stalemate
        } else if self.in_check && !has_move {
            Method::Checkmate
        } else {
            Method::NoMethod
        }
    }

    /// The threefold-repetition predicate: board, turn, castling rights and
    /// en-passant square must match; the clocks are deliberately ignored.
    pub fn same_position(&self, other: &Position) -> bool {
        self.board == other.board
            && self.turn == other.turn
            && self.castle_rights == other.castle_rights
            && self.en_passant == other.en_passant
    }

    // -----------------------------------------------------------------------
    // Binary codec (101 bytes) and hash
    // -----------------------------------------------------------------------

    /// Encode the position as 101 bytes: the 96-byte board, half-move clock,
    /// big-endian full-move count, en-passant square, and a flag byte
    /// (castling rights in bits 0-3, side-to-move in bit 4, has-en-passant
    /// in bit 5).
    pub fn to_bytes(&self) -> [u8; 101] {
        let mut out = [0u8; 101];
        out[..96].copy_from_slice(&self.board.to_bytes());
        out[96] = self.halfmove_clock as u8;
        out[97..99].copy_from_slice(&(self.fullmove_number as u16).to_be_bytes());
        out[99] = self.en_passant.map(|sq| sq.0).unwrap_or(0xFF);

        let mut flags = self.castle_rights.0 & 0b1111;
        if self.turn == Color::Black {
            flags |= 1 << 4;
        }
        if self.en_passant.is_some() {
            flags |= 1 << 5;
        }
        out[100] = flags;
        out
    }

    /// Decode a position from the 101-byte encoding of [`Position::to_bytes`].
    pub fn from_bytes(data: &[u8]) -> Result<Self, ChessError> {
        if data.len() != 101 {
            return Err(ChessError::InvalidBinary(format!(
                "position encoding must be 101 bytes, got {}",
                data.len()
            )));
        }
        let board = Board::from_bytes(&data[..96])?;
        let halfmove_clock = data[96] as u32;
        let fullmove_number = u16::from_be_bytes([data[97], data[98]]) as u32;
        let flags = data[100];

        let castle_rights = CastlingRights(flags & 0b1111);
        let turn = if flags & (1 << 4) != 0 {
            Color::Black
        } else {
            Color::White
        };
        let en_passant = if flags & (1 << 5) != 0 {
            if data[99] >= 64 {
                return Err(ChessError::InvalidBinary(format!(
                    "en-passant square {} out of range",
                    data[99]
                )));
            }
            Some(Square(data[99]))
        } else {
            None
        };

        Ok(Position::at_time(
            board,
            turn,
            castle_rights,
            en_passant,
            halfmove_clock,
            fullmove_number,
        ))
    }

    /// MD5 digest of the 101-byte binary encoding — a compact identity for
    /// the position, clocks included.
    pub fn hash(&self) -> [u8; 16] {
        let mut hasher = Md5::new();
        hasher.update(self.to_bytes());
        hasher.finalize().into()
    }
}

/// Mask table indexed by square. When a move touches a square, AND the
/// castling rights with this mask: a rook home square strips that side's
/// right, the king home square strips both.
#[rustfmt::skip]
const CASTLING_MASK: [u8; 64] = {
    let mut mask = [0b1111u8; 64];
    mask[0]  = 0b1111 & !CastlingRights::WHITE_QUEENSIDE;
    mask[4]  = 0b1111 & !(CastlingRights::WHITE_KINGSIDE | CastlingRights::WHITE_QUEENSIDE);
    mask[7]  = 0b1111 & !CastlingRights::WHITE_KINGSIDE;
    mask[56] = 0b1111 & !CastlingRights::BLACK_QUEENSIDE;
    mask[60] = 0b1111 & !(CastlingRights::BLACK_KINGSIDE | CastlingRights::BLACK_QUEENSIDE);
    mask[63] = 0b1111 & !CastlingRights::BLACK_KINGSIDE;
    mask
};

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.same_position(other)
            && self.halfmove_clock == other.halfmove_clock
            && self.fullmove_number == other.fullmove_number
    }
}

impl Eq for Position {}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_fen())
    }
}

impl FromStr for Position {
    type Err = ChessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Position::from_fen(s)
    }
}

impl serde::Serialize for Position {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_fen())
    }
}

impl<'de> serde::Deserialize<'de> for Position {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        Position::from_fen(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
