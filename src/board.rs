//! Piece placement as twelve per-piece bitboards.
//!
//! `Board` knows nothing about whose turn it is or castling rights — that
//! state lives in [`crate::position::Position`]. It caches both king squares
//! and the total occupancy; the occupancy cache is lazily rebuilt after any
//! mutation.

use crate::fen;
use crate::types::{Bitboard, ChessError, Color, Move, PieceType, Square};
use std::sync::OnceLock;

const DARK_SQUARES: Bitboard = Bitboard(0xAA55_AA55_AA55_AA55);
const LIGHT_SQUARES: Bitboard = Bitboard(0x55AA_55AA_55AA_55AA);

/// Bitboard order used by the 96-byte binary encoding: white then black,
/// king first.
const BINARY_PIECE_ORDER: [PieceType; 6] = [
    PieceType::King,
    PieceType::Queen,
    PieceType::Rook,
    PieceType::Bishop,
    PieceType::Knight,
    PieceType::Pawn,
];

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

/// A chess board: the relationship between squares and pieces.
///
/// The twelve piece bitboards are pairwise disjoint and their union equals
/// `occupied()`. Each side normally has exactly one king; a board without a
/// king is tolerated for scaffolding positions, in which case check
/// detection reports "not in check" for the kingless side.
#[derive(Clone, Debug)]
pub struct Board {
    /// Piece bitboards: `pieces[color][piece_type]`.
    pieces: [[Bitboard; PieceType::COUNT]; 2],

    /// Cached king squares, kept current by `update`.
    white_king: Option<Square>,
    black_king: Option<Square>,

    /// Lazily computed union of all twelve bitboards.
    occupied: OnceLock<Bitboard>,
}

/// Direction for [`Board::flip`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlipDirection {
    /// Mirror ranks (White's side becomes Black's).
    UpDown,
    /// Mirror files (a-file becomes h-file).
    LeftRight,
}

impl Board {
    /// An empty board with no pieces.
    pub fn empty() -> Self {
        Board {
            pieces: [[Bitboard::EMPTY; PieceType::COUNT]; 2],
            white_king: None,
            black_king: None,
            occupied: OnceLock::new(),
        }
    }

    /// Parse the board field of a FEN string
    /// (e.g. `rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR`).
    pub fn from_fen(field: &str) -> Result<Self, ChessError> {
        fen::board_from_fen(field)
    }

    /// The FEN board field for this placement.
    pub fn to_fen(&self) -> String {
        fen::board_to_fen(self)
    }

    // -----------------------------------------------------------------------
    // Low-level mutation
    // -----------------------------------------------------------------------

    /// Place a piece on a square.
    pub(crate) fn put_piece(&mut self, sq: Square, color: Color, piece: PieceType) {
        self.pieces[color.index()][piece.index()].set(sq);
        if piece == PieceType::King {
            match color {
                Color::White => self.white_king = Some(sq),
                Color::Black => self.black_king = Some(sq),
            }
        }
        self.occupied = OnceLock::new();
    }

    /// Byte-copy this board into `other` (scratch-board reuse).
    pub(crate) fn copy_into(&self, other: &mut Board) {
        other.clone_from(self);
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// What piece (if any) is on a given square?
    pub fn piece_at(&self, sq: Square) -> Option<(Color, PieceType)> {
        let bb = Bitboard::from_square(sq);
        if (self.occupied() & bb).is_empty() {
            return None;
        }
        for color in [Color::White, Color::Black] {
            for &pt in &PieceType::ALL {
                if (self.pieces[color.index()][pt.index()] & bb).is_not_empty() {
                    return Some((color, pt));
                }
            }
        }
        None
    }

    /// Bitboard of all pieces of a given colour and type.
    #[inline]
    pub fn bb(&self, color: Color, piece: PieceType) -> Bitboard {
        self.pieces[color.index()][piece.index()]
    }

    /// Union of one side's piece bitboards.
    pub fn occupancy(&self, color: Color) -> Bitboard {
        let mut total = Bitboard::EMPTY;
        for bb in &self.pieces[color.index()] {
            total |= *bb;
        }
        total
    }

    /// Union of all piece bitboards, memoized until the next mutation.
    #[inline]
    pub fn occupied(&self) -> Bitboard {
        *self
            .occupied
            .get_or_init(|| self.occupancy(Color::White) | self.occupancy(Color::Black))
    }

    /// Whether any piece occupies `sq`.
    #[inline]
    pub fn is_occupied(&self, sq: Square) -> bool {
        self.occupied().is_set(sq)
    }

    /// Cached king square for a colour, `None` when the king is absent.
    #[inline]
    pub fn king_sq(&self, color: Color) -> Option<Square> {
        match color {
            Color::White => self.white_king,
            Color::Black => self.black_king,
        }
    }

    // -----------------------------------------------------------------------
    // Move application
    // -----------------------------------------------------------------------

    /// Apply a move to the board in place.
    ///
    /// The steps are ordered so captures, promotions, en passant, and the
    /// castling rook displacement compose: clear the destination (capture),
    /// shift the mover, swap in the promotion piece, remove the en-passant
    /// victim, then move the castling rook.
    pub(crate) fn update(&mut self, m: &Move) {
        let Some((color, piece)) = self.piece_at(m.from) else {
            debug_assert!(false, "update: no piece on {}", m.from);
            return;
        };
        let from_bb = Bitboard::from_square(m.from);
        let to_bb = Bitboard::from_square(m.to);

        // Remove whatever was on the destination square.
        for side in &mut self.pieces {
            for pieces in side.iter_mut() {
                *pieces &= !to_bb;
            }
        }

        // Move the piece.
        let mover = &mut self.pieces[color.index()][piece.index()];
        *mover = (*mover & !from_bb) | to_bb;

        // Promotion: the pawn that just landed becomes the chosen piece.
        if let Some(promo) = m.promotion {
            self.pieces[color.index()][piece.index()] &= !to_bb;
            self.pieces[color.index()][promo.index()] |= to_bb;
        }

        // En passant: the captured pawn sits one rank behind the destination.
        if m.flags.is_en_passant() {
            match color {
                Color::White => {
                    self.pieces[Color::Black.index()][PieceType::Pawn.index()] &= !(to_bb >> 8);
                }
                Color::Black => {
                    self.pieces[Color::White.index()][PieceType::Pawn.index()] &= !(to_bb << 8);
                }
            }
        }

        // Castling: displace the rook on the mover's back rank.
        if m.flags.is_king_side_castle() || m.flags.is_queen_side_castle() {
            let (rook_from, rook_to) = match (color, m.flags.is_king_side_castle()) {
                (Color::White, true) => (Square::H1, Square::F1),
                (Color::White, false) => (Square::A1, Square::D1),
                (Color::Black, true) => (Square::H8, Square::F8),
                (Color::Black, false) => (Square::A8, Square::D8),
            };
            let rooks = &mut self.pieces[color.index()][PieceType::Rook.index()];
            *rooks = (*rooks & !Bitboard::from_square(rook_from)) | Bitboard::from_square(rook_to);
        }

        // Keep the king-square cache current.
        if self.white_king == Some(m.from) {
            self.white_king = Some(m.to);
        } else if self.black_king == Some(m.from) {
            self.black_king = Some(m.to);
        }

        self.occupied = OnceLock::new();
    }

    pub(crate) fn recompute_kings(&mut self) {
        self.white_king = self.bb(Color::White, PieceType::King).lsb();
        self.black_king = self.bb(Color::Black, PieceType::King).lsb();
    }

    // -----------------------------------------------------------------------
    // Insufficient material
    // -----------------------------------------------------------------------

    /// Whether either side still has mating material.
    ///
    /// Returns `false` for K vs K, K+B vs K, K+N vs K, and positions where
    /// all remaining bishops stand on same-coloured squares with no other
    /// material. Any queen, rook, or pawn is always sufficient.
    pub fn has_sufficient_material(&self) -> bool {
        let heavy = self.bb(Color::White, PieceType::Queen)
            | self.bb(Color::White, PieceType::Rook)
            | self.bb(Color::White, PieceType::Pawn)
            | self.bb(Color::Black, PieceType::Queen)
            | self.bb(Color::Black, PieceType::Rook)
            | self.bb(Color::Black, PieceType::Pawn);
        if heavy.is_not_empty() {
            return true;
        }

        // A board without both kings is a scaffolding position.
        if self.white_king.is_none() || self.black_king.is_none() {
            return true;
        }

        let bishops = self.bb(Color::White, PieceType::Bishop) | self.bb(Color::Black, PieceType::Bishop);
        let knights = self.bb(Color::White, PieceType::Knight) | self.bb(Color::Black, PieceType::Knight);
        let bishop_count = bishops.pop_count();
        let knight_count = knights.pop_count();

        if bishop_count == 0 && knight_count == 0 {
            return false;
        }
        if bishop_count + knight_count == 1 {
            return false;
        }
        if knight_count == 0 {
            let light = (bishops & LIGHT_SQUARES).pop_count();
            let dark = (bishops & DARK_SQUARES).pop_count();
            if light == 0 || dark == 0 {
                return false;
            }
        }
        true
    }

    // -----------------------------------------------------------------------
    // Binary codec (96 bytes)
    // -----------------------------------------------------------------------

    /// Encode the twelve bitboards as 96 big-endian bytes, white pieces
    /// first, king → pawn within each colour.
    pub fn to_bytes(&self) -> [u8; 96] {
        let mut out = [0u8; 96];
        let mut offset = 0;
        for color in [Color::White, Color::Black] {
            for pt in BINARY_PIECE_ORDER {
                out[offset..offset + 8].copy_from_slice(&self.bb(color, pt).0.to_be_bytes());
                offset += 8;
            }
        }
        out
    }

    /// Decode a board from the 96-byte encoding produced by [`Board::to_bytes`].
    pub fn from_bytes(data: &[u8]) -> Result<Self, ChessError> {
        if data.len() != 96 {
            return Err(ChessError::InvalidBinary(format!(
                "board encoding must be 96 bytes, got {}",
                data.len()
            )));
        }
        let mut board = Board::empty();
        let mut offset = 0;
        for color in [Color::White, Color::Black] {
            for pt in BINARY_PIECE_ORDER {
                let word = u64::from_be_bytes(data[offset..offset + 8].try_into().unwrap());
                board.pieces[color.index()][pt.index()] = Bitboard(word);
                offset += 8;
            }
        }
        board.recompute_kings();
        Ok(board)
    }

    // -----------------------------------------------------------------------
    // Whole-board transforms
    // -----------------------------------------------------------------------

    /// Mirror the board over its horizontal or vertical centre line.
    pub fn flip(&self, dir: FlipDirection) -> Board {
        self.remap(|sq| match dir {
            FlipDirection::UpDown => Square::from_file_rank(sq.file(), 7 - sq.rank()),
            FlipDirection::LeftRight => Square::from_file_rank(7 - sq.file(), sq.rank()),
        })
    }

    /// Mirror the board over the a8-h1 diagonal.
    pub fn transpose(&self) -> Board {
        self.remap(|sq| Square::from_file_rank(7 - sq.rank(), 7 - sq.file()))
    }

    /// Rotate the board 90 degrees clockwise.
    pub fn rotate(&self) -> Board {
        self.flip(FlipDirection::UpDown).transpose()
    }

    fn remap(&self, f: impl Fn(Square) -> Square) -> Board {
        let mut out = Board::empty();
        for color in [Color::White, Color::Black] {
            for &pt in &PieceType::ALL {
                for sq in self.bb(color, pt).iter() {
                    out.pieces[color.index()][pt.index()].set(f(sq));
                }
            }
        }
        out.recompute_kings();
        out
    }
}

impl PartialEq for Board {
    fn eq(&self, other: &Self) -> bool {
        self.pieces == other.pieces
    }
}

impl Eq for Board {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
