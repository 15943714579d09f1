//! Pre-computed move tables and the sliding-piece attack kernel.
//!
//! Leaper tables (knight, king) and the per-square diagonal masks are
//! initialised once (via `OnceLock`) and live for the lifetime of the
//! process. Sliding attacks are computed on the fly from the blocker set
//! with the "o^(o-2r)" subtraction trick applied along a line mask in both
//! directions — the reverse direction reuses the same subtraction on the
//! bit-reversed operands.

use crate::types::{Bitboard, PieceType, Square};
use std::sync::OnceLock;

// =========================================================================
// File and rank masks
// =========================================================================

pub const FILE_A: Bitboard = Bitboard(0x0101_0101_0101_0101);
pub const FILE_H: Bitboard = Bitboard(0x8080_8080_8080_8080);

pub const RANK_1: Bitboard = Bitboard(0x0000_0000_0000_00FF);
pub const RANK_2: Bitboard = Bitboard(0x0000_0000_0000_FF00);
pub const RANK_3: Bitboard = Bitboard(0x0000_0000_00FF_0000);
pub const RANK_4: Bitboard = Bitboard(0x0000_0000_FF00_0000);
pub const RANK_5: Bitboard = Bitboard(0x0000_00FF_0000_0000);
pub const RANK_6: Bitboard = Bitboard(0x0000_FF00_0000_0000);
pub const RANK_7: Bitboard = Bitboard(0x00FF_0000_0000_0000);
pub const RANK_8: Bitboard = Bitboard(0xFF00_0000_0000_0000);

/// Full-file masks indexed by file (a=0 .. h=7).
pub const FILES: [Bitboard; 8] = {
    let mut files = [Bitboard(0); 8];
    let mut f = 0;
    while f < 8 {
        files[f] = Bitboard(FILE_A.0 << f);
        f += 1;
    }
    files
};

/// Full-rank masks indexed by rank (1st=0 .. 8th=7).
pub const RANKS: [Bitboard; 8] = {
    let mut ranks = [Bitboard(0); 8];
    let mut r = 0;
    while r < 8 {
        ranks[r] = Bitboard(RANK_1.0 << (r * 8));
        r += 1;
    }
    ranks
};

// =========================================================================
// Public API
// =========================================================================

/// Get a reference to the global move tables.
pub fn tables() -> &'static MoveTables {
    static TABLES: OnceLock<MoveTables> = OnceLock::new();
    TABLES.get_or_init(MoveTables::init)
}

/// Pre-computed per-square tables.
pub struct MoveTables {
    pub knight: [Bitboard; 64],
    pub king: [Bitboard; 64],
    /// Full a1-h8-direction diagonal through each square (own square included).
    pub diagonals: [Bitboard; 64],
    /// Full a8-h1-direction diagonal through each square (own square included).
    pub anti_diagonals: [Bitboard; 64],
}

impl MoveTables {
    /// Knight moves from a square.
    #[inline]
    pub fn knight_moves(&self, sq: Square) -> Bitboard {
        self.knight[sq.0 as usize]
    }

    /// King moves from a square (castling excluded).
    #[inline]
    pub fn king_moves(&self, sq: Square) -> Bitboard {
        self.king[sq.0 as usize]
    }

    fn init() -> Self {
        MoveTables {
            knight: init_leaper(&[
                (-2, -1),
                (-2, 1),
                (-1, -2),
                (-1, 2),
                (1, -2),
                (1, 2),
                (2, -1),
                (2, 1),
            ]),
            king: init_leaper(&[
                (-1, -1),
                (-1, 0),
                (-1, 1),
                (0, -1),
                (0, 1),
                (1, -1),
                (1, 0),
                (1, 1),
            ]),
            diagonals: init_line(1, 1),
            anti_diagonals: init_line(1, -1),
        }
    }
}

// =========================================================================
// Table initialisation
// =========================================================================

fn init_leaper(offsets: &[(i8, i8)]) -> [Bitboard; 64] {
    let mut table = [Bitboard::EMPTY; 64];
    for sq in 0..64u8 {
        let file = (sq & 7) as i8;
        let rank = (sq >> 3) as i8;
        let mut bb = 0u64;
        for &(dr, df) in offsets {
            let r = rank + dr;
            let f = file + df;
            if (0..8).contains(&r) && (0..8).contains(&f) {
                bb |= 1u64 << (r * 8 + f);
            }
        }
        table[sq as usize] = Bitboard(bb);
    }
    table
}

/// Walk `(dr, df)` and its negation from each square to build the full line
/// through that square, own square included.
fn init_line(dr: i8, df: i8) -> [Bitboard; 64] {
    let mut table = [Bitboard::EMPTY; 64];
    for sq in 0..64u8 {
        let file = (sq & 7) as i8;
        let rank = (sq >> 3) as i8;
        let mut bb = 1u64 << sq;
        for dir in [1i8, -1] {
            let mut r = rank + dr * dir;
            let mut f = file + df * dir;
            while (0..8).contains(&r) && (0..8).contains(&f) {
                bb |= 1u64 << (r * 8 + f);
                r += dr * dir;
                f += df * dir;
            }
        }
        table[sq as usize] = Bitboard(bb);
    }
    table
}

// =========================================================================
// Sliding attack kernel
// =========================================================================

/// Attacked squares along one line (a file, rank, or diagonal mask),
/// up to and including the first blocker in each direction.
///
/// `pos` is the singleton bitboard of the attacker square, which must lie
/// on `mask`. Subtraction of `2*pos` from the blockers-in-mask borrows
/// through the empty squares above the attacker and stops at the first
/// blocker; the mirrored subtraction handles the downward direction.
#[inline]
pub fn line_attacks(occupied: Bitboard, pos: Bitboard, mask: Bitboard) -> Bitboard {
    let occ_in_mask = (occupied & mask).0;
    let forward = occ_in_mask.wrapping_sub(pos.0 << 1);
    let reverse = occ_in_mask
        .reverse_bits()
        .wrapping_sub(pos.0.reverse_bits() << 1)
        .reverse_bits();
    Bitboard(forward ^ reverse) & mask
}

/// Bishop-style attacks: both diagonals through `sq`.
#[inline]
pub fn diagonal_attacks(occupied: Bitboard, sq: Square) -> Bitboard {
    let t = tables();
    let pos = Bitboard::from_square(sq);
    line_attacks(occupied, pos, t.diagonals[sq.0 as usize])
        | line_attacks(occupied, pos, t.anti_diagonals[sq.0 as usize])
}

/// Rook-style attacks: the rank and file through `sq`.
#[inline]
pub fn orthogonal_attacks(occupied: Bitboard, sq: Square) -> Bitboard {
    let pos = Bitboard::from_square(sq);
    line_attacks(occupied, pos, RANKS[sq.rank() as usize])
        | line_attacks(occupied, pos, FILES[sq.file() as usize])
}

/// Queen attacks = rook | bishop.
#[inline]
pub fn queen_attacks(occupied: Bitboard, sq: Square) -> Bitboard {
    orthogonal_attacks(occupied, sq) | diagonal_attacks(occupied, sq)
}

/// Pseudo-move destinations for a non-pawn piece on `sq` given `occupied`.
///
/// Own-piece destinations are *not* masked out here; pawns are
/// position-dependent (en passant) and handled by the move generator.
pub fn piece_moves(occupied: Bitboard, piece: PieceType, sq: Square) -> Bitboard {
    match piece {
        PieceType::King => tables().king_moves(sq),
        PieceType::Queen => queen_attacks(occupied, sq),
        PieceType::Rook => orthogonal_attacks(occupied, sq),
        PieceType::Bishop => diagonal_attacks(occupied, sq),
        PieceType::Knight => tables().knight_moves(sq),
        PieceType::Pawn => Bitboard::EMPTY,
    }
}

// =========================================================================
// Tests
// =========================================================================
