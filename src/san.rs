//! Hand-written SAN parser, the fast path used by PGN decoding.
//!
//! Unlike [`crate::notation::Position::decode_san`], which canonicalises
//! every legal move and matches by prefix, this parser works directly on the
//! string: split off the destination square, classify the head (piece letter
//! and disambiguators), resolve the origin square from the bitboards, and
//! fold the tail (check, mate, promotion, annotations) into move flags. The
//! result is not validated for legality — callers match it against the
//! legal-move list.

use crate::attacks::{self, FILES, RANK_2, RANK_7, RANKS};
use crate::position::Position;
use crate::types::{Bitboard, ChessError, Color, Move, MoveFlags, PieceType, Square};

/// Parse a single SAN token against a position.
pub(crate) fn parse_san(s: &str, pos: &Position) -> Result<Move, ChessError> {
    let s = s.trim();
    let invalid = |reason: String| ChessError::InvalidNotation {
        text: s.to_string(),
        reason,
    };

    if s == "--" {
        return Err(invalid("null moves are not supported".into()));
    }
    if !s.is_ascii() || s.len() < 2 {
        return Err(invalid("move too short".into()));
    }

    let us = pos.turn();

    // Castling, in both the letter-O and digit-0 spellings. The queenside
    // literal must be tested first since it contains the kingside one.
    if s.starts_with("O-O-O") || s.starts_with("0-0-0") {
        let (from, to) = match us {
            Color::White => (Square::E1, Square::C1),
            Color::Black => (Square::E8, Square::C8),
        };
        let m = Move::with_flags(from, to, MoveFlags::QUEEN_SIDE_CASTLE);
        return parse_tail(m, &s[5..]).map_err(invalid);
    }
    if s.starts_with("O-O") || s.starts_with("0-0") {
        let (from, to) = match us {
            Color::White => (Square::E1, Square::G1),
            Color::Black => (Square::E8, Square::G8),
        };
        let m = Move::with_flags(from, to, MoveFlags::KING_SIDE_CASTLE);
        return parse_tail(m, &s[3..]).map_err(invalid);
    }

    // Locate the destination square: the last digit and the letter before it.
    let bytes = s.as_bytes();
    let last_num = bytes
        .iter()
        .rposition(|b| b.is_ascii_digit())
        .ok_or_else(|| invalid(format!("couldn't find a square number in `{s}`")))?;
    if last_num < 1 {
        return Err(invalid(format!("couldn't find a destination square in `{s}`")));
    }

    let head_raw = &s[..last_num - 1];
    let to_str = &s[last_num - 1..=last_num];
    let tail = &s[last_num + 1..];

    let to_sq = Square::from_algebraic(&to_str.to_ascii_lowercase())
        .ok_or_else(|| invalid(format!("`{to_str}` is not a square")))?;

    let mut flags = MoveFlags::NONE;
    let head: String = if head_raw.contains('x') {
        flags.insert(MoveFlags::CAPTURE);
        head_raw.replace('x', "")
    } else {
        head_raw.to_string()
    };

    // Head lengths 0..3 are: pawn push, piece-move-or-pawn-capture, partial
    // disambiguation, full square disambiguation.
    let mut file_hint: Option<u8> = None;
    let mut rank_hint: Option<u8> = None;
    let hb = head.as_bytes();
    let piece = match hb.len() {
        0 => Some(PieceType::Pawn),
        1 => {
            if hb[0].is_ascii_uppercase() {
                piece_type_from_letter(hb[0])
            } else {
                // A single lowercase leading letter denotes a pawn on that
                // file; anything beyond 'h' is a capitalization mistake
                // ("nf3" is not a knight move).
                let file = hb[0].wrapping_sub(b'a');
                if file > 7 {
                    return Err(invalid(format!(
                        "invalid capitalization `{head}` in `{s}`"
                    )));
                }
                file_hint = Some(file);
                Some(PieceType::Pawn)
            }
        }
        2 => {
            let pt = piece_type_from_letter(hb[0]);
            if hb[1].is_ascii_digit() {
                let rank = hb[1].wrapping_sub(b'1');
                if rank > 7 {
                    return Err(invalid(format!("invalid rank disambiguator in `{s}`")));
                }
                rank_hint = Some(rank);
            } else {
                // An uppercase file disambiguator is tolerated.
                let file = if hb[1].is_ascii_uppercase() {
                    hb[1].wrapping_sub(b'A')
                } else {
                    hb[1].wrapping_sub(b'a')
                };
                if file > 7 {
                    return Err(invalid(format!("invalid file disambiguator in `{s}`")));
                }
                file_hint = Some(file);
            }
            pt
        }
        3 => {
            let pt = piece_type_from_letter(hb[0]);
            let from_sq = Square::from_algebraic(&head[1..].to_ascii_lowercase())
                .ok_or_else(|| invalid(format!("invalid origin square in `{s}`")))?;
            file_hint = Some(from_sq.file());
            rank_hint = Some(from_sq.rank());
            pt
        }
        _ => None,
    };
    let Some(piece) = piece else {
        return Err(invalid(format!("couldn't deduce a piece type for `{s}`")));
    };

    // Destination occupancy checks, including the `Kxh1` dialect where a
    // king "capturing" its own rook spells castling.
    if let Some((victim_color, victim)) = pos.board().piece_at(to_sq) {
        if victim_color == us {
            if victim == PieceType::Rook && piece == PieceType::King {
                if us == Color::White
                    && pos.board().king_sq(Color::White) == Some(Square::E1)
                    && (to_sq == Square::A1 || to_sq == Square::H1)
                {
                    let m = if to_sq == Square::A1 {
                        Move::with_flags(Square::E1, Square::C1, MoveFlags::QUEEN_SIDE_CASTLE)
                    } else {
                        Move::with_flags(Square::E1, Square::G1, MoveFlags::KING_SIDE_CASTLE)
                    };
                    return parse_tail(m, tail).map_err(invalid);
                }
                if us == Color::Black
                    && pos.board().king_sq(Color::Black) == Some(Square::E8)
                    && (to_sq == Square::A8 || to_sq == Square::H8)
                {
                    let m = if to_sq == Square::A8 {
                        Move::with_flags(Square::E8, Square::C8, MoveFlags::QUEEN_SIDE_CASTLE)
                    } else {
                        Move::with_flags(Square::E8, Square::G8, MoveFlags::KING_SIDE_CASTLE)
                    };
                    return parse_tail(m, tail).map_err(invalid);
                }
            }
            return Err(invalid(format!("`{s}` tries to capture its own piece")));
        }
        if !flags.is_capture() {
            return Err(invalid(format!(
                "`{s}` moves onto a piece without capturing"
            )));
        }
    }

    let from_sq = find_from_square(piece, us, to_sq, file_hint, rank_hint, pos).map_err(invalid)?;

    let m = Move::with_flags(from_sq, to_sq, flags);
    parse_tail(m, tail).map_err(invalid)
}

/// Fold the tail after the destination square (check, mate, promotion,
/// quality marks, en-passant marker) into the move.
fn parse_tail(mut m: Move, tail: &str) -> Result<Move, String> {
    if tail.is_empty() {
        return Ok(m);
    }
    let mut rest = tail.replace(['!', '?'], "");
    if rest.contains("e.p.") {
        m.flags.insert(MoveFlags::EN_PASSANT);
        rest = rest.replace("e.p.", "");
    }
    if rest.contains("ep") {
        m.flags.insert(MoveFlags::EN_PASSANT);
        rest = rest.replace("ep", "");
    }
    if rest.contains('+') {
        m.flags.insert(MoveFlags::CHECK);
        rest = rest.replace('+', "");
    }
    if rest.contains('#') {
        m.flags.insert(MoveFlags::CHECK);
        m.flags.insert(MoveFlags::CHECKMATE);
        rest = rest.replace('#', "");
    }
    if let Some(idx) = rest.find('=') {
        if idx + 2 > rest.len() {
            return Err(format!("dangling promotion marker in `{tail}`"));
        }
        let promo = match &rest[idx..idx + 2] {
            "=Q" | "=q" => PieceType::Queen,
            "=R" | "=r" => PieceType::Rook,
            "=B" | "=b" => PieceType::Bishop,
            "=N" | "=n" => PieceType::Knight,
            other => return Err(format!("can't parse promotion `{other}`")),
        };
        m.promotion = Some(promo);
        rest = format!("{}{}", &rest[..idx], &rest[idx + 2..]);
    }
    if !rest.is_empty() {
        return Err(format!("remaining tail characters: `{rest}`"));
    }
    Ok(m)
}

fn piece_type_from_letter(b: u8) -> Option<PieceType> {
    match b.to_ascii_uppercase() {
        b'K' => Some(PieceType::King),
        b'Q' => Some(PieceType::Queen),
        b'R' => Some(PieceType::Rook),
        b'B' => Some(PieceType::Bishop),
        b'N' => Some(PieceType::Knight),
        b'P' => Some(PieceType::Pawn),
        _ => None,
    }
}

/// Resolve the origin square from the piece bitboards and the disambiguation
/// hints: intersect with the hint masks, and if more than one candidate
/// remains, take the first whose pseudo-move set reaches the destination.
fn find_from_square(
    piece: PieceType,
    us: Color,
    to_sq: Square,
    file_hint: Option<u8>,
    rank_hint: Option<u8>,
    pos: &Position,
) -> Result<Square, String> {
    if piece == PieceType::Pawn {
        // Pawns can't move backwards, so the origin follows from the file.
        return find_pawn_square(us, to_sq, file_hint, pos);
    }

    let mut candidates = pos.board().bb(us, piece);
    if let Some(f) = file_hint {
        candidates &= FILES[f as usize];
    }
    if let Some(r) = rank_hint {
        candidates &= RANKS[r as usize];
    }
    if candidates.pop_count() == 1 {
        return single_origin(candidates, to_sq);
    }

    let occupied = pos.board().occupied();
    let target = Bitboard::from_square(to_sq);
    for from in candidates.iter() {
        if (attacks::piece_moves(occupied, piece, from) & target).is_not_empty() {
            return Ok(from);
        }
    }
    Err(format!("can't find a {piece} able to reach {to_sq}"))
}

fn find_pawn_square(
    us: Color,
    to_sq: Square,
    file_hint: Option<u8>,
    pos: &Position,
) -> Result<Square, String> {
    let pawns = pos.board().bb(us, PieceType::Pawn);
    // Without a capture's origin file, the pawn stands on the destination file.
    let file = file_hint.unwrap_or_else(|| to_sq.file());
    let file_pawns = pawns & FILES[file as usize];
    let to_rank = to_sq.rank();

    let origin = match us {
        Color::White => {
            if to_rank == 0 {
                return Err(format!("no white pawn can reach {to_sq}"));
            }
            let mut bb = file_pawns & RANKS[(to_rank - 1) as usize];
            if bb.is_empty() && to_rank == 3 {
                bb = file_pawns & RANK_2;
            }
            bb
        }
        Color::Black => {
            if to_rank == 7 {
                return Err(format!("no black pawn can reach {to_sq}"));
            }
            let mut bb = file_pawns & RANKS[(to_rank + 1) as usize];
            if bb.is_empty() && to_rank == 4 {
                bb = file_pawns & RANK_7;
            }
            bb
        }
    };
    single_origin(origin, to_sq)
}

fn single_origin(bb: Bitboard, to_sq: Square) -> Result<Square, String> {
    match bb.pop_count() {
        0 => Err(format!("no candidate piece can move to {to_sq}")),
        1 => Ok(bb.lsb().expect("non-empty bitboard has an lsb")),
        _ => Err(format!("more than one candidate piece can move to {to_sq}")),
    }
}

// =========================================================================
// Tests
// =========================================================================
