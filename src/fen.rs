//! FEN (Forsyth-Edwards Notation) parsing and generation.
//!
//! A FEN record has six space-separated fields: piece placement, side to
//! move, castling availability, en-passant target, half-move clock, and
//! full-move number. Unknown characters anywhere are an error. A position
//! without kings is accepted — scaffolding positions are legal input.

use crate::board::Board;
use crate::position::Position;
use crate::types::{CastlingRights, ChessError, Color, PieceType, Square};

pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

// ---------------------------------------------------------------------------
// Board field
// ---------------------------------------------------------------------------

/// Parse the piece-placement field (`/`-separated ranks, top rank first,
/// digits encoding runs of empty squares).
pub(crate) fn board_from_fen(field: &str) -> Result<Board, ChessError> {
    let ranks: Vec<&str> = field.split('/').collect();
    if ranks.len() != 8 {
        return Err(ChessError::InvalidFen(format!(
            "expected 8 ranks, got {}",
            ranks.len()
        )));
    }

    let mut board = Board::empty();
    for (rank_idx, rank_str) in ranks.iter().enumerate() {
        let rank = 7 - rank_idx as u8; // FEN starts from rank 8
        let mut file: u8 = 0;
        for ch in rank_str.chars() {
            if file > 7 {
                return Err(ChessError::InvalidFen(format!(
                    "too many squares in rank {}",
                    rank + 1
                )));
            }
            if let Some(digit) = ch.to_digit(10) {
                if !(1..=8).contains(&digit) {
                    return Err(ChessError::InvalidFen(format!(
                        "invalid empty count '{ch}' in rank {}",
                        rank + 1
                    )));
                }
                file += digit as u8;
            } else if let Some((color, piece)) = PieceType::from_char(ch) {
                board.put_piece(Square::from_file_rank(file, rank), color, piece);
                file += 1;
            } else {
                return Err(ChessError::InvalidFen(format!(
                    "invalid character '{ch}' in piece placement"
                )));
            }
        }
        if file != 8 {
            return Err(ChessError::InvalidFen(format!(
                "rank {} has {} squares instead of 8",
                rank + 1,
                file
            )));
        }
    }
    Ok(board)
}

/// Emit the piece-placement field, run-length-encoding empty squares.
pub(crate) fn board_to_fen(board: &Board) -> String {
    let mut fen = String::with_capacity(72);
    for rank in (0..8).rev() {
        let mut empty_count = 0u8;
        for file in 0..8 {
            let sq = Square::from_file_rank(file, rank);
            match board.piece_at(sq) {
                Some((color, piece)) => {
                    if empty_count > 0 {
                        fen.push((b'0' + empty_count) as char);
                        empty_count = 0;
                    }
                    fen.push(piece.to_char(color));
                }
                None => empty_count += 1,
            }
        }
        if empty_count > 0 {
            fen.push((b'0' + empty_count) as char);
        }
        if rank > 0 {
            fen.push('/');
        }
    }
    fen
}

// ---------------------------------------------------------------------------
// Full position
// ---------------------------------------------------------------------------

/// Parse a full six-field FEN record into a `Position`.
pub fn decode_fen(fen: &str) -> Result<Position, ChessError> {
    let fields: Vec<&str> = fen.split_whitespace().collect();
    if fields.len() != 6 {
        return Err(ChessError::InvalidFen(format!(
            "expected 6 fields, got {}",
            fields.len()
        )));
    }

    let board = board_from_fen(fields[0])?;

    let turn = match fields[1] {
        "w" => Color::White,
        "b" => Color::Black,
        other => {
            return Err(ChessError::InvalidFen(format!(
                "invalid side to move: '{other}'"
            )));
        }
    };

    let castle_rights = CastlingRights::from_fen(fields[2]).ok_or_else(|| {
        ChessError::InvalidFen(format!("invalid castling string: '{}'", fields[2]))
    })?;

    let en_passant = if fields[3] == "-" {
        None
    } else {
        let ep_sq = Square::from_algebraic(fields[3]).ok_or_else(|| {
            ChessError::InvalidFen(format!("invalid en passant square: '{}'", fields[3]))
        })?;
        // The target is the square passed over, so rank 3 or rank 6.
        if ep_sq.rank() != 2 && ep_sq.rank() != 5 {
            return Err(ChessError::InvalidFen(format!(
                "en passant square {} is not on rank 3 or 6",
                fields[3]
            )));
        }
        Some(ep_sq)
    };

    let halfmove_clock = fields[4]
        .parse::<u32>()
        .map_err(|_| ChessError::InvalidFen(format!("invalid halfmove clock: '{}'", fields[4])))?;

    let fullmove_number = fields[5]
        .parse::<u32>()
        .map_err(|_| ChessError::InvalidFen(format!("invalid fullmove number: '{}'", fields[5])))?;
    if fullmove_number == 0 {
        return Err(ChessError::InvalidFen(
            "fullmove number must be >= 1".to_string(),
        ));
    }

    Ok(Position::at_time(
        board,
        turn,
        castle_rights,
        en_passant,
        halfmove_clock,
        fullmove_number,
    ))
}

/// Emit the full six-field FEN record for a position.
pub fn encode_fen(pos: &Position) -> String {
    let mut fen = board_to_fen(pos.board());
    fen.push(' ');
    fen.push(pos.turn().fen_char());
    fen.push(' ');
    fen.push_str(&pos.castle_rights().to_fen());
    fen.push(' ');
    match pos.en_passant_square() {
        Some(sq) => fen.push_str(&sq.to_algebraic()),
        None => fen.push('-'),
    }
    fen.push(' ');
    fen.push_str(&pos.halfmove_clock().to_string());
    fen.push(' ');
    fen.push_str(&pos.fullmove_number().to_string());
    fen
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------
    // Board field round trips
    // -------------------------------------------------------------------

    #[test]
    fn board_field_round_trip_starting() {
        let field = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR";
        assert_eq!(board_to_fen(&board_from_fen(field).unwrap()), field);
    }

    #[test]
    fn board_field_round_trip_sparse() {
        for field in [
            "8/8/8/8/8/8/8/8",
            "4k3/8/8/8/8/8/8/4K3",
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R",
            "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R",
        ] {
            assert_eq!(board_to_fen(&board_from_fen(field).unwrap()), field);
        }
    }

    #[test]
    fn board_field_run_length_merges() {
        // Adjacent empties collapse into a single digit.
        let b = board_from_fen("8/8/8/8/8/8/8/R6R").unwrap();
        assert_eq!(board_to_fen(&b), "8/8/8/8/8/8/8/R6R");
    }

    // -------------------------------------------------------------------
    // Full FEN
    // -------------------------------------------------------------------

    #[test]
    fn decode_fen_round_trips() {
        for fen in [
            STARTING_FEN,
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1",
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w Kq - 5 20",
        ] {
            let pos = decode_fen(fen).unwrap();
            assert_eq!(encode_fen(&pos), fen);
        }
    }

    #[test]
    fn decode_fen_kingless_scaffolding_accepted() {
        let pos = decode_fen("8/8/8/8/8/8/8/R7 w - - 0 1").unwrap();
        assert_eq!(encode_fen(&pos), "8/8/8/8/8/8/8/R7 w - - 0 1");
    }

    // -------------------------------------------------------------------
    // Errors
    // -------------------------------------------------------------------

    #[test]
    fn error_wrong_field_count() {
        assert!(decode_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -").is_err());
    }

    #[test]
    fn error_wrong_rank_count() {
        assert!(decode_fen("rnbqkbnr/pppppppp/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1").is_err());
    }

    #[test]
    fn error_unknown_piece_char() {
        assert!(decode_fen("xnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1").is_err());
    }

    #[test]
    fn error_rank_too_long() {
        assert!(decode_fen("rnbqkbnrr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1").is_err());
    }

    #[test]
    fn error_rank_too_short() {
        assert!(decode_fen("rnbqkbn/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1").is_err());
    }

    #[test]
    fn error_zero_run_length() {
        assert!(decode_fen("rnbqkbnr/pppppppp/08/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1").is_err());
    }

    #[test]
    fn error_invalid_side() {
        assert!(decode_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR x KQkq - 0 1").is_err());
    }

    #[test]
    fn error_invalid_castling() {
        assert!(decode_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w XYZ - 0 1").is_err());
    }

    #[test]
    fn error_invalid_ep_square() {
        assert!(decode_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq z9 0 1").is_err());
    }

    #[test]
    fn error_ep_wrong_rank() {
        assert!(
            decode_fen("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e4 0 1").is_err()
        );
    }

    #[test]
    fn error_invalid_halfmove() {
        assert!(decode_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - abc 1").is_err());
    }

    #[test]
    fn error_fullmove_zero() {
        assert!(decode_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 0").is_err());
    }
}
