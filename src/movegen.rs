//! Legal move generation.
//!
//! Pipeline:
//!   1. For every piece of the side to move, compute pseudo-legal
//!      destinations (pawns via the shift kernel, everything else via the
//!      attack tables) intersected with the complement of own occupancy.
//!   2. Tag each candidate (capture, en passant, check) by applying it to a
//!      scratch board and probing king safety; candidates that leave the
//!      mover's own king in check are discarded.
//!   3. Append castling moves, whose path emptiness and attack constraints
//!      are verified up front.

use std::cell::RefCell;

use crate::attacks::{self, FILE_A, FILE_H, RANK_1, RANK_3, RANK_6, RANK_8};
use crate::board::Board;
use crate::position::Position;
use crate::types::{Bitboard, Color, Move, MoveFlags, PieceType, Square};

// =========================================================================
// Public API
// =========================================================================

/// Generate all legal moves for the side to move.
pub fn legal_moves(pos: &Position) -> Vec<Move> {
    calc_moves(pos, false)
}

/// Generate all legal moves originating from a specific square.
pub fn legal_moves_from(pos: &Position, from: Square) -> Vec<Move> {
    legal_moves(pos)
        .into_iter()
        .filter(|m| m.from == from)
        .collect()
}

/// Generate legal moves; with `first_only` the search stops after the first
/// legal move is found (used by status detection, which only needs to know
/// whether any move exists).
pub(crate) fn calc_moves(pos: &Position, first_only: bool) -> Vec<Move> {
    let mut moves = standard_moves(pos, first_only);
    moves.extend(castle_moves(pos));
    moves
}

// =========================================================================
// Standard moves
// =========================================================================

fn standard_moves(pos: &Position, first_only: bool) -> Vec<Move> {
    let us = pos.turn();
    let board = pos.board();
    let allowed = !board.occupancy(us);
    let mut moves = Vec::with_capacity(48);

    for &pt in &PieceType::ALL {
        let origins = board.bb(us, pt);
        if origins.is_empty() {
            continue;
        }
        for from in origins.iter() {
            let pseudo = if pt == PieceType::Pawn {
                pawn_moves(pos, from)
            } else {
                attacks::piece_moves(board.occupied(), pt, from)
            };
            let targets = pseudo & allowed;

            for to in targets.iter() {
                let promotes = pt == PieceType::Pawn
                    && ((us == Color::White && to.rank() == 7)
                        || (us == Color::Black && to.rank() == 0));
                if promotes {
                    for promo in PieceType::PROMOTIONS {
                        let mut m = Move::with_promotion(from, to, promo, MoveFlags::NONE);
                        add_tags(&mut m, pos);
                        if !m.flags.leaves_mover_in_check() {
                            moves.push(m);
                            if first_only {
                                return moves;
                            }
                        }
                    }
                } else {
                    let mut m = Move::new(from, to);
                    add_tags(&mut m, pos);
                    if !m.flags.leaves_mover_in_check() {
                        moves.push(m);
                        if first_only {
                            return moves;
                        }
                    }
                }
            }
        }
    }
    moves
}

/// Pseudo-legal pawn destinations from a single square: single push, double
/// push from the initial rank, and diagonal captures (including onto the
/// en-passant target).
fn pawn_moves(pos: &Position, sq: Square) -> Bitboard {
    let bb = Bitboard::from_square(sq);
    let board = pos.board();
    let unoccupied = !board.occupied();
    let ep = pos
        .en_passant_square()
        .map(Bitboard::from_square)
        .unwrap_or(Bitboard::EMPTY);

    if pos.turn() == Color::White {
        let targets = board.occupancy(Color::Black) | ep;
        let cap_right = ((bb & !FILE_H & !RANK_8) << 9) & targets;
        let cap_left = ((bb & !FILE_A & !RANK_8) << 7) & targets;
        let up_one = ((bb & !RANK_8) << 8) & unoccupied;
        let up_two = ((up_one & RANK_3) << 8) & unoccupied;
        cap_right | cap_left | up_one | up_two
    } else {
        let targets = board.occupancy(Color::White) | ep;
        let cap_right = ((bb & !FILE_H & !RANK_1) >> 7) & targets;
        let cap_left = ((bb & !FILE_A & !RANK_1) >> 9) & targets;
        let down_one = ((bb & !RANK_1) >> 8) & unoccupied;
        let down_two = ((down_one & RANK_6) >> 8) & unoccupied;
        cap_right | cap_left | down_one | down_two
    }
}

// =========================================================================
// Tagging
// =========================================================================

thread_local! {
    /// Scratch board reused across `add_tags` calls on this thread to avoid
    /// a fresh allocation per candidate move. The borrow is scoped to a
    /// single call.
    static SCRATCH: RefCell<Board> = RefCell::new(Board::empty());
}

/// Annotate a candidate move with capture/en-passant tags, then apply it to
/// a scratch board to probe both kings: a mover left in check marks the move
/// invalid, an opponent in check marks it as a checking move.
fn add_tags(m: &mut Move, pos: &Position) {
    let board = pos.board();
    if board.is_occupied(m.to) {
        m.flags.insert(MoveFlags::CAPTURE);
    } else if pos.en_passant_square() == Some(m.to)
        && board.piece_at(m.from).map(|(_, pt)| pt) == Some(PieceType::Pawn)
    {
        m.flags.insert(MoveFlags::EN_PASSANT);
    }

    SCRATCH.with_borrow_mut(|scratch| {
        board.copy_into(scratch);
        scratch.update(m);
        if is_in_check(scratch, pos.turn()) {
            m.flags.insert(MoveFlags::IN_CHECK);
        }
        if is_in_check(scratch, !pos.turn()) {
            m.flags.insert(MoveFlags::CHECK);
        }
    });
}

// =========================================================================
// Attack detection
// =========================================================================

/// Whether `color`'s king is attacked. A board without that king reports
/// no check (scaffolding positions).
pub(crate) fn is_in_check(board: &Board, color: Color) -> bool {
    match board.king_sq(color) {
        Some(king) => squares_are_attacked(board, color, &[king]),
        None => false,
    }
}

/// Whether any of `sqs` is attacked by the opponent of `turn`.
pub(crate) fn squares_are_attacked(board: &Board, turn: Color, sqs: &[Square]) -> bool {
    let attacker = !turn;
    let occ = board.occupied();
    let attacker_sqs = board.occupancy(attacker);
    let t = attacks::tables();

    for &sq in sqs {
        let dia = attacks::diagonal_attacks(occ, sq);
        let hv = attacks::orthogonal_attacks(occ, sq);

        // Cheap gate: no attacker piece is geometrically reachable.
        if (((dia | hv) & attacker_sqs) | (t.knight_moves(sq) & attacker_sqs)).is_empty() {
            continue;
        }

        if ((dia | hv) & board.bb(attacker, PieceType::Queen)).is_not_empty() {
            return true;
        }
        if (hv & board.bb(attacker, PieceType::Rook)).is_not_empty() {
            return true;
        }
        if (dia & board.bb(attacker, PieceType::Bishop)).is_not_empty() {
            return true;
        }
        if (t.knight_moves(sq) & board.bb(attacker, PieceType::Knight)).is_not_empty() {
            return true;
        }

        // Pawn attackers via reverse-direction shifts.
        let sq_bb = Bitboard::from_square(sq);
        let pawns = board.bb(attacker, PieceType::Pawn);
        let pawn_reach = match turn {
            Color::White => ((pawns & !FILE_H & !RANK_1) >> 7) | ((pawns & !FILE_A & !RANK_1) >> 9),
            Color::Black => ((pawns & !FILE_H & !RANK_8) << 9) | ((pawns & !FILE_A & !RANK_8) << 7),
        };
        if (pawn_reach & sq_bb).is_not_empty() {
            return true;
        }

        if (t.king_moves(sq) & board.bb(attacker, PieceType::King)).is_not_empty() {
            return true;
        }
    }
    false
}

// =========================================================================
// Castling
// =========================================================================

fn castle_moves(pos: &Position) -> Vec<Move> {
    let us = pos.turn();
    let board = pos.board();
    let occupied = board.occupied();
    let rights = pos.castle_rights();
    let mut moves = Vec::with_capacity(2);

    let (king_from, base) = match us {
        Color::White => (Square::E1, 0u8),
        Color::Black => (Square::E8, 56u8),
    };
    let b_sq = Square(base + 1);
    let c_sq = Square(base + 2);
    let d_sq = Square(base + 3);
    let f_sq = Square(base + 5);
    let g_sq = Square(base + 6);

    // Kingside: f and g empty, neither attacked, king not currently in check.
    if rights.can_castle_kingside(us)
        && (occupied & (Bitboard::from_square(f_sq) | Bitboard::from_square(g_sq))).is_empty()
        && !squares_are_attacked(board, us, &[f_sq, g_sq])
        && !pos.in_check()
    {
        let mut m = Move::with_flags(king_from, g_sq, MoveFlags::KING_SIDE_CASTLE);
        add_tags(&mut m, pos);
        moves.push(m);
    }

    // Queenside: b, c, d empty; c and d not attacked; not in check.
    if rights.can_castle_queenside(us)
        && (occupied
            & (Bitboard::from_square(b_sq)
                | Bitboard::from_square(c_sq)
                | Bitboard::from_square(d_sq)))
            .is_empty()
        && !squares_are_attacked(board, us, &[c_sq, d_sq])
        && !pos.in_check()
    {
        let mut m = Move::with_flags(king_from, c_sq, MoveFlags::QUEEN_SIDE_CASTLE);
        add_tags(&mut m, pos);
        moves.push(m);
    }

    moves
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(name: &str) -> Square {
        Square::from_algebraic(name).unwrap()
    }

    fn pos(fen: &str) -> Position {
        Position::from_fen(fen).unwrap()
    }

    fn count_legal(fen: &str) -> usize {
        legal_moves(&pos(fen)).len()
    }

    // -------------------------------------------------------------------
    // Known positions
    // -------------------------------------------------------------------

    #[test]
    fn starting_position_has_20_moves() {
        assert_eq!(
            count_legal("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"),
            20
        );
    }

    #[test]
    fn starting_position_after_e4() {
        assert_eq!(
            count_legal("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1"),
            20
        );
    }

    #[test]
    fn kiwipete_48_moves() {
        assert_eq!(
            count_legal("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1"),
            48
        );
    }

    #[test]
    fn position_3_14_moves() {
        assert_eq!(count_legal("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1"), 14);
    }

    #[test]
    fn position_4_6_moves() {
        assert_eq!(
            count_legal("r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1"),
            6
        );
    }

    #[test]
    fn position_5_44_moves() {
        assert_eq!(
            count_legal("rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8"),
            44
        );
    }

    // -------------------------------------------------------------------
    // Pawn moves
    // -------------------------------------------------------------------

    #[test]
    fn pawn_single_and_double_push() {
        let p = pos("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1");
        let pawn_moves: Vec<_> = legal_moves(&p)
            .into_iter()
            .filter(|m| m.from == sq("e2"))
            .collect();
        assert_eq!(pawn_moves.len(), 2);
    }

    #[test]
    fn pawn_blocked() {
        let p = pos("4k3/8/8/8/8/4p3/4P3/4K3 w - - 0 1");
        assert!(legal_moves(&p).iter().all(|m| m.from != sq("e2")));
    }

    #[test]
    fn pawn_double_push_blocked_at_destination() {
        let p = pos("4k3/8/8/8/4p3/8/4P3/4K3 w - - 0 1");
        let pawn_moves: Vec<_> = legal_moves(&p)
            .into_iter()
            .filter(|m| m.from == sq("e2"))
            .collect();
        assert_eq!(pawn_moves.len(), 1);
        assert_eq!(pawn_moves[0].to, sq("e3"));
    }

    #[test]
    fn pawn_captures_are_tagged() {
        let p = pos("4k3/8/8/3p4/4P3/8/8/4K3 w - - 0 1");
        let capture = legal_moves(&p)
            .into_iter()
            .find(|m| m.from == sq("e4") && m.to == sq("d5"))
            .unwrap();
        assert!(capture.flags.is_capture());
    }

    #[test]
    fn pawn_promotion_expands_to_four() {
        let p = pos("7k/4P3/8/8/8/8/8/4K3 w - - 0 1");
        let promos: Vec<_> = legal_moves(&p)
            .into_iter()
            .filter(|m| m.from == sq("e7"))
            .collect();
        assert_eq!(promos.len(), 4);
        assert!(promos.iter().all(|m| m.promotion.is_some()));
    }

    #[test]
    fn en_passant_move_generated() {
        let p = pos("rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3");
        let ep: Vec<_> = legal_moves(&p)
            .into_iter()
            .filter(|m| m.flags.is_en_passant())
            .collect();
        assert_eq!(ep.len(), 1);
        assert_eq!(ep[0].to, sq("f6"));
    }

    #[test]
    fn en_passant_pinned_pawn_rejected() {
        // Capturing en passant would expose the white king on the 5th rank.
        let p = pos("8/8/8/KPp4r/8/8/8/4k3 w - c6 0 1");
        assert!(legal_moves(&p).iter().all(|m| !m.flags.is_en_passant()));
    }

    // -------------------------------------------------------------------
    // Castling
    // -------------------------------------------------------------------

    #[test]
    fn castling_both_sides() {
        let p = pos("r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1");
        let castles: Vec<_> = legal_moves(&p)
            .into_iter()
            .filter(|m| m.flags.is_castle())
            .collect();
        assert_eq!(castles.len(), 2);
        assert!(castles.iter().any(|m| m.flags.is_king_side_castle()));
        assert!(castles.iter().any(|m| m.flags.is_queen_side_castle()));
    }

    #[test]
    fn castling_blocked_by_pieces() {
        let p = pos("r3k2r/pppppppp/8/8/8/8/PPPPPPPP/RN2K1NR w KQkq - 0 1");
        assert!(legal_moves(&p).iter().all(|m| !m.flags.is_castle()));
    }

    #[test]
    fn castling_through_attacked_square_forbidden() {
        // Black rook on f8 covers f1; kingside is out, queenside remains.
        let p = pos("4kr2/8/8/8/8/8/8/R3K2R w KQ - 0 1");
        let castles: Vec<_> = legal_moves(&p)
            .into_iter()
            .filter(|m| m.flags.is_castle())
            .collect();
        assert_eq!(castles.len(), 1);
        assert_eq!(castles[0].to, sq("c1"));
    }

    #[test]
    fn no_castling_while_in_check() {
        let p = pos("4k3/8/8/8/8/8/8/R3K2r w Q - 0 1");
        assert!(legal_moves(&p).iter().all(|m| !m.flags.is_castle()));
    }

    #[test]
    fn no_castling_without_rights() {
        let p = pos("r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w - - 0 1");
        assert!(legal_moves(&p).iter().all(|m| !m.flags.is_castle()));
    }

    // -------------------------------------------------------------------
    // King safety
    // -------------------------------------------------------------------

    #[test]
    fn every_move_leaves_king_safe() {
        let p = pos("4k3/8/8/8/8/8/8/R3K2q w Q - 0 1");
        for mv in legal_moves(&p) {
            let next = p.update(&mv);
            assert!(
                !is_in_check(next.board(), Color::White),
                "move {mv} leaves the king in check"
            );
        }
    }

    #[test]
    fn check_tag_set_on_checking_moves() {
        // Rook to e-file gives check to the black king on e8.
        let p = pos("4k3/8/8/8/8/8/8/R3K3 w - - 0 1");
        let checking = legal_moves(&p)
            .into_iter()
            .find(|m| m.from == sq("a1") && m.to == sq("a8"))
            .unwrap();
        assert!(checking.flags.is_check());
    }

    #[test]
    fn first_only_returns_early() {
        let p = pos("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1");
        let moves = calc_moves(&p, true);
        assert!(!moves.is_empty());
        assert!(moves.len() < 20);
    }

    #[test]
    fn legal_moves_from_filters_origin() {
        let p = Position::starting();
        assert_eq!(legal_moves_from(&p, sq("e2")).len(), 2);
        assert_eq!(legal_moves_from(&p, sq("e4")).len(), 0);
    }

    // -------------------------------------------------------------------
    // Attack symmetry
    // -------------------------------------------------------------------

    #[test]
    fn attack_detection_matches_pseudo_moves() {
        // squares_are_attacked must agree with "some enemy piece has this
        // square in its pseudo-move set" (pawn diagonals handled separately,
        // since pawn pushes are not attacks).
        let p = pos("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1");
        let board = p.board();
        let occ = board.occupied();
        let t = attacks::tables();

        for idx in 0..64u8 {
            let target = Square(idx);
            let mut reachable = false;
            for &pt in &PieceType::ALL {
                for from in board.bb(Color::Black, pt).iter() {
                    let attacks_bb = match pt {
                        PieceType::Pawn => {
                            let bb = Bitboard::from_square(from);
                            ((bb & !FILE_H & !RANK_1) >> 7) | ((bb & !FILE_A & !RANK_1) >> 9)
                        }
                        _ => attacks::piece_moves(occ, pt, from),
                    };
                    if attacks_bb.is_set(target) {
                        reachable = true;
                    }
                }
            }
            assert_eq!(
                squares_are_attacked(board, Color::White, &[target]),
                reachable,
                "attack mismatch on {target}"
            );
        }
    }
}
