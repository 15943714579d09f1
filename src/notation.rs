//! Move notation: SAN, long algebraic, and UCI.
//!
//! SAN examples: `e4`, `Nf3`, `Bxe5`, `O-O`, `e8=Q+`, `Raxd1#`.
//!
//! Encoding needs a position for disambiguation and check detection.
//! Decoding is deliberately forgiving: canonical SAN of every legal move is
//! matched by prefix first, then the input is re-canonicalised through a
//! permissive parser, and finally over-specified disambiguators are dropped
//! and retried.

use crate::position::Position;
use crate::san;
use crate::types::{ChessError, Method, Move, MoveFlags, PieceType, Square};

/// The supported textual move notations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Notation {
    /// Short Algebraic Notation, the PGN move format.
    #[default]
    San,
    /// Like SAN but with the full origin square (`Ng1f3`).
    LongAlgebraic,
    /// Plain `<from><to>[promo]` as used by chess engines (`g1f3`, `e7e8q`).
    Uci,
}

impl Position {
    /// Encode a move in the requested notation.
    pub fn encode_move(&self, m: &Move, notation: Notation) -> String {
        match notation {
            Notation::San => self.encode_san(m),
            Notation::LongAlgebraic => self.encode_long_algebraic(m),
            Notation::Uci => self.encode_uci(m),
        }
    }

    /// Decode a move string, trying the obvious notations in turn: the fast
    /// SAN parser, the permissive SAN matcher, then UCI.
    pub fn decode_move(&self, s: &str) -> Result<Move, ChessError> {
        if let Ok(m) = san::parse_san(s, self)
            && let Some(canonical) = self.moves_cached().iter().find(|vm| **vm == m)
        {
            return Ok(*canonical);
        }
        if let Ok(m) = self.decode_san(s) {
            return Ok(m);
        }
        if let Ok(m) = self.decode_uci(s) {
            if let Some(canonical) = self.moves_cached().iter().find(|vm| **vm == m) {
                return Ok(*canonical);
            }
            return Ok(m);
        }
        Err(ChessError::InvalidNotation {
            text: s.to_string(),
            reason: format!("no notation matched for position {self}"),
        })
    }

    // =====================================================================
    // SAN
    // =====================================================================

    /// Encode a move in SAN, including check (`+`) and mate (`#`) suffixes.
    pub fn encode_san(&self, m: &Move) -> String {
        self.encode_san_with(m, None)
    }

    /// SAN encoding with an optional pre-computed legal-move list, passed in
    /// by the decoder to avoid re-generating it per candidate.
    fn encode_san_with(&self, m: &Move, valid: Option<&[Move]>) -> String {
        let check = self.check_suffix(m);
        if m.flags.is_king_side_castle() {
            return format!("O-O{check}");
        }
        if m.flags.is_queen_side_castle() {
            return format!("O-O-O{check}");
        }

        let piece = self
            .board()
            .piece_at(m.from)
            .map(|(_, pt)| pt)
            .unwrap_or(PieceType::Pawn);

        let mut out = String::with_capacity(8);
        if let Some(c) = piece.san_char() {
            out.push(c);
        }

        let disambig = self.disambiguator(m, piece, valid);
        out.push_str(&disambig);

        if m.flags.is_capture() || m.flags.is_en_passant() {
            // A capturing pawn is identified by its departure file.
            if piece == PieceType::Pawn && disambig.is_empty() {
                out.push((b'a' + m.from.file()) as char);
            }
            out.push('x');
        }

        out.push_str(&m.to.to_algebraic());

        if let Some(promo) = m.promotion {
            out.push('=');
            out.push(promo.san_char().expect("promotion piece has a SAN letter"));
        }

        out.push_str(&check);
        out
    }

    /// `#` when the move mates, `+` when it merely checks, empty otherwise.
    fn check_suffix(&self, m: &Move) -> String {
        if !m.flags.is_check() {
            return String::new();
        }
        if self.update(m).status() == Method::Checkmate {
            "#".to_string()
        } else {
            "+".to_string()
        }
    }

    /// Disambiguation for non-pawn, non-king moves: a file letter when that
    /// suffices, the rank digit when the competing piece shares the file,
    /// both when competitors share file and rank (three-queen territory).
    fn disambiguator(&self, m: &Move, piece: PieceType, valid: Option<&[Move]>) -> String {
        if piece == PieceType::Pawn || piece == PieceType::King {
            return String::new();
        }

        let owned;
        let moves: &[Move] = match valid {
            Some(v) => v,
            None => {
                owned = self.valid_moves();
                &owned
            }
        };

        let mut required = false;
        let mut file_required = false;
        let mut rank_required = false;
        for other in moves {
            if other.from != m.from
                && other.to == m.to
                && self.board().piece_at(other.from).map(|(_, pt)| pt) == Some(piece)
            {
                required = true;
                if other.from.file() == m.from.file() {
                    rank_required = true;
                }
                if other.from.rank() == m.from.rank() {
                    file_required = true;
                }
            }
        }

        let mut out = String::new();
        if file_required || (!rank_required && required) {
            out.push((b'a' + m.from.file()) as char);
        }
        if rank_required {
            out.push((b'1' + m.from.rank()) as char);
        }
        out
    }

    /// Decode a SAN string into the matching legal move.
    pub fn decode_san(&self, s: &str) -> Result<Move, ChessError> {
        let valid = self.moves_cached();
        let encoded: Vec<String> = valid
            .iter()
            .map(|m| self.encode_san_with(m, Some(valid)))
            .collect();

        // 1. The input may already be canonical (or a prefix of canonical,
        //    e.g. missing the check suffix).
        for (i, canonical) in encoded.iter().enumerate() {
            if canonical.starts_with(s) {
                return Ok(valid[i]);
            }
        }

        // 2. Re-canonicalise through the permissive parser and retry.
        let parts = san_parts(s).ok_or_else(|| ChessError::InvalidNotation {
            text: s.to_string(),
            reason: format!("could not parse algebraic notation for position {self}"),
        })?;
        let cleaned = parts.cleaned();
        for (i, canonical) in encoded.iter().enumerate() {
            if canonical.starts_with(&cleaned) {
                return Ok(valid[i]);
            }
        }

        // 3. Disambiguators are sometimes extraneously added; drop them in
        //    the combinations that can still be unambiguous and retry.
        let mut options: Vec<String> = Vec::new();
        let p = &parts;
        if !p.piece.is_empty() {
            options.push(format!(
                "{}{}{}{}{}",
                p.piece, p.capture, p.dest_file, p.dest_rank, p.promo
            ));
            options.push(format!(
                "{}{}{}{}{}{}",
                p.piece, p.origin_rank, p.capture, p.dest_file, p.dest_rank, p.promo
            ));
            options.push(format!(
                "{}{}{}{}{}{}",
                p.piece, p.origin_file, p.capture, p.dest_file, p.dest_rank, p.promo
            ));
        } else {
            if !p.capture.is_empty() {
                // A pawn capture like "d4xe5" parses with an origin rank that
                // canonical SAN never carries.
                options.push(format!(
                    "{}{}{}{}{}",
                    p.origin_file, p.capture, p.dest_file, p.dest_rank, p.promo
                ));
            }
            if !p.origin_file.is_empty() && !p.origin_rank.is_empty() {
                options.push(format!(
                    "{}{}{}{}",
                    p.capture, p.dest_file, p.dest_rank, p.promo
                ));
            }
        }
        for (i, canonical) in encoded.iter().enumerate() {
            if options.iter().any(|opt| canonical.starts_with(opt.as_str())) {
                return Ok(valid[i]);
            }
        }

        Err(ChessError::InvalidNotation {
            text: s.to_string(),
            reason: format!("no legal move matches for position {self}"),
        })
    }

    // =====================================================================
    // Long algebraic
    // =====================================================================

    /// Encode a move in long algebraic notation (full origin square).
    pub fn encode_long_algebraic(&self, m: &Move) -> String {
        let check = self.check_suffix(m);
        if m.flags.is_king_side_castle() {
            return format!("O-O{check}");
        }
        if m.flags.is_queen_side_castle() {
            return format!("O-O-O{check}");
        }
        let piece = self
            .board()
            .piece_at(m.from)
            .map(|(_, pt)| pt)
            .unwrap_or(PieceType::Pawn);
        let mut out = String::with_capacity(8);
        if let Some(c) = piece.san_char() {
            out.push(c);
        }
        out.push_str(&m.from.to_algebraic());
        if m.flags.is_capture() || m.flags.is_en_passant() {
            out.push('x');
        }
        out.push_str(&m.to.to_algebraic());
        if let Some(promo) = m.promotion {
            out.push('=');
            out.push(promo.san_char().expect("promotion piece has a SAN letter"));
        }
        out.push_str(&check);
        out
    }

    /// Decode long algebraic notation; the SAN decoder accepts it.
    pub fn decode_long_algebraic(&self, s: &str) -> Result<Move, ChessError> {
        self.decode_san(s)
    }

    // =====================================================================
    // UCI
    // =====================================================================

    /// Encode a move as `<from><to>[promo]` (e.g. `e2e4`, `e7e8q`).
    pub fn encode_uci(&self, m: &Move) -> String {
        let mut out = String::with_capacity(5);
        out.push_str(&m.from.to_algebraic());
        out.push_str(&m.to.to_algebraic());
        if let Some(promo) = m.promotion {
            out.push(promo.to_char(crate::types::Color::Black));
        }
        out
    }

    /// Decode a 4- or 5-character UCI move. Castling is recognised by the
    /// king moving two files from its home square; en passant by a pawn
    /// landing on the en-passant target.
    pub fn decode_uci(&self, s: &str) -> Result<Move, ChessError> {
        let invalid = || ChessError::InvalidNotation {
            text: s.to_string(),
            reason: format!("invalid UCI move for position {self}"),
        };
        if !s.is_ascii() || !(4..=5).contains(&s.len()) {
            return Err(invalid());
        }
        let from = Square::from_algebraic(&s[0..2]).ok_or_else(invalid)?;
        let to = Square::from_algebraic(&s[2..4]).ok_or_else(invalid)?;
        let promotion = if s.len() == 5 {
            let c = s.as_bytes()[4] as char;
            Some(PieceType::from_promo_char(c).ok_or_else(invalid)?)
        } else {
            None
        };

        let mut m = Move {
            from,
            to,
            promotion,
            flags: MoveFlags::NONE,
        };

        if let Some((color, piece)) = self.board().piece_at(from) {
            if piece == PieceType::King {
                if (from == Square::E1 && to == Square::G1)
                    || (from == Square::E8 && to == Square::G8)
                {
                    m.flags.insert(MoveFlags::KING_SIDE_CASTLE);
                } else if (from == Square::E1 && to == Square::C1)
                    || (from == Square::E8 && to == Square::C8)
                {
                    m.flags.insert(MoveFlags::QUEEN_SIDE_CASTLE);
                }
            } else if piece == PieceType::Pawn && Some(to) == self.en_passant_square() {
                m.flags.insert(MoveFlags::EN_PASSANT);
                m.flags.insert(MoveFlags::CAPTURE);
            }
            if let Some((victim_color, _)) = self.board().piece_at(to)
                && victim_color != color
            {
                m.flags.insert(MoveFlags::CAPTURE);
            }
        }

        Ok(m)
    }
}

// =========================================================================
// Permissive SAN parts parser
// =========================================================================

/// The parts of a SAN string, each kept in its textual form so the decoder
/// can recombine them.
///
/// Accepts the language
/// `(piece? file? rank? 'x'? dest (=promo)? | castling) annotation*`
/// where annotations are `+`, `#`, `!`, `?`, or `e.p.`.
#[derive(Debug, Default, PartialEq, Eq)]
struct SanParts {
    piece: String,
    origin_file: String,
    origin_rank: String,
    capture: String,
    dest_file: String,
    dest_rank: String,
    promo: String,
    castle: String,
}

impl SanParts {
    /// The input with annotations stripped — canonical-ordering of what the
    /// writer supplied.
    fn cleaned(&self) -> String {
        format!(
            "{}{}{}{}{}{}{}{}",
            self.piece,
            self.origin_file,
            self.origin_rank,
            self.capture,
            self.dest_file,
            self.dest_rank,
            self.promo,
            self.castle
        )
    }
}

fn san_parts(s: &str) -> Option<SanParts> {
    if !s.is_ascii() {
        return None;
    }

    // Strip trailing annotations.
    let mut rest = s;
    loop {
        if let Some(r) = rest.strip_suffix("e.p.") {
            rest = r;
        } else if let Some(r) = rest.strip_suffix(['+', '#', '!', '?']) {
            rest = r;
        } else {
            break;
        }
    }

    // Castling spellings. Anything longer ("O-O-O-O") is not a move.
    if rest == "O-O-O" || rest == "O-O" {
        return Some(SanParts {
            castle: rest.to_string(),
            ..SanParts::default()
        });
    }

    // Optional promotion suffix.
    let mut promo = String::new();
    let bytes = rest.as_bytes();
    if bytes.len() >= 2 && bytes[bytes.len() - 2] == b'=' {
        if !matches!(bytes[bytes.len() - 1], b'Q' | b'R' | b'B' | b'N') {
            return None;
        }
        promo = rest[rest.len() - 2..].to_string();
        rest = &rest[..rest.len() - 2];
    }

    // The destination square is mandatory.
    if rest.len() < 2 {
        return None;
    }
    let dest = &rest.as_bytes()[rest.len() - 2..];
    if !(dest[0].is_ascii_lowercase() && (b'a'..=b'h').contains(&dest[0]))
        || !(b'1'..=b'8').contains(&dest[1])
    {
        return None;
    }
    let dest_file = (dest[0] as char).to_string();
    let dest_rank = (dest[1] as char).to_string();
    let head = &rest.as_bytes()[..rest.len() - 2];

    // The head holds, in order: piece letter, origin file, origin rank,
    // capture marker — each optional, nothing else allowed.
    let mut parts = SanParts {
        dest_file,
        dest_rank,
        promo,
        ..SanParts::default()
    };
    let mut i = 0;
    if i < head.len() && matches!(head[i], b'R' | b'N' | b'B' | b'Q' | b'K' | b'P') {
        parts.piece = (head[i] as char).to_string();
        i += 1;
    }
    if i < head.len() && (b'a'..=b'h').contains(&head[i]) {
        parts.origin_file = (head[i] as char).to_string();
        i += 1;
    }
    if i < head.len() && (b'1'..=b'8').contains(&head[i]) {
        parts.origin_rank = (head[i] as char).to_string();
        i += 1;
    }
    if i < head.len() && head[i] == b'x' {
        parts.capture = "x".to_string();
        i += 1;
    }
    if i != head.len() {
        return None;
    }
    Some(parts)
}

// =========================================================================
// Tests
// =========================================================================
