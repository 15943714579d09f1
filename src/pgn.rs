//! PGN (Portable Game Notation) decoding and encoding.
//!
//! A PGN record is a block of `[Key "Value"]` tag pairs, a blank line, and a
//! move-text block terminated by an outcome token. The tokenizer recognises
//! move-number indicators, SAN tokens, brace comments, parenthesised
//! variations (discarded), and outcome tokens; anything else (NAGs and
//! similar) is skipped.

use crate::game::{Game, TagPair};
use crate::types::{ChessError, Outcome};

// =========================================================================
// Decode
// =========================================================================

/// Decode a single PGN game.
///
/// When a `FEN` tag is present (matched case-insensitively) the game starts
/// from that position. Automatic draws are suppressed during replay — the
/// PGN outcome token is authoritative and overrides any computed outcome.
pub fn decode_pgn(pgn: &str) -> Result<Game, ChessError> {
    let tags = tag_pairs(pgn);
    let (tokens, outcome) = move_tokens(&strip_tag_pairs(pgn));

    let mut game = match tags.iter().find(|tp| tp.key.eq_ignore_ascii_case("fen")) {
        Some(tp) => Game::from_fen(&tp.value)
            .map_err(|e| ChessError::InvalidPgn(format!("error {e} on tag {}", tp.key)))?,
        None => Game::new(),
    };
    for tp in &tags {
        game.add_tag_pair(&tp.key, &tp.value);
    }
    game.set_ignore_automatic_draws(true);

    for token in &tokens {
        let m = game.position().decode_move(token).map_err(|e| {
            ChessError::InvalidPgn(format!(
                "error {e} on move {}",
                game.position().fullmove_number()
            ))
        })?;
        game.make_move(&m).map_err(|e| {
            ChessError::InvalidPgn(format!(
                "invalid move error {e} on move {}",
                game.position().fullmove_number()
            ))
        })?;
    }

    if let Some(outcome) = outcome {
        game.set_outcome(outcome);
    }
    Ok(game)
}

// =========================================================================
// Encode
// =========================================================================

/// Encode a game as PGN: tag pairs, a blank line, numbered move text, and
/// the outcome token.
pub fn encode_pgn(game: &Game) -> String {
    let mut out = String::with_capacity(256);
    for tp in game.tag_pairs() {
        out.push_str(&format!("[{} \"{}\"]\n", tp.key, tp.value));
    }
    out.push('\n');
    for (i, entry) in game.move_history().iter().enumerate() {
        let text = entry.pre_position.encode_move(entry.mv, game.notation);
        if i % 2 == 0 {
            out.push_str(&format!("{}. {}", i / 2 + 1, text));
        } else {
            out.push_str(&format!(" {} ", text));
        }
    }
    out.push(' ');
    out.push_str(game.outcome().as_str());
    out
}

// =========================================================================
// Tag pairs
// =========================================================================

/// Extract `[Key "Value"]` tag pairs, one per line.
pub(crate) fn tag_pairs(pgn: &str) -> Vec<TagPair> {
    let mut out = Vec::new();
    for line in pgn.lines() {
        let line = line.trim();
        if !(line.starts_with('[') && line.ends_with(']')) {
            continue;
        }
        let inner = &line[1..line.len() - 1];
        let Some(first_quote) = inner.find('"') else {
            continue;
        };
        let last_quote = inner.rfind('"').expect("find succeeded above");
        if last_quote <= first_quote {
            continue;
        }
        let key = inner[..first_quote].trim();
        if key.is_empty() {
            continue;
        }
        out.push(TagPair {
            key: key.to_string(),
            value: inner[first_quote + 1..last_quote].to_string(),
        });
    }
    out
}

/// Drop tag-pair lines and blank lines, keeping only the move text.
fn strip_tag_pairs(pgn: &str) -> String {
    pgn.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('['))
        .collect::<Vec<_>>()
        .join("\n")
}

// =========================================================================
// Move-list tokenizer
// =========================================================================

/// Tokenize move text into SAN tokens and the terminating outcome token.
/// Comments and variations are consumed and discarded; move-number
/// indicators and unrecognised words are skipped. Tokenizing stops at the
/// first outcome token.
pub(crate) fn move_tokens(text: &str) -> (Vec<String>, Option<Outcome>) {
    let bytes = text.as_bytes();
    let mut moves = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' => {
                // Brace comment: consume to the closing brace.
                i += 1;
                while i < bytes.len() && bytes[i] != b'}' {
                    i += 1;
                }
                i += 1;
            }
            b'(' => {
                // Variation: consume and discard.
                i += 1;
                while i < bytes.len() && bytes[i] != b')' {
                    i += 1;
                }
                i += 1;
            }
            b if b.is_ascii_whitespace() => i += 1,
            _ => {
                let start = i;
                while i < bytes.len()
                    && !bytes[i].is_ascii_whitespace()
                    && bytes[i] != b'{'
                    && bytes[i] != b'('
                {
                    i += 1;
                }
                let word = &text[start..i];

                if let Some(outcome) = Outcome::from_token(word) {
                    return (moves, Some(outcome));
                }
                // Words like "12.", "3...", or "1.e4" carry a move-number
                // indicator before the (optional) SAN token.
                let rest = strip_move_number(word);
                if rest.is_empty() {
                    continue;
                }
                if let Some(outcome) = Outcome::from_token(rest) {
                    return (moves, Some(outcome));
                }
                if let Some(token) = san_token(rest) {
                    moves.push(token.to_string());
                }
            }
        }
    }
    (moves, None)
}

/// Strip a leading `\d+\.*` move-number indicator.
fn strip_move_number(word: &str) -> &str {
    let bytes = word.as_bytes();
    if bytes.is_empty() || !bytes[0].is_ascii_digit() {
        return word;
    }
    let mut i = 0;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let digits_end = i;
    while i < bytes.len() && bytes[i] == b'.' {
        i += 1;
    }
    // Digits not followed by a dot are something else entirely (an outcome
    // fragment, junk) — leave the word alone for the caller to classify.
    if i == digits_end {
        return word;
    }
    &word[i..]
}

/// Classify a word as a SAN token, stripping quality annotations the move
/// parser has no use for. Returns `None` for non-move words (NAGs, junk).
fn san_token(word: &str) -> Option<&str> {
    let mut rest = word;
    loop {
        if let Some(r) = rest.strip_suffix("e.p.") {
            rest = r;
        } else if let Some(r) = rest.strip_suffix(['!', '?']) {
            rest = r;
        } else {
            break;
        }
    }
    if rest.is_empty() {
        return None;
    }

    // Castling words pass through whole — the decoder validates the exact
    // spelling (and rejects oddities like "O-O-O-O").
    if rest.starts_with("O-O") || rest.starts_with("0-0") {
        return Some(rest);
    }

    // A SAN token holds a destination square and only word characters plus
    // the promotion and check markers.
    let bytes = rest.as_bytes();
    let has_square = bytes
        .windows(2)
        .any(|w| (b'a'..=b'h').contains(&w[0]) && (b'1'..=b'8').contains(&w[1]));
    if !has_square {
        return None;
    }
    if bytes
        .iter()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'=' | b'+' | b'#'))
    {
        Some(rest)
    } else {
        None
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Method;

    // -----------------------------------------------------------------
    // Tag pairs
    // -----------------------------------------------------------------

    #[test]
    fn tag_pairs_extracted() {
        let pgn = "[Event \"Casual Game\"]\n[Site \"https://lichess.org/abcd1234\"]\n\n1. e4 *";
        let tags = tag_pairs(pgn);
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].key, "Event");
        assert_eq!(tags[0].value, "Casual Game");
        assert_eq!(tags[1].key, "Site");
        assert_eq!(tags[1].value, "https://lichess.org/abcd1234");
    }

    #[test]
    fn tag_pairs_ignore_move_text() {
        let tags = tag_pairs("1. e4 e5 2. Nf3 1-0");
        assert!(tags.is_empty());
    }

    #[test]
    fn strip_tag_pairs_keeps_moves() {
        let pgn = "[Event \"x\"]\n\n1. e4 e5 *\n";
        assert_eq!(strip_tag_pairs(pgn), "1. e4 e5 *");
    }

    // -----------------------------------------------------------------
    // Tokenizer
    // -----------------------------------------------------------------

    #[test]
    fn tokenizer_basic_moves() {
        let (moves, outcome) = move_tokens("1. e4 e5 2. Nf3 Nc6 1/2-1/2");
        assert_eq!(moves, vec!["e4", "e5", "Nf3", "Nc6"]);
        assert_eq!(outcome, Some(Outcome::Draw));
    }

    #[test]
    fn tokenizer_attached_move_numbers() {
        let (moves, _) = move_tokens("1.e4 e5 2.Nf3 3... Nf6 *");
        assert_eq!(moves, vec!["e4", "e5", "Nf3", "Nf6"]);
    }

    #[test]
    fn tokenizer_discards_comments_and_variations() {
        let (moves, outcome) =
            move_tokens("1. e4 {best by test} e5 (1... c5 {the Sicilian}) 2. Nf3 *");
        assert_eq!(moves, vec!["e4", "e5", "Nf3"]);
        assert_eq!(outcome, Some(Outcome::InProgress));
    }

    #[test]
    fn tokenizer_multiline_comment() {
        let (moves, _) = move_tokens("1. e4 {spans\nlines} e5 *");
        assert_eq!(moves, vec!["e4", "e5"]);
    }

    #[test]
    fn tokenizer_skips_nags_and_junk() {
        let (moves, _) = move_tokens("1. e4 $1 e5 $14 2. d4?! exd4 *");
        assert_eq!(moves, vec!["e4", "e5", "d4", "exd4"]);
    }

    #[test]
    fn tokenizer_stops_at_outcome() {
        let (moves, outcome) = move_tokens("1. e4 e5 1-0 2. Nf3");
        assert_eq!(moves, vec!["e4", "e5"]);
        assert_eq!(outcome, Some(Outcome::WhiteWon));
    }

    #[test]
    fn tokenizer_castling_and_promotions() {
        let (moves, _) = move_tokens("1. O-O O-O-O 2. e8=Q+ bxa1=N# *");
        assert_eq!(moves, vec!["O-O", "O-O-O", "e8=Q+", "bxa1=N#"]);
    }

    #[test]
    fn tokenizer_passes_quadruple_castle_to_decoder() {
        let (moves, _) = move_tokens("1. O-O-O-O *");
        assert_eq!(moves, vec!["O-O-O-O"]);
    }

    #[test]
    fn tokenizer_no_outcome() {
        let (moves, outcome) = move_tokens("1. e4 e5");
        assert_eq!(moves, vec!["e4", "e5"]);
        assert_eq!(outcome, None);
    }

    // -----------------------------------------------------------------
    // Decode
    // -----------------------------------------------------------------

    #[test]
    fn decode_short_game() {
        let pgn = "[Event \"Casual\"]\n[Site \"here\"]\n\n1. e4 e5 2. Nf3 Nc6 *\n";
        let game = decode_pgn(pgn).unwrap();
        assert_eq!(game.moves().len(), 4);
        assert_eq!(game.outcome(), Outcome::InProgress);
        assert_eq!(game.tag_pair("Site").unwrap().value, "here");
    }

    #[test]
    fn decode_scholars_mate() {
        let pgn = "1. e4 e5 2. Bc4 Nc6 3. Qh5 Nf6 4. Qxf7# 1-0\n";
        let game = decode_pgn(pgn).unwrap();
        assert_eq!(game.outcome(), Outcome::WhiteWon);
        assert_eq!(game.method(), Method::Checkmate);
        assert_eq!(
            game.fen(),
            "r1bqkb1r/pppp1Qpp/2n2n2/4p3/2B1P3/8/PPPP1PPP/RNB1K1NR b KQkq - 0 4"
        );
    }

    #[test]
    fn decode_fen_tag_starts_from_position() {
        let pgn = "[FEN \"rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3\"]\n\n3. exf6 *\n";
        let game = decode_pgn(pgn).unwrap();
        assert_eq!(game.moves().len(), 1);
        assert!(game.moves()[0].flags.is_en_passant());
    }

    #[test]
    fn decode_fen_tag_case_insensitive() {
        let pgn = "[fen \"4k3/8/8/8/8/8/4R3/4K3 w - - 0 1\"]\n\n1. Re7+ *\n";
        let game = decode_pgn(pgn).unwrap();
        assert_eq!(game.moves().len(), 1);
    }

    #[test]
    fn decode_outcome_token_is_authoritative() {
        // The moves don't finish the game, but the token does.
        let game = decode_pgn("1. e4 e5 0-1\n").unwrap();
        assert_eq!(game.outcome(), Outcome::BlackWon);
        assert_eq!(game.method(), Method::NoMethod);
    }

    #[test]
    fn decode_suppresses_automatic_draws() {
        // Bare kings: insufficient material, but the PGN says play went on.
        let pgn = "[FEN \"4k3/8/8/8/8/8/8/4K3 w - - 0 1\"]\n\n1. Ke2 Ke7 *\n";
        let game = decode_pgn(pgn).unwrap();
        assert_eq!(game.outcome(), Outcome::InProgress);
        assert_eq!(game.moves().len(), 2);
    }

    #[test]
    fn decode_bad_move_is_an_error() {
        assert!(decode_pgn("1. e4 e5 2. Ke3 *\n").is_err());
        assert!(decode_pgn("1. O-O-O-O *\n").is_err());
    }

    #[test]
    fn decode_bad_fen_tag_is_an_error() {
        assert!(decode_pgn("[FEN \"garbage\"]\n\n1. e4 *\n").is_err());
    }

    // -----------------------------------------------------------------
    // Encode
    // -----------------------------------------------------------------

    #[test]
    fn encode_round_trips_through_decode() {
        let pgn = "[Event \"Casual\"]\n\n1. e4 e5 2. Nf3 Nc6 3. Bb5 a6 *\n";
        let game = decode_pgn(pgn).unwrap();
        let encoded = encode_pgn(&game);
        assert!(encoded.contains("[Event \"Casual\"]"));
        assert!(encoded.contains("1. e4"));
        assert!(encoded.ends_with('*'));

        let again = decode_pgn(&encoded).unwrap();
        assert_eq!(again.moves(), game.moves());
        assert_eq!(again.fen(), game.fen());
    }

    #[test]
    fn encode_includes_outcome_token() {
        let game = decode_pgn("1. f3 e5 2. g4 Qh4# 0-1\n").unwrap();
        let encoded = encode_pgn(&game);
        assert!(encoded.trim_end().ends_with("0-1"));
    }
}
