//! A single chess game: move history, positions, tag pairs, and outcome.
//!
//! `Game` validates moves against the legal-move list, tracks every position
//! reached for repetition counting, and detects terminal states after each
//! move. Player-claimed draws (threefold, fifty-move) are validated before
//! they take effect; automatic draws (fivefold, 75-move, insufficient
//! material) apply on their own unless suppressed, which the PGN decoder
//! does because PGN outcome tokens are authoritative.

use std::fmt;
use std::io::Read;

use crate::notation::Notation;
use crate::pgn;
use crate::position::Position;
use crate::types::{ChessError, Color, Method, Move, Outcome};

// =========================================================================
// TagPair
// =========================================================================

/// PGN metadata in a key-value pairing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagPair {
    pub key: String,
    pub value: String,
}

// =========================================================================
// Game
// =========================================================================

/// A complete chess game.
///
/// `positions()[i]` is the position *before* `moves()[i]`; the last entry is
/// the current position.
#[derive(Clone, Debug)]
pub struct Game {
    /// Notation used when exporting the move text.
    pub notation: Notation,
    tag_pairs: Vec<TagPair>,
    moves: Vec<Move>,
    positions: Vec<Position>,
    outcome: Outcome,
    method: Method,
    ignore_automatic_draws: bool,
}

impl Game {
    // -----------------------------------------------------------------
    // Constructors
    // -----------------------------------------------------------------

    /// A new game from the standard starting position.
    pub fn new() -> Self {
        Game {
            notation: Notation::San,
            tag_pairs: Vec::new(),
            moves: Vec::new(),
            positions: vec![Position::starting()],
            outcome: Outcome::InProgress,
            method: Method::NoMethod,
            ignore_automatic_draws: false,
        }
    }

    /// A game starting from a FEN position. The move list starts empty since
    /// FEN doesn't encode prior moves.
    pub fn from_fen(fen: &str) -> Result<Self, ChessError> {
        let pos = Position::from_fen(fen)?;
        let mut game = Game {
            notation: Notation::San,
            tag_pairs: Vec::new(),
            moves: Vec::new(),
            positions: vec![pos],
            outcome: Outcome::InProgress,
            method: Method::NoMethod,
            ignore_automatic_draws: false,
        };
        game.update_position();
        Ok(game)
    }

    /// Decode a single PGN game.
    pub fn from_pgn(pgn_text: &str) -> Result<Self, ChessError> {
        pgn::decode_pgn(pgn_text)
    }

    /// Decode a single PGN game from a reader.
    pub fn from_reader(mut reader: impl Read) -> Result<Self, ChessError> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        pgn::decode_pgn(&text)
    }

    // -----------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------

    /// The current position.
    pub fn position(&self) -> &Position {
        self.positions.last().expect("a game always has a position")
    }

    /// The position history, starting position first.
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// The move history.
    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    /// Legal moves in the current position.
    pub fn valid_moves(&self) -> Vec<Move> {
        self.position().valid_moves()
    }

    /// The game outcome.
    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// How the outcome came about.
    pub fn method(&self) -> Method {
        self.method
    }

    /// The current position's FEN.
    pub fn fen(&self) -> String {
        self.position().to_fen()
    }

    // -----------------------------------------------------------------
    // Making moves
    // -----------------------------------------------------------------

    /// Play a move. The move is matched against the legal-move list by
    /// origin, destination, and promotion; the canonical generated move
    /// (with its tags) is what gets recorded.
    pub fn make_move(&mut self, m: &Move) -> Result<(), ChessError> {
        let canonical = self
            .position()
            .valid_moves()
            .into_iter()
            .find(|vm| vm == m)
            .ok_or_else(|| ChessError::InvalidMove(m.to_string()))?;

        let next = self.position().update(&canonical);
        self.moves.push(canonical);
        self.positions.push(next);
        self.update_position();
        Ok(())
    }

    /// Decode a move string (SAN, long algebraic, or UCI) and play it.
    pub fn make_move_str(&mut self, s: &str) -> Result<(), ChessError> {
        let m = self.position().decode_move(s)?;
        self.make_move(&m)
    }

    // -----------------------------------------------------------------
    // Outcome handling
    // -----------------------------------------------------------------

    /// Claim a draw by the given method. `ThreefoldRepetition` and
    /// `FiftyMoveRule` are validated against the game state; `DrawOffer`
    /// always succeeds. Failed claims leave the game unchanged.
    pub fn draw(&mut self, method: Method) -> Result<(), ChessError> {
        match method {
            Method::ThreefoldRepetition => {
                if self.num_repetitions() < 3 {
                    return Err(ChessError::InvalidDraw {
                        method,
                        reason: "requires at least three repetitions of the current board state"
                            .to_string(),
                    });
                }
            }
            Method::FiftyMoveRule => {
                let clock = self.position().halfmove_clock();
                if clock < 100 {
                    return Err(ChessError::InvalidDraw {
                        method,
                        reason: format!(
                            "requires the half-move clock to be at 100 or greater but is {clock}"
                        ),
                    });
                }
            }
            Method::DrawOffer => {}
            other => {
                return Err(ChessError::InvalidDraw {
                    method: other,
                    reason: "unsupported draw method".to_string(),
                });
            }
        }
        self.outcome = Outcome::Draw;
        self.method = method;
        Ok(())
    }

    /// Resign the game for the given colour. Completed games are unchanged.
    pub fn resign(&mut self, color: Color) {
        if self.outcome != Outcome::InProgress {
            return;
        }
        self.outcome = match color {
            Color::White => Outcome::BlackWon,
            Color::Black => Outcome::WhiteWon,
        };
        self.method = Method::Resignation;
    }

    /// Valid inputs for [`Game::draw`] right now.
    pub fn eligible_draws(&self) -> Vec<Method> {
        let mut draws = vec![Method::DrawOffer];
        if self.num_repetitions() >= 3 {
            draws.push(Method::ThreefoldRepetition);
        }
        if self.position().halfmove_clock() >= 100 {
            draws.push(Method::FiftyMoveRule);
        }
        draws
    }

    // -----------------------------------------------------------------
    // Tag pairs
    // -----------------------------------------------------------------

    /// Add or update a tag pair; returns true when an existing value was
    /// overwritten. Keys are case-sensitive.
    pub fn add_tag_pair(&mut self, key: &str, value: &str) -> bool {
        if let Some(existing) = self.tag_pairs.iter_mut().find(|tp| tp.key == key) {
            existing.value = value.to_string();
            return true;
        }
        self.tag_pairs.push(TagPair {
            key: key.to_string(),
            value: value.to_string(),
        });
        false
    }

    /// The tag pair for a key, if present.
    pub fn tag_pair(&self, key: &str) -> Option<&TagPair> {
        self.tag_pairs.iter().find(|tp| tp.key == key)
    }

    /// Remove the tag pair for a key; returns true if one was removed.
    pub fn remove_tag_pair(&mut self, key: &str) -> bool {
        let before = self.tag_pairs.len();
        self.tag_pairs.retain(|tp| tp.key != key);
        self.tag_pairs.len() != before
    }

    /// All tag pairs, in insertion order.
    pub fn tag_pairs(&self) -> &[TagPair] {
        &self.tag_pairs
    }

    // -----------------------------------------------------------------
    // History
    // -----------------------------------------------------------------

    /// The moves in order, each with its pre and post positions.
    pub fn move_history(&self) -> Vec<MoveHistoryEntry<'_>> {
        self.moves
            .iter()
            .enumerate()
            .map(|(i, m)| MoveHistoryEntry {
                pre_position: &self.positions[i],
                post_position: &self.positions[i + 1],
                mv: m,
            })
            .collect()
    }

    // -----------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------

    /// Detect terminal states after a move (or initial load): checkmate and
    /// stalemate always apply; the automatic draws apply unless suppressed.
    fn update_position(&mut self) {
        match self.position().status() {
            Method::Stalemate => {
                self.method = Method::Stalemate;
                self.outcome = Outcome::Draw;
            }
            Method::Checkmate => {
                self.method = Method::Checkmate;
                self.outcome = match self.position().turn() {
                    Color::White => Outcome::BlackWon,
                    Color::Black => Outcome::WhiteWon,
                };
            }
            _ => {}
        }
        if self.outcome != Outcome::InProgress {
            return;
        }

        if !self.ignore_automatic_draws && self.num_repetitions() >= 5 {
            self.outcome = Outcome::Draw;
            self.method = Method::FivefoldRepetition;
        }

        if !self.ignore_automatic_draws
            && self.position().halfmove_clock() >= 150
            && self.method != Method::Checkmate
        {
            self.outcome = Outcome::Draw;
            self.method = Method::SeventyFiveMoveRule;
        }

        if !self.ignore_automatic_draws && !self.position().board().has_sufficient_material() {
            self.outcome = Outcome::Draw;
            self.method = Method::InsufficientMaterial;
        }
    }

    /// How many positions in the game history equal the current position
    /// (board, turn, castling rights, en-passant square — clocks ignored).
    fn num_repetitions(&self) -> usize {
        let current = self.position();
        self.positions
            .iter()
            .filter(|p| current.same_position(p))
            .count()
    }

    pub(crate) fn set_ignore_automatic_draws(&mut self, ignore: bool) {
        self.ignore_automatic_draws = ignore;
    }

    pub(crate) fn set_outcome(&mut self, outcome: Outcome) {
        self.outcome = outcome;
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Game {
    /// The game's PGN.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", pgn::encode_pgn(self))
    }
}

/// One entry of [`Game::move_history`].
#[derive(Clone, Copy, Debug)]
pub struct MoveHistoryEntry<'a> {
    pub pre_position: &'a Position,
    pub post_position: &'a Position,
    pub mv: &'a Move,
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn play(game: &mut Game, moves: &[&str]) {
        for san in moves {
            game.make_move_str(san)
                .unwrap_or_else(|e| panic!("can't play {san}: {e}"));
        }
    }

    // -----------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------

    #[test]
    fn new_game_in_progress() {
        let g = Game::new();
        assert_eq!(g.outcome(), Outcome::InProgress);
        assert_eq!(g.method(), Method::NoMethod);
        assert_eq!(g.positions().len(), 1);
        assert!(g.moves().is_empty());
    }

    #[test]
    fn from_fen_black_to_move() {
        let g = Game::from_fen("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1")
            .unwrap();
        assert_eq!(g.position().turn(), Color::Black);
    }

    #[test]
    fn from_invalid_fen_errors() {
        assert!(Game::from_fen("not a fen").is_err());
    }

    // -----------------------------------------------------------------
    // Moves and validation
    // -----------------------------------------------------------------

    #[test]
    fn history_invariant_holds() {
        let mut g = Game::new();
        play(&mut g, &["e4", "e5", "Nf3"]);
        assert_eq!(g.moves().len(), 3);
        assert_eq!(g.positions().len(), 4);
        for (i, entry) in g.move_history().into_iter().enumerate() {
            assert_eq!(
                entry.pre_position.update(entry.mv).to_fen(),
                g.positions()[i + 1].to_fen()
            );
        }
    }

    #[test]
    fn illegal_move_rejected() {
        let mut g = Game::new();
        let m = Move::new(
            crate::types::Square::from_algebraic("e2").unwrap(),
            crate::types::Square::from_algebraic("e5").unwrap(),
        );
        assert!(g.make_move(&m).is_err());
        assert!(g.moves().is_empty());
    }

    #[test]
    fn bare_move_matches_canonical_tags() {
        let mut g = Game::from_fen("r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1").unwrap();
        // A caller-constructed move without flags still matches the castle.
        let m = Move::new(
            crate::types::Square::E1,
            crate::types::Square::G1,
        );
        g.make_move(&m).unwrap();
        assert!(g.moves()[0].flags.is_king_side_castle());
        // The rook came along, and losing the rights resets the clock.
        assert_eq!(
            g.position().to_fen(),
            "r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R4RK1 b kq - 0 1"
        );
    }

    // -----------------------------------------------------------------
    // Checkmate and stalemate
    // -----------------------------------------------------------------

    #[test]
    fn scholars_mate() {
        let mut g = Game::new();
        play(&mut g, &["e4", "e5", "Bc4", "Nc6", "Qh5", "Nf6", "Qxf7#"]);
        assert_eq!(g.outcome(), Outcome::WhiteWon);
        assert_eq!(g.method(), Method::Checkmate);
        assert_eq!(
            g.fen(),
            "r1bqkb1r/pppp1Qpp/2n2n2/4p3/2B1P3/8/PPPP1PPP/RNB1K1NR b KQkq - 0 4"
        );
    }

    #[test]
    fn fools_mate_black_wins() {
        let mut g = Game::new();
        play(&mut g, &["f3", "e5", "g4", "Qh4#"]);
        assert_eq!(g.outcome(), Outcome::BlackWon);
        assert_eq!(g.method(), Method::Checkmate);
    }

    #[test]
    fn stalemate_is_draw() {
        let g = Game::from_fen("k7/2K5/1Q6/8/8/8/8/8 b - - 0 1").unwrap();
        assert_eq!(g.outcome(), Outcome::Draw);
        assert_eq!(g.method(), Method::Stalemate);
    }

    #[test]
    fn no_moves_accepted_after_checkmate() {
        let mut g = Game::new();
        play(&mut g, &["f3", "e5", "g4", "Qh4#"]);
        assert!(g.make_move_str("a3").is_err());
    }

    // -----------------------------------------------------------------
    // En passant through the game layer
    // -----------------------------------------------------------------

    #[test]
    fn en_passant_capture() {
        let mut g =
            Game::from_fen("rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3")
                .unwrap();
        g.make_move_str("exf6").unwrap();
        // The black pawn on f5 is gone.
        assert!(g.position().board().piece_at(
            crate::types::Square::from_algebraic("f5").unwrap()
        ).is_none());
        assert!(g.moves()[0].flags.is_en_passant());
    }

    // -----------------------------------------------------------------
    // Draw claims
    // -----------------------------------------------------------------

    #[test]
    fn threefold_repetition_claim() {
        let mut g = Game::new();
        play(
            &mut g,
            &["Nf3", "Nf6", "Ng1", "Ng8", "Nf3", "Nf6", "Ng1", "Ng8"],
        );
        assert_eq!(g.outcome(), Outcome::InProgress);
        assert!(g.eligible_draws().contains(&Method::ThreefoldRepetition));
        g.draw(Method::ThreefoldRepetition).unwrap();
        assert_eq!(g.outcome(), Outcome::Draw);
        assert_eq!(g.method(), Method::ThreefoldRepetition);
    }

    #[test]
    fn threefold_claim_too_early_fails() {
        let mut g = Game::new();
        play(&mut g, &["Nf3", "Nf6", "Ng1", "Ng8"]);
        assert!(g.draw(Method::ThreefoldRepetition).is_err());
        assert_eq!(g.outcome(), Outcome::InProgress);
    }

    #[test]
    fn fifty_move_claim_validated() {
        let mut g = Game::from_fen("4k3/8/8/8/8/8/4R3/4K3 w - - 99 80").unwrap();
        assert!(g.draw(Method::FiftyMoveRule).is_err());
        assert_eq!(g.outcome(), Outcome::InProgress);

        let mut g = Game::from_fen("4k3/8/8/8/8/8/4R3/4K3 w - - 100 80").unwrap();
        assert!(g.eligible_draws().contains(&Method::FiftyMoveRule));
        g.draw(Method::FiftyMoveRule).unwrap();
        assert_eq!(g.method(), Method::FiftyMoveRule);
    }

    #[test]
    fn draw_offer_always_allowed() {
        let mut g = Game::new();
        g.draw(Method::DrawOffer).unwrap();
        assert_eq!(g.outcome(), Outcome::Draw);
        assert_eq!(g.method(), Method::DrawOffer);
    }

    #[test]
    fn unsupported_draw_method_rejected() {
        let mut g = Game::new();
        assert!(g.draw(Method::Checkmate).is_err());
        assert!(g.draw(Method::FivefoldRepetition).is_err());
        assert_eq!(g.outcome(), Outcome::InProgress);
    }

    // -----------------------------------------------------------------
    // Automatic draws
    // -----------------------------------------------------------------

    #[test]
    fn fivefold_repetition_automatic() {
        let mut g = Game::new();
        for _ in 0..4 {
            play(&mut g, &["Nf3", "Nf6", "Ng1", "Ng8"]);
        }
        assert_eq!(g.outcome(), Outcome::Draw);
        assert_eq!(g.method(), Method::FivefoldRepetition);
    }

    #[test]
    fn seventy_five_move_rule_automatic() {
        let g = Game::from_fen("4k3/8/8/8/8/8/4R3/4K3 w - - 150 80").unwrap();
        assert_eq!(g.outcome(), Outcome::Draw);
        assert_eq!(g.method(), Method::SeventyFiveMoveRule);
    }

    #[test]
    fn insufficient_material_automatic() {
        let g = Game::from_fen("4k3/8/8/8/8/8/8/4KB2 w - - 0 1").unwrap();
        assert_eq!(g.outcome(), Outcome::Draw);
        assert_eq!(g.method(), Method::InsufficientMaterial);
    }

    #[test]
    fn suppressed_automatic_draws() {
        let mut g = Game::from_fen("4k3/8/8/8/8/8/8/4KB2 w - - 0 1").unwrap();
        assert_eq!(g.outcome(), Outcome::Draw);
        g.set_ignore_automatic_draws(true);
        g.set_outcome(Outcome::InProgress);
        g.make_move_str("Bc4").unwrap();
        assert_eq!(g.outcome(), Outcome::InProgress);
    }

    // -----------------------------------------------------------------
    // Resignation
    // -----------------------------------------------------------------

    #[test]
    fn resignation() {
        let mut g = Game::new();
        g.resign(Color::White);
        assert_eq!(g.outcome(), Outcome::BlackWon);
        assert_eq!(g.method(), Method::Resignation);

        // A finished game can't be resigned again.
        g.resign(Color::Black);
        assert_eq!(g.outcome(), Outcome::BlackWon);
    }

    // -----------------------------------------------------------------
    // Tag pairs
    // -----------------------------------------------------------------

    #[test]
    fn tag_pair_add_get_remove() {
        let mut g = Game::new();
        assert!(!g.add_tag_pair("Site", "lichess.org"));
        assert!(g.add_tag_pair("Site", "chess.com"));
        assert_eq!(g.tag_pair("Site").unwrap().value, "chess.com");
        assert!(g.tag_pair("site").is_none(), "keys are case-sensitive");
        assert!(g.remove_tag_pair("Site"));
        assert!(!g.remove_tag_pair("Site"));
    }
}
