//! Game session orchestration.
//!
//! One move request runs the full pipeline: legality check, evaluation of
//! the position before the move, scratch-apply, evaluation after, quality
//! classification, then an atomic commit of position + history + opening
//! match. A failed evaluation at either step leaves the session untouched.

use std::collections::HashMap;

use shakmaty::{Chess, Color, Move, Position};
use tracing::info;

use chess_core::board::{
    apply_move, coordinate_to_move, normalize_fen, parse_fen, piece_name, ply_to_play,
    position_fen, replay_san, san_to_move, PlayedMove,
};
use chess_core::pgn;

use crate::classify::{classify, MoveFacts, QualityTier, Verdict};
use crate::error::CoachError;
use crate::eval::{Evaluation, PositionEvaluator};
use crate::openings::{OpeningMatch, OpeningMatcher};

/// A move request from the caller, in either notation.
#[derive(Debug, Clone)]
pub enum MoveRequest {
    /// Standard notation ("Nf3", "exd5", "O-O").
    San(String),
    /// Coordinate notation: origin, destination, optional promotion letter.
    Coordinate {
        from: String,
        to: String,
        promotion: Option<char>,
    },
}

impl MoveRequest {
    /// Parse user input: coordinate form when it looks like one ("e2e4",
    /// "e7e8q"), standard notation otherwise.
    pub fn parse(input: &str) -> Self {
        let token = input.trim();
        if is_coordinate(token) {
            MoveRequest::Coordinate {
                from: token[0..2].to_string(),
                to: token[2..4].to_string(),
                promotion: token.chars().nth(4),
            }
        } else {
            MoveRequest::San(token.to_string())
        }
    }
}

fn is_coordinate(token: &str) -> bool {
    let b = token.as_bytes();
    (b.len() == 4 || b.len() == 5)
        && (b'a'..=b'h').contains(&b[0])
        && (b'1'..=b'8').contains(&b[1])
        && (b'a'..=b'h').contains(&b[2])
        && (b'1'..=b'8').contains(&b[3])
        && (b.len() == 4 || matches!(b[4], b'q' | b'r' | b'b' | b'n'))
}

/// A move together with its quality verdict.
///
/// The tier is `None` only for history entries rebuilt by PGN import, which
/// records the moves without re-running classification.
#[derive(Debug, Clone)]
pub struct ClassifiedMove {
    pub mv: PlayedMove,
    pub tier: Option<QualityTier>,
    pub coaching: String,
}

/// Why a drawn game is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawReason {
    Stalemate,
    ThreefoldRepetition,
    InsufficientMaterial,
    Other,
}

/// Terminal result of a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameOutcome {
    Checkmate {
        winner: Color,
        headline: String,
        details: String,
    },
    Draw {
        reason: DrawReason,
        headline: String,
        details: String,
    },
}

impl GameOutcome {
    pub fn headline(&self) -> &str {
        match self {
            GameOutcome::Checkmate { headline, .. } => headline,
            GameOutcome::Draw { headline, .. } => headline,
        }
    }

    pub fn details(&self) -> &str {
        match self {
            GameOutcome::Checkmate { details, .. } => details,
            GameOutcome::Draw { details, .. } => details,
        }
    }
}

/// Everything the caller needs to show after a committed move.
#[derive(Debug, Clone)]
pub struct MoveReport {
    pub classified: ClassifiedMove,
    pub opening: OpeningMatch,
    /// Evaluation of the position after the move.
    pub evaluation: Evaluation,
    pub outcome: Option<GameOutcome>,
}

/// What an import parsed as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Fen,
    Pgn { moves: usize },
}

/// A coaching session over a single game.
pub struct GameSession<E> {
    evaluator: E,
    matcher: OpeningMatcher,
    position: Chess,
    history: Vec<ClassifiedMove>,
    /// Position before each history entry, for undo.
    previous: Vec<Chess>,
    /// Normalized-FEN occurrence counts, for threefold detection.
    repetition: HashMap<String, u32>,
    opening: OpeningMatch,
    last_eval: Option<Evaluation>,
    outcome: Option<GameOutcome>,
    analyzing: bool,
}

impl<E: PositionEvaluator> GameSession<E> {
    pub fn new(evaluator: E, matcher: OpeningMatcher) -> Self {
        let position = Chess::default();
        let mut repetition = HashMap::new();
        repetition.insert(normalize_fen(&position_fen(&position)), 1);
        Self {
            evaluator,
            matcher,
            position,
            history: Vec::new(),
            previous: Vec::new(),
            repetition,
            opening: OpeningMatch::start_position(),
            last_eval: None,
            outcome: None,
            analyzing: false,
        }
    }

    pub fn fen(&self) -> String {
        position_fen(&self.position)
    }

    pub fn position(&self) -> &Chess {
        &self.position
    }

    pub fn history(&self) -> &[ClassifiedMove] {
        &self.history
    }

    /// SAN of every move played, in order.
    pub fn san_history(&self) -> Vec<String> {
        self.history.iter().map(|c| c.mv.san.clone()).collect()
    }

    pub fn opening(&self) -> &OpeningMatch {
        &self.opening
    }

    pub fn outcome(&self) -> Option<&GameOutcome> {
        self.outcome.as_ref()
    }

    pub fn last_evaluation(&self) -> Option<&Evaluation> {
        self.last_eval.as_ref()
    }

    /// Play one move through the full pipeline.
    ///
    /// Rejected outright when the game is over, a request is in flight, or
    /// the move is illegal; none of those change any state. An evaluation
    /// failure aborts before anything becomes visible.
    pub async fn play_move(&mut self, request: &MoveRequest) -> Result<MoveReport, CoachError> {
        if self.outcome.is_some() {
            return Err(CoachError::GameOver);
        }
        if self.analyzing {
            return Err(CoachError::AnalysisInProgress);
        }
        let m = self.resolve(request)?;

        self.analyzing = true;
        let result = self.analyze_and_commit(m).await;
        self.analyzing = false;
        result
    }

    fn resolve(&self, request: &MoveRequest) -> Result<Move, CoachError> {
        match request {
            MoveRequest::San(san) => san_to_move(&self.position, san)
                .ok_or_else(|| CoachError::IllegalMove(san.clone())),
            MoveRequest::Coordinate {
                from,
                to,
                promotion,
            } => {
                let mut coord = format!("{from}{to}");
                if let Some(p) = promotion {
                    coord.push(*p);
                }
                coordinate_to_move(&self.position, &coord)
                    .or_else(|| {
                        // Drag-and-drop callers omit the letter; promote to a
                        // queen like they expect.
                        if promotion.is_none() {
                            coordinate_to_move(&self.position, &format!("{coord}q"))
                        } else {
                            None
                        }
                    })
                    .ok_or(CoachError::IllegalMove(coord))
            }
        }
    }

    async fn analyze_and_commit(&mut self, m: Move) -> Result<MoveReport, CoachError> {
        let ply = ply_to_play(&self.position);

        let before = self.evaluator.evaluate(&self.position).await?;

        let mut scratch = self.position.clone();
        let played = apply_move(&mut scratch, m);

        let after = self.evaluator.evaluate(&scratch).await?;

        let facts = MoveFacts {
            is_king_move: played.is_king_move(),
            is_castle: played.castle,
        };
        let Verdict { tier, coaching } = classify(&before, &after, facts, ply);

        // Commit: position, history, repetition and opening advance together.
        let previous = std::mem::replace(&mut self.position, scratch);
        self.previous.push(previous);
        let classified = ClassifiedMove {
            mv: played,
            tier: Some(tier),
            coaching,
        };
        self.history.push(classified.clone());
        *self
            .repetition
            .entry(normalize_fen(&position_fen(&self.position)))
            .or_insert(0) += 1;
        self.last_eval = Some(after.clone());
        self.opening = self.matcher.identify(&self.san_history());
        self.outcome = self.check_termination();

        info!(
            san = %classified.mv.san,
            tier = %tier,
            score = after.score,
            "Move classified"
        );

        Ok(MoveReport {
            classified,
            opening: self.opening.clone(),
            evaluation: after,
            outcome: self.outcome.clone(),
        })
    }

    fn check_termination(&self) -> Option<GameOutcome> {
        if self.position.is_checkmate() {
            let last = self.history.last()?;
            let winner = last.mv.color;
            let side = if winner == Color::White { "White" } else { "Black" };
            return Some(GameOutcome::Checkmate {
                winner,
                headline: format!("{side} wins by checkmate!"),
                details: format!(
                    "Checkmate in {} moves! {side} wins with a beautiful mate by {} on {}.",
                    self.history.len(),
                    piece_name(last.mv.role),
                    last.mv.destination().to_uppercase(),
                ),
            });
        }

        let draw = |reason, headline: &str, details: &str| {
            Some(GameOutcome::Draw {
                reason,
                headline: headline.to_string(),
                details: details.to_string(),
            })
        };

        if self.position.is_stalemate() {
            return draw(
                DrawReason::Stalemate,
                "Stalemate! The game is a draw.",
                "The king is not in check but no legal move is possible.",
            );
        }
        let key = normalize_fen(&position_fen(&self.position));
        if self.repetition.get(&key).copied().unwrap_or(0) >= 3 {
            return draw(
                DrawReason::ThreefoldRepetition,
                "Draw by threefold repetition.",
                "The same position has occurred three times.",
            );
        }
        if self.position.is_insufficient_material() {
            return draw(
                DrawReason::InsufficientMaterial,
                "Draw by insufficient material.",
                "Neither side has enough pieces left to force checkmate.",
            );
        }
        if self.position.halfmoves() >= 100 {
            return draw(
                DrawReason::Other,
                "The game is a draw.",
                "Fifty moves have passed without a capture or a pawn move.",
            );
        }
        None
    }

    /// Take back the last move.
    ///
    /// Restores the previous position and drops the history entry. The
    /// evaluation and opening match are cleared, not recomputed.
    pub fn undo(&mut self) -> Option<ClassifiedMove> {
        let previous = self.previous.pop()?;
        let undone = self.history.pop();

        let key = normalize_fen(&position_fen(&self.position));
        if let Some(count) = self.repetition.get_mut(&key) {
            *count -= 1;
            if *count == 0 {
                self.repetition.remove(&key);
            }
        }

        self.position = previous;
        self.last_eval = None;
        self.opening = OpeningMatch::cleared();
        self.outcome = None;
        undone
    }

    /// Start over from the initial position.
    pub fn reset(&mut self) {
        self.position = Chess::default();
        self.history.clear();
        self.previous.clear();
        self.repetition.clear();
        self.repetition
            .insert(normalize_fen(&position_fen(&self.position)), 1);
        self.opening = OpeningMatch::start_position();
        self.last_eval = None;
        self.outcome = None;
        self.analyzing = false;
    }

    /// Import a position (FEN) or a game (PGN).
    ///
    /// FEN is tried first, then PGN. On failure of both the session is left
    /// exactly as it was.
    pub fn import(&mut self, input: &str) -> Result<ImportOutcome, CoachError> {
        let input = input.trim();

        if let Ok(position) = parse_fen(input) {
            self.position = position;
            self.history.clear();
            self.previous.clear();
            self.repetition.clear();
            self.repetition
                .insert(normalize_fen(&position_fen(&self.position)), 1);
            self.opening = OpeningMatch::imported();
            self.last_eval = None;
            self.outcome = None;
            self.analyzing = false;
            info!("Imported FEN position");
            return Ok(ImportOutcome::Fen);
        }

        let game = pgn::parse_pgn(input).ok_or(CoachError::ImportFormat)?;
        let replay = replay_san(&game.moves).map_err(|_| CoachError::ImportFormat)?;

        let mut repetition = HashMap::new();
        let mut previous = Vec::with_capacity(replay.steps.len());
        let mut history = Vec::with_capacity(replay.steps.len());
        for (before, played) in replay.steps {
            previous.push(before);
            history.push(ClassifiedMove {
                mv: played,
                tier: None,
                coaching: String::new(),
            });
        }
        for pos in previous.iter().chain(std::iter::once(&replay.final_position)) {
            *repetition
                .entry(normalize_fen(&position_fen(pos)))
                .or_insert(0) += 1;
        }

        let moves = history.len();
        self.position = replay.final_position;
        self.previous = previous;
        self.history = history;
        self.repetition = repetition;
        self.opening = OpeningMatch::imported();
        self.last_eval = None;
        self.outcome = None;
        self.analyzing = false;
        info!(moves, "Imported PGN game");
        Ok(ImportOutcome::Pgn { moves })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openings::{MatchKind, OpeningBook};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Hands out pre-scripted evaluations in order; errors once exhausted.
    struct ScriptedEvaluator {
        scores: Mutex<VecDeque<i32>>,
    }

    impl ScriptedEvaluator {
        fn new(scores: &[i32]) -> Self {
            Self {
                scores: Mutex::new(scores.iter().copied().collect()),
            }
        }

        fn remaining(&self) -> usize {
            self.scores.lock().unwrap().len()
        }
    }

    impl PositionEvaluator for ScriptedEvaluator {
        async fn evaluate(&self, _pos: &Chess) -> Result<Evaluation, CoachError> {
            let score = self
                .scores
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| CoachError::Evaluation("script exhausted".to_string()))?;
            Ok(Evaluation {
                score,
                best_move: None,
                depth: 12,
                pv: Vec::new(),
            })
        }
    }

    struct FailingEvaluator;

    impl PositionEvaluator for FailingEvaluator {
        async fn evaluate(&self, _pos: &Chess) -> Result<Evaluation, CoachError> {
            Err(CoachError::Evaluation("oracle offline".to_string()))
        }
    }

    fn session(scores: &[i32]) -> GameSession<ScriptedEvaluator> {
        GameSession::new(ScriptedEvaluator::new(scores), OpeningMatcher::unloaded())
    }

    #[tokio::test]
    async fn test_committed_move_advances_everything() {
        let mut s = session(&[0, 20]);
        let report = s.play_move(&MoveRequest::parse("e2e4")).await.unwrap();

        assert_eq!(report.classified.mv.san, "e4");
        assert_eq!(report.classified.tier, Some(QualityTier::Excellent));
        assert_eq!(report.evaluation.score, 20);
        assert_eq!(s.history().len(), 1);
        assert_eq!(s.san_history(), vec!["e4"]);
        assert_eq!(s.last_evaluation().unwrap().score, 20);
        assert!(s.fen().contains("4P3"));
    }

    #[tokio::test]
    async fn test_illegal_move_costs_nothing() {
        let mut s = session(&[0, 0]);
        let before = s.fen();
        let err = s.play_move(&MoveRequest::parse("Ke4")).await.unwrap_err();
        assert!(matches!(err, CoachError::IllegalMove(_)));
        assert_eq!(s.fen(), before);
        assert!(s.history().is_empty());
        assert_eq!(s.evaluator.remaining(), 2);
    }

    #[tokio::test]
    async fn test_first_evaluation_failure_leaves_session_unchanged() {
        let mut s = GameSession::new(FailingEvaluator, OpeningMatcher::unloaded());
        let before = s.fen();
        let err = s.play_move(&MoveRequest::parse("e4")).await.unwrap_err();
        assert!(matches!(err, CoachError::Evaluation(_)));
        assert_eq!(s.fen(), before);
        assert!(s.history().is_empty());
        assert!(s.last_evaluation().is_none());
    }

    #[tokio::test]
    async fn test_second_evaluation_failure_leaves_session_unchanged() {
        // One scripted evaluation: the before-eval succeeds, the after-eval
        // fails. Nothing may be committed.
        let mut s = session(&[0]);
        let before = s.fen();
        let err = s.play_move(&MoveRequest::parse("e4")).await.unwrap_err();
        assert!(matches!(err, CoachError::Evaluation(_)));
        assert_eq!(s.fen(), before);
        assert!(s.history().is_empty());
        assert!(s.last_evaluation().is_none());

        // The session recovers on the next request.
        assert!(s.play_move(&MoveRequest::parse("e4")).await.is_err());
    }

    #[tokio::test]
    async fn test_undo_restores_previous_position() {
        let mut s = session(&[0, 0]);
        let start = s.fen();
        s.play_move(&MoveRequest::parse("e4")).await.unwrap();

        let undone = s.undo().unwrap();
        assert_eq!(undone.mv.san, "e4");
        assert_eq!(s.fen(), start);
        assert!(s.history().is_empty());
        assert!(s.last_evaluation().is_none());
        assert_eq!(s.opening().kind, MatchKind::Cleared);

        // Nothing left to undo.
        assert!(s.undo().is_none());
    }

    #[tokio::test]
    async fn test_checkmate_terminates_the_session() {
        // Fool's mate.
        let mut s = session(&[0, 0, 0, 0, 0, -300, -300, -10_000]);
        for mv in ["f3", "e5", "g4", "Qh4#"] {
            s.play_move(&MoveRequest::parse(mv)).await.unwrap();
        }

        let outcome = s.outcome().unwrap();
        match outcome {
            GameOutcome::Checkmate {
                winner, details, ..
            } => {
                assert_eq!(*winner, Color::Black);
                assert!(details.contains("queen"));
                assert!(details.contains("H4"));
                assert!(details.contains('4'));
            }
            other => panic!("expected checkmate, got {other:?}"),
        }

        let err = s.play_move(&MoveRequest::parse("a3")).await.unwrap_err();
        assert!(matches!(err, CoachError::GameOver));

        s.reset();
        assert!(s.outcome().is_none());
        assert_eq!(s.opening().kind, MatchKind::Start);
        assert!(s.play_move(&MoveRequest::parse("e4")).await.is_err()); // script spent
    }

    #[tokio::test]
    async fn test_threefold_repetition_is_a_draw() {
        let mut s = session(&[0; 16]);
        let shuffle = ["Nf3", "Nf6", "Ng1", "Ng8", "Nf3", "Nf6", "Ng1", "Ng8"];
        let mut last = None;
        for mv in shuffle {
            last = Some(s.play_move(&MoveRequest::parse(mv)).await.unwrap());
        }

        let outcome = last.unwrap().outcome.expect("game should be drawn");
        assert!(matches!(
            outcome,
            GameOutcome::Draw {
                reason: DrawReason::ThreefoldRepetition,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_import_rejects_garbage_without_touching_state() {
        let mut s = session(&[0, 0]);
        s.play_move(&MoveRequest::parse("e4")).await.unwrap();
        let fen = s.fen();

        let err = s.import("neither fen nor pgn").unwrap_err();
        assert!(matches!(err, CoachError::ImportFormat));
        assert_eq!(s.fen(), fen);
        assert_eq!(s.history().len(), 1);
    }

    #[tokio::test]
    async fn test_import_fen_resets_history() {
        let mut s = session(&[]);
        let fen = "r1bqkbnr/pppp1ppp/2n5/4p3/2B1P3/8/PPPP1PPP/RNBQK1NR b KQkq - 3 3";
        let outcome = s.import(fen).unwrap();
        assert_eq!(outcome, ImportOutcome::Fen);
        assert_eq!(s.fen(), fen);
        assert!(s.history().is_empty());
        assert_eq!(s.opening().kind, MatchKind::Imported);
    }

    #[tokio::test]
    async fn test_import_pgn_rebuilds_history() {
        let mut s = session(&[]);
        let outcome = s.import("1. e4 e5 2. Nf3 Nc6 1-0").unwrap();
        assert_eq!(outcome, ImportOutcome::Pgn { moves: 4 });
        assert_eq!(s.san_history(), vec!["e4", "e5", "Nf3", "Nc6"]);
        assert!(s.history().iter().all(|c| c.tier.is_none()));
        assert_eq!(s.opening().kind, MatchKind::Imported);

        // Undo works on imported games.
        let undone = s.undo().unwrap();
        assert_eq!(undone.mv.san, "Nc6");
        assert_eq!(s.history().len(), 3);
    }

    #[tokio::test]
    async fn test_opening_match_updates_with_history() {
        let tsv = "C20\tKing's Pawn Game\t1. e4 e5\t-\t-\n";
        let matcher = OpeningMatcher::with_book(OpeningBook::from_tsv_sources([tsv]));
        let mut s = GameSession::new(ScriptedEvaluator::new(&[0, 0, 0, 0]), matcher);

        s.play_move(&MoveRequest::parse("e4")).await.unwrap();
        assert_eq!(s.opening().kind, MatchKind::Unknown);

        let report = s.play_move(&MoveRequest::parse("e5")).await.unwrap();
        assert_eq!(report.opening.kind, MatchKind::Line);
        assert_eq!(report.opening.eco.as_deref(), Some("C20"));
    }
}
