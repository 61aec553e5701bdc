//! Move quality classification — pure functions only
//! (No Position/Client/Session dependencies beyond the evaluation values)

use serde::{Deserialize, Serialize};

use crate::eval::Evaluation;

/// Centipawn swing thresholds
const SWING_LOSING: i32 = -100;
const SWING_WINNING: i32 = 100;

/// Classification thresholds (absolute centipawn delta)
const THRESHOLD_EXCELLENT: i32 = 50;
const THRESHOLD_GOOD: i32 = 150;
const THRESHOLD_INACCURACY: i32 = 300;

/// King-safety windows, in full moves
const OPENING_PHASE_MOVES: u32 = 10;
const EXTENDED_OPENING_MOVES: u32 = 15;

/// Quality tier of a played move.
///
/// The theory tiers are never produced by `classify`; they are reserved for
/// annotating moves that follow a known opening line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Brilliant,
    Excellent,
    Good,
    Inaccuracy,
    Mistake,
    TheoryMain,
    Theory,
    TheoryVariation,
}

impl QualityTier {
    /// User-facing label.
    pub fn label(&self) -> &'static str {
        match self {
            QualityTier::Brilliant => "Brilliant move!!",
            QualityTier::Excellent => "Excellent move!",
            QualityTier::Good => "Good move",
            QualityTier::Inaccuracy => "Inaccuracy",
            QualityTier::Mistake => "Mistake",
            QualityTier::TheoryMain => "Main theory move",
            QualityTier::Theory => "Theory move",
            QualityTier::TheoryVariation => "Theory variation",
        }
    }
}

impl std::fmt::Display for QualityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// The facts about a move the classifier needs beyond the two evaluations.
#[derive(Debug, Clone, Copy)]
pub struct MoveFacts {
    pub is_king_move: bool,
    pub is_castle: bool,
}

/// Classification output: a tier plus coaching text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub tier: QualityTier,
    pub coaching: String,
}

/// Classify a move from the evaluations before and after it.
///
/// `ply` is the 1-based half-move number of the move being classified.
/// Decision order: king-safety override, brilliant swing, then magnitude
/// bands on the absolute score delta. A non-castling king move inside the
/// opening window is a mistake no matter what the scores say.
pub fn classify(before: &Evaluation, after: &Evaluation, facts: MoveFacts, ply: u32) -> Verdict {
    let move_number = full_move_number(ply);
    let in_opening = move_number <= OPENING_PHASE_MOVES;
    let in_extended_opening = move_number <= EXTENDED_OPENING_MOVES;

    if facts.is_king_move && !facts.is_castle && (in_opening || in_extended_opening) {
        let coaching = match &before.best_move {
            Some(best) => {
                format!("{best} was much stronger. Avoid moving your king this early in the game!")
            }
            None => "Avoid moving your king early in the game without a good reason!".to_string(),
        };
        return Verdict {
            tier: QualityTier::Mistake,
            coaching,
        };
    }

    if before.score < SWING_LOSING && after.score > SWING_WINNING {
        return Verdict {
            tier: QualityTier::Brilliant,
            coaching: "An exceptional move that completely turns the game around!".to_string(),
        };
    }

    let delta = (after.score - before.score).abs();

    if delta < THRESHOLD_EXCELLENT && !facts.is_king_move {
        Verdict {
            tier: QualityTier::Excellent,
            coaching: "Your move is very strong.".to_string(),
        }
    } else if delta < THRESHOLD_GOOD && !facts.is_king_move {
        Verdict {
            tier: QualityTier::Good,
            coaching: "A solid move.".to_string(),
        }
    } else if delta < THRESHOLD_INACCURACY {
        let coaching = match &before.best_move {
            Some(best) => format!("{best} was more precise."),
            None => "There was a better move.".to_string(),
        };
        Verdict {
            tier: QualityTier::Inaccuracy,
            coaching,
        }
    } else {
        let coaching = match &before.best_move {
            Some(best) => format!("{best} was much stronger."),
            None => "There was a much stronger move.".to_string(),
        };
        Verdict {
            tier: QualityTier::Mistake,
            coaching,
        }
    }
}

/// Full-move number of a 1-based ply.
fn full_move_number(ply: u32) -> u32 {
    (ply + 1) / 2
}
