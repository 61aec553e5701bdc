//! Engine error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoachError {
    #[error("Analysis failed: {0}")]
    Evaluation(String),

    #[error("Illegal move: {0}")]
    IllegalMove(String),

    #[error("Invalid format. Use FEN or PGN.")]
    ImportFormat,

    #[error("An analysis is already in progress")]
    AnalysisInProgress,

    #[error("The game is over; reset to continue")]
    GameOver,

    #[error("Opening dataset error: {0}")]
    Openings(String),
}
