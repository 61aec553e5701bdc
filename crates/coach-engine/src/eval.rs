//! Evaluation oracle client
//!
//! One POST per position. Checkmate positions are settled locally and never
//! reach the oracle.

use reqwest::Client;
use serde_json::{json, Value};
use shakmaty::{Chess, Color, Position};
use tracing::debug;

use chess_core::board::{coordinate_to_san, position_fen};

use crate::config::CoachConfig;
use crate::error::CoachError;

/// Score assigned to a delivered checkmate, in centipawns.
pub const MATE_SCORE: i32 = 10_000;

/// Result of a single position evaluation.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Centipawn score, white-positive.
    pub score: i32,
    /// Best reply in standard notation, when the oracle sent a coordinate
    /// move that resolves to exactly one legal move.
    pub best_move: Option<String>,
    /// Search depth reported by the oracle.
    pub depth: u32,
    /// Principal variation in coordinate notation.
    pub pv: Vec<String>,
}

/// Seam for the session: anything that can score a position.
#[allow(async_fn_in_trait)]
pub trait PositionEvaluator {
    async fn evaluate(&self, pos: &Chess) -> Result<Evaluation, CoachError>;
}

/// HTTP client for the evaluation oracle.
pub struct EvalClient {
    client: Client,
    endpoint: String,
}

impl EvalClient {
    pub fn new(config: &CoachConfig) -> Self {
        let client = Client::builder()
            .user_agent("ChessCoach/1.0")
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap();
        Self {
            client,
            endpoint: config.eval_url.clone(),
        }
    }

    async fn request(&self, pos: &Chess) -> Result<Evaluation, CoachError> {
        let fen = position_fen(pos);
        debug!(fen = %fen, "Requesting evaluation");

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "fen": fen }))
            .send()
            .await
            .map_err(|e| CoachError::Evaluation(format!("Request error: {e}")))?;

        let status = resp.status();
        let body: Value = resp
            .json()
            .await
            .map_err(|e| CoachError::Evaluation(format!("Body read error: {e}")))?;

        if !status.is_success() {
            let msg = body
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or("Server error")
                .to_string();
            return Err(CoachError::Evaluation(msg));
        }

        let score = parse_score(&body)
            .ok_or_else(|| CoachError::Evaluation("Invalid response from server".to_string()))?;

        let best_move = body
            .get("bestMove")
            .and_then(|v| v.as_str())
            .and_then(|coord| coordinate_to_san(pos, coord));

        Ok(Evaluation {
            score,
            best_move,
            depth: parse_depth(&body),
            pv: parse_pv(&body),
        })
    }
}

impl PositionEvaluator for EvalClient {
    /// Evaluate a position, short-circuiting terminal ones.
    async fn evaluate(&self, pos: &Chess) -> Result<Evaluation, CoachError> {
        if pos.is_checkmate() {
            let score = if pos.turn() == Color::White {
                -MATE_SCORE
            } else {
                MATE_SCORE
            };
            debug!(score, "Checkmate position settled locally");
            return Ok(Evaluation {
                score,
                best_move: None,
                depth: 0,
                pv: Vec::new(),
            });
        }

        self.request(pos).await
    }
}

/// Parse the centipawn score from a response body; None if missing or
/// non-numeric.
fn parse_score(body: &Value) -> Option<i32> {
    body.get("score")?.as_f64().map(|s| s as i32)
}

fn parse_depth(body: &Value) -> u32 {
    body.get("depth").and_then(|v| v.as_u64()).unwrap_or(0) as u32
}

/// Parse the principal variation from the response's info block.
fn parse_pv(body: &Value) -> Vec<String> {
    body.get("info")
        .and_then(|info| info.get("pv"))
        .and_then(|pv| pv.as_array())
        .map(|moves| {
            moves
                .iter()
                .filter_map(|m| m.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess_core::board::parse_fen;

    /// A client pointed at an unroutable endpoint: any actual request fails.
    fn offline_client() -> EvalClient {
        let config = CoachConfig {
            eval_url: "http://127.0.0.1:9/analyze".to_string(),
            request_timeout_secs: 1,
            ..CoachConfig::default()
        };
        EvalClient::new(&config)
    }

    #[tokio::test]
    async fn test_checkmate_short_circuit_black_to_move() {
        // Scholar's mate: black is checkmated, so white is winning.
        let pos =
            parse_fen("r1bqkb1r/pppp1Qpp/2n2n2/4p3/2B1P3/8/PPPP1PPP/RNB1K1NR b KQkq - 0 4")
                .unwrap();
        let eval = offline_client().evaluate(&pos).await.unwrap();
        assert_eq!(eval.score, MATE_SCORE);
        assert_eq!(eval.depth, 0);
        assert!(eval.best_move.is_none());
        assert!(eval.pv.is_empty());
    }

    #[tokio::test]
    async fn test_checkmate_short_circuit_white_to_move() {
        // Fool's mate: white is checkmated.
        let pos = parse_fen("rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3")
            .unwrap();
        let eval = offline_client().evaluate(&pos).await.unwrap();
        assert_eq!(eval.score, -MATE_SCORE);
    }

    #[tokio::test]
    async fn test_non_terminal_position_surfaces_request_error() {
        let pos = Chess::default();
        let err = offline_client().evaluate(&pos).await.unwrap_err();
        assert!(matches!(err, CoachError::Evaluation(_)));
    }

    #[test]
    fn test_parse_score() {
        assert_eq!(parse_score(&json!({ "score": 35 })), Some(35));
        assert_eq!(parse_score(&json!({ "score": -12.7 })), Some(-12));
        assert_eq!(parse_score(&json!({ "score": "35" })), None);
        assert_eq!(parse_score(&json!({})), None);
    }

    #[test]
    fn test_parse_depth_and_pv() {
        let body = json!({
            "score": 10,
            "depth": 18,
            "info": { "pv": ["e2e4", "e7e5", "g1f3"] }
        });
        assert_eq!(parse_depth(&body), 18);
        assert_eq!(parse_pv(&body), vec!["e2e4", "e7e5", "g1f3"]);
        assert_eq!(parse_depth(&json!({})), 0);
        assert!(parse_pv(&json!({})).is_empty());
    }
}
