//! PGN parsing utilities — lightweight regex-based parser.
//!
//! Enough PGN for game import: headers plus the mainline SAN moves.
//! Comments, variations and NAGs are stripped rather than interpreted.

use regex::Regex;

use crate::board::STARTING_FEN;

/// Headers we care about for an imported game.
#[derive(Debug, Clone, Default)]
pub struct GameMetadata {
    pub white: Option<String>,
    pub black: Option<String>,
    pub result: Option<String>,
    pub eco: Option<String>,
}

/// A parsed game: metadata plus mainline SAN moves.
#[derive(Debug, Clone)]
pub struct ParsedGame {
    pub metadata: GameMetadata,
    pub moves: Vec<String>,
}

/// Parse a PGN string into metadata and a SAN move list.
///
/// Games declaring a non-standard starting position (SetUp/FEN headers) are
/// rejected: the engine replays imports from the initial position.
pub fn parse_pgn(pgn: &str) -> Option<ParsedGame> {
    let header_re = Regex::new(r#"\[(\w+)\s+"([^"]*)"\]"#).ok()?;

    let mut metadata = GameMetadata::default();
    let mut setup = None;
    let mut fen = None;

    for cap in header_re.captures_iter(pgn) {
        let key = &cap[1];
        let value = cap[2].to_string();
        match key {
            "White" => metadata.white = Some(value),
            "Black" => metadata.black = Some(value),
            "Result" => metadata.result = Some(value),
            "ECO" => metadata.eco = Some(value),
            "SetUp" => setup = Some(value),
            "FEN" => fen = Some(value),
            _ => {}
        }
    }

    // Filter non-standard positions
    if setup.as_deref() == Some("1") {
        if let Some(ref f) = fen {
            if f != STARTING_FEN {
                return None;
            }
        }
    }

    let moves = extract_moves(pgn);
    if moves.is_empty() {
        return None;
    }

    Some(ParsedGame { metadata, moves })
}

/// Extract SAN moves from PGN text (after removing headers, comments, variations).
fn extract_moves(pgn: &str) -> Vec<String> {
    // Remove headers
    let header_re = Regex::new(r"\[[^\]]*\]").unwrap();
    let no_headers = header_re.replace_all(pgn, "");

    // Remove comments
    let comment_re = Regex::new(r"\{[^}]*\}").unwrap();
    let no_comments = comment_re.replace_all(&no_headers, "");

    // Remove variations
    let variation_re = Regex::new(r"\([^)]*\)").unwrap();
    let no_variations = variation_re.replace_all(&no_comments, "");

    // Extract moves
    let move_re =
        Regex::new(r"[KQRBN]?[a-h]?[1-8]?x?[a-h][1-8](?:=[QRBN])?[+#]?|O-O-O|O-O").unwrap();

    move_re
        .find_iter(&no_variations)
        .map(|m| m.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pgn_basic() {
        let pgn = r#"[White "Player1"]
[Black "Player2"]
[Result "1-0"]
[ECO "C50"]

1. e4 e5 2. Nf3 Nc6 1-0"#;

        let game = parse_pgn(pgn).unwrap();
        assert_eq!(game.metadata.white.as_deref(), Some("Player1"));
        assert_eq!(game.metadata.result.as_deref(), Some("1-0"));
        assert_eq!(game.metadata.eco.as_deref(), Some("C50"));
        assert_eq!(game.moves.len(), 4);
        assert_eq!(game.moves[0], "e4");
        assert_eq!(game.moves[3], "Nc6");
    }

    #[test]
    fn test_parse_pgn_headerless_movetext() {
        let game = parse_pgn("1. d4 d5 2. c4 e6").unwrap();
        assert_eq!(game.moves, vec!["d4", "d5", "c4", "e6"]);
    }

    #[test]
    fn test_parse_pgn_strips_comments_and_variations() {
        let pgn = "1. e4 {best by test} e5 2. Nf3 (2. f4 exf4) Nc6";
        let game = parse_pgn(pgn).unwrap();
        assert_eq!(game.moves, vec!["e4", "e5", "Nf3", "Nc6"]);
    }

    #[test]
    fn test_parse_pgn_rejects_nonstandard_setup() {
        let pgn = r#"[SetUp "1"]
[FEN "8/8/8/8/8/8/8/K1k5 w - - 0 1"]

1. Ka2"#;
        assert!(parse_pgn(pgn).is_none());
    }

    #[test]
    fn test_parse_pgn_rejects_moveless_text() {
        assert!(parse_pgn("[White \"X\"]").is_none());
        assert!(parse_pgn("complete garbage").is_none());
    }
}
