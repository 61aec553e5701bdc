//! shakmaty glue shared by the engine: FEN helpers, move resolution, replay.

use shakmaty::fen::Fen;
use shakmaty::san::SanPlus;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Move, Position, Role};
use thiserror::Error;

pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[derive(Error, Debug)]
pub enum BoardError {
    #[error("Invalid FEN: {0}")]
    InvalidFen(String),

    #[error("Invalid move {0} at ply {1}")]
    InvalidMove(String, usize),
}

/// A move after it has been applied to a position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayedMove {
    /// Standard notation, including check/mate suffix ("Nf3", "Qxf7#").
    pub san: String,
    /// Coordinate notation: origin + destination + optional promotion letter.
    pub coord: String,
    /// The piece that moved.
    pub role: Role,
    /// The side that moved.
    pub color: Color,
    pub promotion: Option<Role>,
    pub castle: bool,
}

impl PlayedMove {
    /// Destination square in coordinate form ("g1").
    pub fn destination(&self) -> &str {
        &self.coord[2..4]
    }

    pub fn is_king_move(&self) -> bool {
        self.role == Role::King
    }
}

pub fn position_fen(pos: &Chess) -> String {
    Fen::from_position(pos, EnPassantMode::Legal).to_string()
}

/// Strips move counters from a FEN, keeping position + side + castling + ep.
pub fn normalize_fen(fen: &str) -> String {
    fen.split_whitespace().take(4).collect::<Vec<_>>().join(" ")
}

pub fn parse_fen(input: &str) -> Result<Chess, BoardError> {
    let fen: Fen = input
        .trim()
        .parse()
        .map_err(|_| BoardError::InvalidFen(input.to_string()))?;
    fen.into_position::<Chess>(CastlingMode::Standard)
        .map_err(|_| BoardError::InvalidFen(input.to_string()))
}

/// Applies a move to the position and returns its description.
///
/// The SAN is rendered before the move is played so disambiguation and
/// check/mate suffixes come out right.
pub fn apply_move(pos: &mut Chess, m: Move) -> PlayedMove {
    let color = pos.turn();
    let coord = m.to_uci(CastlingMode::Standard).to_string();
    let role = m.role();
    let promotion = m.promotion();
    let castle = m.is_castle();
    let san = SanPlus::from_move_and_play_unchecked(pos, m).to_string();
    PlayedMove {
        san,
        coord,
        role,
        color,
        promotion,
        castle,
    }
}

/// Resolves a SAN token (check/capture annotations allowed) to a legal move.
pub fn san_to_move(pos: &Chess, san: &str) -> Option<Move> {
    let parsed: SanPlus = san.parse().ok()?;
    parsed.san.to_move(pos).ok()
}

/// Resolves a coordinate move against the legal moves of a position.
///
/// A 5-character string must match origin, destination and promotion; a
/// 4-character string matches on origin and destination only. Returns None
/// unless exactly one legal move matches: an ambiguous coordinate (a
/// promotion without its letter) is not guessed at.
pub fn coordinate_to_move(pos: &Chess, coord: &str) -> Option<Move> {
    if coord.len() < 4 || coord.len() > 5 {
        return None;
    }
    let wanted = coord.to_ascii_lowercase();
    let mut found: Option<Move> = None;
    for m in pos.legal_moves() {
        let uci = m.to_uci(CastlingMode::Standard).to_string();
        let hit = if wanted.len() == 5 {
            uci == wanted
        } else {
            uci[..4] == wanted
        };
        if hit {
            if found.is_some() {
                return None;
            }
            found = Some(m);
        }
    }
    found
}

/// SAN of the unique legal move matching a coordinate string, if any.
pub fn coordinate_to_san(pos: &Chess, coord: &str) -> Option<String> {
    let m = coordinate_to_move(pos, coord)?;
    let mut scratch = pos.clone();
    Some(SanPlus::from_move_and_play_unchecked(&mut scratch, m).to_string())
}

/// Replay of a SAN move list from the starting position.
pub struct Replay {
    /// Position before each move, paired with the move's description.
    pub steps: Vec<(Chess, PlayedMove)>,
    pub final_position: Chess,
}

pub fn replay_san(moves: &[String]) -> Result<Replay, BoardError> {
    let mut pos = Chess::default();
    let mut steps = Vec::with_capacity(moves.len());
    for (i, token) in moves.iter().enumerate() {
        let m = san_to_move(&pos, token)
            .ok_or_else(|| BoardError::InvalidMove(token.clone(), i + 1))?;
        let before = pos.clone();
        let played = apply_move(&mut pos, m);
        steps.push((before, played));
    }
    Ok(Replay {
        steps,
        final_position: pos,
    })
}

/// Lowercase English piece name, for user-facing messages.
pub fn piece_name(role: Role) -> &'static str {
    match role {
        Role::Pawn => "pawn",
        Role::Knight => "knight",
        Role::Bishop => "bishop",
        Role::Rook => "rook",
        Role::Queen => "queen",
        Role::King => "king",
    }
}

/// 1-based ply of the move about to be played in this position.
pub fn ply_to_play(pos: &Chess) -> u32 {
    let fullmove = pos.fullmoves().get();
    (fullmove - 1) * 2 + if pos.turn() == Color::White { 1 } else { 2 }
}
