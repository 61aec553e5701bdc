pub use shakmaty;

pub mod board;
pub mod pgn;
