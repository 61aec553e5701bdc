//! Opening reference dataset and incremental matcher.
//!
//! The dataset is the lichess chess-openings layout: five tab-separated
//! partitions (a.tsv .. e.tsv) of ECO code, name and a PGN-like move string.
//! Loading is best-effort and publishes an immutable snapshot; queries before
//! the snapshot lands get an explicit "loading" result, and a failed load
//! degrades to permanent "unknown" rather than taking the session down.

use std::path::Path;
use std::sync::{Arc, OnceLock};

use reqwest::Client;
use tracing::{info, warn};

use crate::config::CoachConfig;
use crate::error::CoachError;

/// Partition basenames of the reference dataset.
const PARTITIONS: [&str; 5] = ["a", "b", "c", "d", "e"];

/// One named reference line. Moves are stored normalized.
#[derive(Debug, Clone)]
pub struct OpeningLine {
    pub eco: Option<String>,
    pub name: String,
    pub variation: Option<String>,
    pub moves: Vec<String>,
}

/// The in-memory reference dataset. Read-only once built.
#[derive(Debug, Default)]
pub struct OpeningBook {
    lines: Vec<OpeningLine>,
}

impl OpeningBook {
    /// Append every well-formed row of a TSV partition.
    ///
    /// Rows are ECO, name, PGN-like move string; the fourth and fifth columns
    /// (alternate encodings of the final position) are ignored. Malformed
    /// rows and the header row are skipped.
    pub fn add_tsv(&mut self, text: &str) {
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut cols = line.split('\t');
            let (eco, name, pgn) = match (cols.next(), cols.next(), cols.next()) {
                (Some(e), Some(n), Some(p)) if !e.is_empty() && !n.is_empty() && !p.is_empty() => {
                    (e, n, p)
                }
                _ => continue,
            };
            if eco == "eco" {
                continue;
            }

            let moves: Vec<String> = pgn
                .split_whitespace()
                .filter(|token| !token.contains('.'))
                .map(normalize_move)
                .collect();
            if moves.is_empty() {
                continue;
            }

            let (name, variation) = match name.split_once(": ") {
                Some((family, variation)) => (family.to_string(), Some(variation.to_string())),
                None => (name.to_string(), None),
            };

            self.lines.push(OpeningLine {
                eco: Some(eco.to_string()),
                name,
                variation,
                moves,
            });
        }
    }

    /// Build a book from in-memory TSV sources.
    pub fn from_tsv_sources<'a>(sources: impl IntoIterator<Item = &'a str>) -> Self {
        let mut book = Self::default();
        for source in sources {
            book.add_tsv(source);
        }
        book
    }

    /// Load every `*.tsv` file under a local directory.
    pub fn load_dir(dir: &Path) -> Result<Self, CoachError> {
        let pattern = dir.join("*.tsv");
        let mut book = Self::default();
        let mut files = 0usize;
        for entry in glob::glob(&pattern.to_string_lossy())
            .map_err(|e| CoachError::Openings(e.to_string()))?
        {
            let path = entry.map_err(|e| CoachError::Openings(e.to_string()))?;
            let text = std::fs::read_to_string(&path)
                .map_err(|e| CoachError::Openings(format!("{}: {e}", path.display())))?;
            book.add_tsv(&text);
            files += 1;
        }
        if files == 0 {
            return Err(CoachError::Openings(format!(
                "no TSV files under {}",
                dir.display()
            )));
        }
        Ok(book)
    }

    /// Fetch the five partitions from a remote base URL.
    pub async fn fetch(client: &Client, base_url: &str) -> Result<Self, CoachError> {
        let base = base_url.trim_end_matches('/');
        let mut book = Self::default();
        for partition in PARTITIONS {
            let url = format!("{base}/{partition}.tsv");
            let resp = client
                .get(&url)
                .send()
                .await
                .map_err(|e| CoachError::Openings(format!("Request error: {e}")))?;
            if !resp.status().is_success() {
                return Err(CoachError::Openings(format!(
                    "HTTP {} for {url}",
                    resp.status()
                )));
            }
            let text = resp
                .text()
                .await
                .map_err(|e| CoachError::Openings(format!("Body read error: {e}")))?;
            book.add_tsv(&text);
        }
        Ok(book)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// What an `OpeningMatch` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// A line from the reference dataset.
    Line,
    /// The dataset has not finished loading; transient, ask again.
    Loading,
    /// No reference line matches the played sequence.
    Unknown,
    /// Fresh game, nothing played yet.
    Start,
    /// Position arrived via FEN/PGN import.
    Imported,
    /// Neutral state after an undo.
    Cleared,
}

/// Identification result for a played move sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpeningMatch {
    pub kind: MatchKind,
    pub name: String,
    pub eco: Option<String>,
    pub variation: Option<String>,
}

impl OpeningMatch {
    fn from_line(line: &OpeningLine) -> Self {
        Self {
            kind: MatchKind::Line,
            name: line.name.clone(),
            eco: line.eco.clone(),
            variation: line.variation.clone(),
        }
    }

    fn sentinel(kind: MatchKind, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            eco: None,
            variation: None,
        }
    }

    pub fn loading() -> Self {
        Self::sentinel(MatchKind::Loading, "Loading openings...")
    }

    pub fn unknown() -> Self {
        Self::sentinel(MatchKind::Unknown, "Unknown position")
    }

    pub fn start_position() -> Self {
        Self::sentinel(MatchKind::Start, "Starting position")
    }

    pub fn imported() -> Self {
        Self::sentinel(MatchKind::Imported, "Imported position")
    }

    pub fn cleared() -> Self {
        Self::sentinel(MatchKind::Cleared, "")
    }
}

/// Cheap-to-clone handle over the (eventually loaded) reference dataset.
#[derive(Clone, Default)]
pub struct OpeningMatcher {
    book: Arc<OnceLock<OpeningBook>>,
}

impl OpeningMatcher {
    /// A matcher whose dataset never arrives; every query reports loading.
    pub fn unloaded() -> Self {
        Self::default()
    }

    /// A matcher over an already-built book. Used by tests and local tools.
    pub fn with_book(book: OpeningBook) -> Self {
        let matcher = Self::default();
        let _ = matcher.book.set(book);
        matcher
    }

    /// Start the dataset load in the background and return immediately.
    ///
    /// On failure an empty book is published: the matcher then reports
    /// "unknown" forever instead of "loading" forever.
    pub fn spawn_load(client: Client, config: &CoachConfig) -> Self {
        let matcher = Self::default();
        let cell = Arc::clone(&matcher.book);
        let dir = config.openings_dir.clone();
        let base_url = config.openings_url.clone();

        tokio::spawn(async move {
            let loaded = match dir {
                Some(dir) => OpeningBook::load_dir(&dir),
                None => OpeningBook::fetch(&client, &base_url).await,
            };
            match loaded {
                Ok(book) => {
                    info!(lines = book.len(), "Opening dataset loaded");
                    let _ = cell.set(book);
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load opening dataset; openings will be unknown");
                    let _ = cell.set(OpeningBook::default());
                }
            }
        });

        matcher
    }

    pub fn is_ready(&self) -> bool {
        self.book.get().is_some()
    }

    /// Find the best-matching reference line for the moves played so far.
    ///
    /// A line matches when each of its normalized moves is contained within
    /// the correspondingly-indexed normalized played move. The longest match
    /// wins; ties keep the line encountered first in the dataset.
    pub fn identify(&self, played: &[String]) -> OpeningMatch {
        let Some(book) = self.book.get() else {
            return OpeningMatch::loading();
        };

        let normalized: Vec<String> = played.iter().map(|m| normalize_move(m)).collect();

        let mut best: Option<&OpeningLine> = None;
        let mut best_len = 0usize;
        for line in &book.lines {
            if line.moves.len() > normalized.len() {
                continue;
            }
            let matches = line
                .moves
                .iter()
                .zip(&normalized)
                .all(|(reference, played)| played.contains(reference.as_str()));
            if matches && line.moves.len() > best_len {
                best_len = line.moves.len();
                best = Some(line);
            }
        }

        match best {
            Some(line) => OpeningMatch::from_line(line),
            None => OpeningMatch::unknown(),
        }
    }
}

/// Strip check/capture/promotion annotation characters from a move token.
/// Applied identically to played and reference moves before comparison.
fn normalize_move(token: impl AsRef<str>) -> String {
    token
        .as_ref()
        .chars()
        .filter(|c| !matches!(c, '+' | '#' | 'x' | '='))
        .collect()
}
