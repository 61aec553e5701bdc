//! Engine configuration from environment variables

use std::env;
use std::path::PathBuf;

use tracing::info;

/// Default oracle endpoint, matching the development analysis server.
const DEFAULT_EVAL_URL: &str = "http://localhost:3001/analyze";

/// Default base URL for the partitioned opening dataset (a.tsv .. e.tsv).
const DEFAULT_OPENINGS_URL: &str =
    "https://raw.githubusercontent.com/lichess-org/chess-openings/master";

#[derive(Clone, Debug)]
pub struct CoachConfig {
    /// Evaluation oracle endpoint (POST, JSON body with a "fen" field)
    pub eval_url: String,

    /// Base URL for the partitioned opening TSV files
    pub openings_url: String,

    /// Local directory of opening TSV files; takes precedence over the URL
    pub openings_dir: Option<PathBuf>,

    /// HTTP timeout for oracle and dataset requests, in seconds
    pub request_timeout_secs: u64,
}

impl CoachConfig {
    /// Load configuration from environment variables, with defaults for all
    /// keys so a bare environment still works against a local oracle.
    pub fn from_env() -> Self {
        let eval_url = env::var("EVAL_API_URL").unwrap_or_else(|_| DEFAULT_EVAL_URL.to_string());

        let openings_url =
            env::var("OPENINGS_BASE_URL").unwrap_or_else(|_| DEFAULT_OPENINGS_URL.to_string());

        let openings_dir = env::var("OPENINGS_DIR").ok().map(PathBuf::from);

        let request_timeout_secs = env::var("EVAL_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(120);

        info!(eval_url = %eval_url, "Coach config loaded");

        Self {
            eval_url,
            openings_url,
            openings_dir,
            request_timeout_secs,
        }
    }
}

impl Default for CoachConfig {
    fn default() -> Self {
        Self {
            eval_url: DEFAULT_EVAL_URL.to_string(),
            openings_url: DEFAULT_OPENINGS_URL.to_string(),
            openings_dir: None,
            request_timeout_secs: 120,
        }
    }
}
