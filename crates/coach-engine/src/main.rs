//! Interactive console coach.
//!
//! Reads moves (SAN or coordinate form) from stdin, classifies each one
//! against the evaluation oracle and reports the opening line being followed.

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};

use coach_engine::config::CoachConfig;
use coach_engine::error::CoachError;
use coach_engine::eval::EvalClient;
use coach_engine::openings::OpeningMatcher;
use coach_engine::session::{GameSession, ImportOutcome, MoveRequest};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    // Load .env file for local dev
    let _ = dotenvy::dotenv();

    let config = CoachConfig::from_env();
    let client = reqwest::Client::builder()
        .user_agent("ChessCoach/1.0")
        .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
        .build()?;

    let matcher = OpeningMatcher::spawn_load(client, &config);
    let evaluator = EvalClient::new(&config);
    let mut session = GameSession::new(evaluator, matcher);

    println!("Chess coach ready.");
    println!("Enter a move (e4, Nf3, e2e4) or: undo, reset, import <FEN|PGN>, fen, quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input {
            "quit" | "exit" => break,
            "fen" => println!("{}", session.fen()),
            "undo" => match session.undo() {
                Some(undone) => println!("Took back {}.", undone.mv.san),
                None => println!("Nothing to undo."),
            },
            "reset" => {
                session.reset();
                println!("New game.");
            }
            _ => {
                if let Some(rest) = input.strip_prefix("import ") {
                    match session.import(rest) {
                        Ok(ImportOutcome::Fen) => println!("Position imported."),
                        Ok(ImportOutcome::Pgn { moves }) => {
                            println!("Game imported ({moves} moves).")
                        }
                        Err(e) => println!("{e}"),
                    }
                    continue;
                }
                play(&mut session, input).await;
            }
        }
    }

    Ok(())
}

async fn play(session: &mut GameSession<EvalClient>, input: &str) {
    let request = MoveRequest::parse(input);
    match session.play_move(&request).await {
        Ok(report) => {
            if let Some(tier) = report.classified.tier {
                println!("{}: {}", report.classified.mv.san, tier.label());
            }
            if !report.classified.coaching.is_empty() {
                println!("  {}", report.classified.coaching);
            }
            println!("  Eval: {:+.1}", report.evaluation.score as f64 / 100.0);

            let opening = &report.opening;
            if !opening.name.is_empty() {
                match (&opening.eco, &opening.variation) {
                    (Some(eco), Some(variation)) => {
                        println!("  Opening: {} ({eco}), {variation}", opening.name)
                    }
                    (Some(eco), None) => println!("  Opening: {} ({eco})", opening.name),
                    _ => println!("  Opening: {}", opening.name),
                }
            }

            if let Some(outcome) = &report.outcome {
                println!("{}", outcome.headline());
                println!("{}", outcome.details());
            }
        }
        Err(CoachError::IllegalMove(mv)) => println!("Illegal move: {mv}"),
        Err(CoachError::Evaluation(_)) => {
            println!("Analysis failed; the move was not played. Try again.")
        }
        Err(e) => println!("{e}"),
    }
}
