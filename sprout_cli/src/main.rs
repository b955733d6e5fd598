use chrono::{DateTime, FixedOffset, Local};
use clap::{Parser, Subcommand};
use sprout_core::session::matches_answer;
use sprout_core::*;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "sprout")]
#[command(about = "Spaced-repetition flashcard reviewer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Deck files location
    #[arg(long, global = true)]
    decks: Option<PathBuf>,

    /// Stats database location
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List decks with the number of cards ready for review
    Decks,

    /// Show per-card stats for a deck
    Stats {
        deck: String,

        /// Print one JSON object per card
        #[arg(long)]
        json: bool,
    },

    /// Review the due cards of a deck
    Review {
        deck: String,

        /// Rating mode: "self" (grade yourself) or "auto" (type the answer)
        #[arg(long)]
        rating: Option<RatingMode>,
    },

    /// Append a deck's review history to a CSV file
    History {
        deck: String,

        /// Output CSV path
        #[arg(long)]
        out: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.verbose {
        sprout_core::logging::init_with_level("debug");
    } else {
        sprout_core::logging::init();
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(decks) = cli.decks {
        config.decks.dir = decks;
    }
    if let Some(db) = cli.db {
        config.data.db_path = db;
    }
    config.validate()?;

    let store = Arc::new(FileStore::open(&config.data.db_path)?);
    let dm = DeckManager::new(DeckDir::new(&config.decks.dir)?, Arc::clone(&store));

    let result = match cli.command {
        Commands::Decks => cmd_decks(&dm),
        Commands::Stats { deck, json } => cmd_stats(&dm, &deck, json),
        Commands::Review { deck, rating } => {
            cmd_review(&dm, &deck, rating.unwrap_or(config.review.rating_mode))
        }
        Commands::History { deck, out } => cmd_history(&dm, &deck, out),
    };

    drop(dm);
    if let Ok(store) = Arc::try_unwrap(store) {
        store.close()?;
    }
    result
}

fn cmd_decks(dm: &DeckManager<DeckDir, FileStore>) -> Result<()> {
    let summaries = dm.deck_summaries()?;
    if summaries.is_empty() {
        println!("No decks found.");
        return Ok(());
    }

    let width = summaries.iter().map(|s| s.name.chars().count()).max().unwrap_or(4).max(4);
    println!("{:<width$}  {:>5}  Next review", "Deck", "Ready", width = width);
    for summary in summaries {
        let next = summary
            .next_review_at
            .map(format_time)
            .unwrap_or_else(|| "-".into());
        println!(
            "{:<width$}  {:>5}  {}",
            summary.name,
            summary.cards_ready,
            next,
            width = width
        );
    }
    Ok(())
}

fn cmd_stats(dm: &DeckManager<DeckDir, FileStore>, deck: &str, json: bool) -> Result<()> {
    let reports = dm.deck_stats(deck)?;

    if json {
        for report in &reports {
            println!("{}", serde_json::to_string(report)?);
        }
        return Ok(());
    }

    let width = reports
        .iter()
        .map(|r| r.question.chars().count())
        .max()
        .unwrap_or(4)
        .max(4);
    println!(
        "{:<width$}  {:>10}  {:>8}  {:>6}  Next review",
        "Card",
        "Difficulty",
        "Interval",
        "Due",
        width = width
    );
    for report in reports {
        println!(
            "{:<width$}  {:>10.3}  {:>8.2}  {:>6.2}  {}",
            report.question,
            report.difficulty,
            report.interval,
            report.dueness,
            format_time(report.next_review_at),
            width = width
        );
    }
    Ok(())
}

fn format_time(at: DateTime<FixedOffset>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn cmd_history(dm: &DeckManager<DeckDir, FileStore>, deck: &str, out: PathBuf) -> Result<()> {
    let deck = dm.load_deck(deck)?;
    let count = export_history(&deck, &out)?;
    println!("✓ Exported {} reviews to {}", count, out.display());
    Ok(())
}

fn cmd_review(dm: &DeckManager<DeckDir, FileStore>, deck: &str, mode: RatingMode) -> Result<()> {
    let mut session = dm.review_session(deck, mode)?;
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    writeln!(out, "    Deck: {}", deck)?;
    run_review(&mut session, &mut input, &mut out)
}

/// Drive a session from line-based input until it finishes or the user quits
fn run_review<S, R, W>(session: &mut ReviewSession<S>, input: &mut R, out: &mut W) -> Result<()>
where
    S: StatsStore + ?Sized,
    R: BufRead,
    W: Write,
{
    loop {
        let snap = session.snapshot();
        writeln!(out, "Progress: {}/{}", snap.total - snap.left, snap.total)?;

        let Some(question) = snap.question else {
            writeln!(out, "No more cards!")?;
            return Ok(());
        };
        writeln!(out)?;
        writeln!(out, "  {}", question)?;

        let score = match snap.rating_mode {
            RatingMode::SelfRated => {
                prompt(out, "(Enter: show answer, q: quit)")?;
                match read_line(input)? {
                    Some(line) if line.trim() != "q" => {}
                    _ => return quit(out),
                }

                let answer = session.resolve_answer()?;
                writeln!(out, "  {}", answer)?;

                match read_score(input, out)? {
                    Some(score) => Score::Rated(score),
                    None => return quit(out),
                }
            }
            RatingMode::AutoRated => {
                let hint = format!("(type answer, {} characters)", snap.answer_len);
                prompt(out, &hint)?;
                let Some(typed) = read_line(input)? else {
                    return quit(out);
                };

                let answer = session.resolve_answer()?;
                if matches_answer(&typed, answer) {
                    writeln!(out, "  ✓")?;
                } else {
                    writeln!(out, "  ✕ {}", answer)?;
                }
                Score::Typed(typed)
            }
        };

        if !advance_with_retry(session, score, input, out)? {
            return quit(out);
        }
    }
}

/// Advance the session, offering a retry when the stats store fails.
///
/// Returns `false` if the user gave up.
fn advance_with_retry<S, R, W>(
    session: &mut ReviewSession<S>,
    score: Score,
    input: &mut R,
    out: &mut W,
) -> Result<bool>
where
    S: StatsStore + ?Sized,
    R: BufRead,
    W: Write,
{
    loop {
        match session.advance(score.clone()) {
            Ok(_) => return Ok(true),
            Err(e) if e.is_store() => {
                tracing::error!("Failed to save review: {}", e);
                writeln!(out, "Could not save progress: {}", e)?;
                prompt(out, "(Enter: retry, q: quit)")?;
                match read_line(input)? {
                    Some(line) if line.trim() != "q" => continue,
                    _ => return Ok(false),
                }
            }
            Err(e) => return Err(e),
        }
    }
}

fn read_score<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> Result<Option<ReviewScore>> {
    loop {
        prompt(out, "Again: 1   Hard: 2   Good: 3   Easy: 4")?;
        let Some(line) = read_line(input)? else {
            return Ok(None);
        };
        let line = line.trim();
        if line == "q" {
            return Ok(None);
        }

        let mut chars = line.chars();
        if let (Some(digit), None) = (chars.next(), chars.next()) {
            if let Some(score) = ReviewScore::from_digit(digit) {
                return Ok(Some(score));
            }
        }
    }
}

fn prompt<W: Write>(out: &mut W, text: &str) -> Result<()> {
    writeln!(out, "{}", text)?;
    write!(out, "> ")?;
    out.flush()?;
    Ok(())
}

/// Read one line without its line ending; `None` at end of input
fn read_line<R: BufRead>(input: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    Ok(Some(line))
}

fn quit<W: Write>(out: &mut W) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "Session ended early; reviewed cards are saved.")?;
    Ok(())
}
