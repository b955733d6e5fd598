//! Integration tests for the sprout binary.
//!
//! These tests verify end-to-end behavior including:
//! - Deck listing and per-card stats
//! - Self-rated and auto-rated review sessions driven over stdin
//! - Stats persistence across runs
//! - History export

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const HIRAGANA: &str = r#"
[[cards]]
question = "あ"
answer = "a"

[[cards]]
question = "い"
answer = "i"

[[cards]]
question = "う"
answer = "u"
"#;

const CAPITALS: &str = r#"
[[cards]]
id = "japan"
question = "Capital of Japan?"
answer = "Tokyo"

[[cards]]
id = "france"
question = "Capital of France?"
answer = "Paris"
"#;

struct Fixture {
    _dir: TempDir,
    decks: PathBuf,
    db: PathBuf,
}

/// Helper to create a deck directory and database path
fn setup() -> Fixture {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let decks = dir.path().join("decks");
    fs::create_dir_all(&decks).unwrap();
    fs::write(decks.join("Hiragana.toml"), HIRAGANA).unwrap();
    fs::write(decks.join("Capitals.toml"), CAPITALS).unwrap();
    let db = dir.path().join("data/stats.db");
    Fixture {
        _dir: dir,
        decks,
        db,
    }
}

/// Helper to get the CLI binary pointed at the fixture
fn cli(fx: &Fixture) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("sprout"));
    cmd.arg("--decks").arg(&fx.decks).arg("--db").arg(&fx.db);
    cmd
}

fn stats_json(fx: &Fixture, deck: &str) -> Vec<Value> {
    let output = cli(fx)
        .args(["stats", deck, "--json"])
        .output()
        .expect("run stats");
    assert!(output.status.success());
    String::from_utf8(output.stdout)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).expect("valid json line"))
        .collect()
}

fn read_csv_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .expect("read csv")
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn test_cli_help() {
    Command::new(assert_cmd::cargo::cargo_bin!("sprout"))
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Spaced-repetition flashcard reviewer"));
}

#[test]
fn test_decks_lists_ready_counts() {
    let fx = setup();

    cli(&fx)
        .arg("decks")
        .assert()
        .success()
        .stdout(predicate::str::contains("Capitals"))
        .stdout(predicate::str::is_match(r"Hiragana\s+3").unwrap());
}

#[test]
fn test_stats_in_deck_order() {
    let fx = setup();

    let stats = stats_json(&fx, "Hiragana");
    let questions: Vec<_> = stats.iter().map(|s| s["question"].as_str().unwrap()).collect();
    assert_eq!(questions, vec!["あ", "い", "う"]);
    assert!(stats.iter().all(|s| s["interval"] == 0.2));
    assert!(stats.iter().all(|s| s["difficulty"] == 0.3));
}

#[test]
fn test_stats_table() {
    let fx = setup();

    cli(&fx)
        .args(["stats", "Capitals"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Difficulty"))
        .stdout(predicate::str::contains("Capital of France?"));
}

#[test]
fn test_self_rated_review_persists() {
    let fx = setup();

    cli(&fx)
        .args(["review", "Hiragana", "--rating", "self"])
        .write_stdin("\n3\n\n1\n\n4\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Progress: 0/3"))
        .stdout(predicate::str::contains("Progress: 3/3"))
        .stdout(predicate::str::contains("No more cards!"));

    let stats = stats_json(&fx, "Hiragana");
    // Good and Easy stretch the interval; Again raises difficulty
    assert!(stats[0]["interval"].as_f64().unwrap() > 0.2);
    assert!(stats[1]["difficulty"].as_f64().unwrap() > 0.3);
    assert!(stats[2]["interval"].as_f64().unwrap() > 0.2);

    // Even the failed card waits out the minimum interval
    cli(&fx)
        .args(["review", "Hiragana"])
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::contains("Progress: 0/0"));
}

#[test]
fn test_invalid_score_is_reprompted() {
    let fx = setup();

    cli(&fx)
        .args(["review", "Capitals"])
        .write_stdin("\n9\nx\n3\n\n3\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("No more cards!"));
}

#[test]
fn test_auto_rated_review_requires_exact_answer() {
    let fx = setup();

    cli(&fx)
        .args(["review", "Capitals", "--rating", "auto"])
        .write_stdin("tokyo\nParis\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("✕ Tokyo"))
        .stdout(predicate::str::contains("✓"))
        .stdout(predicate::str::contains("No more cards!"));

    let stats = stats_json(&fx, "Capitals");
    let japan = stats.iter().find(|s| s["id"] == "japan").unwrap();
    let france = stats.iter().find(|s| s["id"] == "france").unwrap();
    assert!(japan["difficulty"].as_f64().unwrap() > 0.3);
    assert!(france["difficulty"].as_f64().unwrap() < 0.3);
}

#[test]
fn test_quitting_keeps_reviewed_cards() {
    let fx = setup();

    cli(&fx)
        .args(["review", "Hiragana"])
        .write_stdin("\n4\nq\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Session ended early"));

    cli(&fx)
        .arg("decks")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"Hiragana\s+2").unwrap());
}

#[test]
fn test_empty_session_finishes_immediately() {
    let fx = setup();

    cli(&fx)
        .args(["review", "Capitals"])
        .write_stdin("\n4\n\n4\n")
        .assert()
        .success();

    cli(&fx)
        .args(["review", "Capitals"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Progress: 0/0"))
        .stdout(predicate::str::contains("No more cards!"));
}

#[test]
fn test_unknown_deck_fails() {
    let fx = setup();

    cli(&fx)
        .args(["review", "Klingon"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Deck not found: Klingon"));
}

#[test]
fn test_history_export() {
    let fx = setup();
    let csv_path = fx.db.parent().unwrap().join("history.csv");

    cli(&fx)
        .args(["review", "Hiragana"])
        .write_stdin("\n3\n\n3\n\n3\n")
        .assert()
        .success();

    cli(&fx)
        .args(["history", "Hiragana", "--out"])
        .arg(&csv_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 3 reviews"));

    let lines = read_csv_lines(&csv_path);
    assert_eq!(lines[0], "deck,card_id,reviewed_at,interval,difficulty");
    assert_eq!(lines.len(), 4);
    assert!(lines[1].starts_with("Hiragana,あ,"));
}

#[test]
fn test_config_file_sets_paths_and_mode() {
    let fx = setup();
    let config_path = fx.db.parent().unwrap().join("config.toml");
    fs::create_dir_all(config_path.parent().unwrap()).unwrap();
    fs::write(
        &config_path,
        format!(
            "[data]\ndb_path = {:?}\n[decks]\ndir = {:?}\n[review]\nrating_mode = \"auto\"\n",
            fx.db, fx.decks
        ),
    )
    .unwrap();

    Command::new(assert_cmd::cargo::cargo_bin!("sprout"))
        .arg("--config")
        .arg(&config_path)
        .args(["review", "Capitals"])
        .write_stdin("Tokyo\nParis\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("type answer"))
        .stdout(predicate::str::contains("No more cards!"));
}

#[test]
fn test_missing_deck_dir_is_config_error() {
    let fx = setup();

    Command::new(assert_cmd::cargo::cargo_bin!("sprout"))
        .arg("--decks")
        .arg(fx.decks.join("nope"))
        .arg("--db")
        .arg(&fx.db)
        .arg("decks")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"));
}
