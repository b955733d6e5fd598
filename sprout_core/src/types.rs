//! Core domain types shared by the deck manager, sessions and the CLI.

use crate::scheduler::CardStat;
use crate::Error;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Cards and Decks
// ============================================================================

/// A card as handed over by the card source, before stats are attached
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCard {
    pub id: String,
    pub question: String,
    pub answer: String,
}

impl RawCard {
    pub fn new(id: impl Into<String>, question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// A card with its learning statistics attached
#[derive(Clone, Debug)]
pub struct Card {
    pub id: String,
    pub question: String,
    pub answer: String,
    pub stats: CardStat,
}

/// A named, ordered collection of cards
#[derive(Clone, Debug)]
pub struct Deck {
    pub name: String,
    pub cards: Vec<Card>,
    /// Ids of cards whose stored record could not be decoded
    pub unavailable: Vec<String>,
}

// ============================================================================
// Reporting
// ============================================================================

/// Per-card statistics for reporting, in deck order
#[derive(Clone, Debug, Serialize)]
pub struct CardReport {
    pub id: String,
    pub question: String,
    pub difficulty: f64,
    pub interval: f64,
    /// Overdue ratio, the same value used to order review sessions
    pub dueness: f64,
    pub next_review_at: DateTime<FixedOffset>,
}

/// One line of the deck listing
#[derive(Clone, Debug, Serialize)]
pub struct DeckSummary {
    pub name: String,
    pub cards_ready: usize,
    /// Earliest review time among cards that are not yet due
    pub next_review_at: Option<DateTime<FixedOffset>>,
}

// ============================================================================
// Rating
// ============================================================================

/// How a session turns the learner's response into a rating
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingMode {
    /// The learner grades themselves with a [`ReviewScore`]
    #[default]
    #[serde(alias = "self")]
    SelfRated,
    /// The learner types the answer; exact matches pass
    #[serde(alias = "auto")]
    AutoRated,
}

impl FromStr for RatingMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_lowercase().as_str() {
            "self" | "self_rated" => Ok(RatingMode::SelfRated),
            "auto" | "auto_rated" => Ok(RatingMode::AutoRated),
            other => Err(Error::Config(format!(
                "Unknown rating mode {:?} (expected \"self\" or \"auto\")",
                other
            ))),
        }
    }
}

impl fmt::Display for RatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RatingMode::SelfRated => write!(f, "self"),
            RatingMode::AutoRated => write!(f, "auto"),
        }
    }
}

/// Self-assessed recall, lowest to highest
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewScore {
    Again,
    Hard,
    Good,
    Easy,
}

impl ReviewScore {
    pub const ALL: [ReviewScore; 4] = [
        ReviewScore::Again,
        ReviewScore::Hard,
        ReviewScore::Good,
        ReviewScore::Easy,
    ];

    /// Rating fed to the scheduler.
    ///
    /// `Hard` sits exactly on the success threshold: the card was recalled,
    /// just not comfortably.
    pub fn rating(self) -> f64 {
        match self {
            ReviewScore::Again => 0.0,
            ReviewScore::Hard => 0.6,
            ReviewScore::Good => 0.8,
            ReviewScore::Easy => 1.0,
        }
    }

    /// Keyboard digit used by the terminal prompt (1-4)
    pub fn from_digit(digit: char) -> Option<Self> {
        match digit {
            '1' => Some(ReviewScore::Again),
            '2' => Some(ReviewScore::Hard),
            '3' => Some(ReviewScore::Good),
            '4' => Some(ReviewScore::Easy),
            _ => None,
        }
    }
}
