//! Review sessions.
//!
//! A session is one ordered pass over a deck's due cards. Each card is
//! presented, its answer revealed, then scored; the score advances the card's
//! [`CardStat`](crate::CardStat) and the new record is written through the
//! stats store before the session moves on.
//!
//! ```text
//! Presenting --resolve_answer--> AwaitingScore --advance--> Presenting | Finished
//! ```

use crate::{Card, Deck, Error, RatingMode, Result, ReviewScore, StatsStore};
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Where a session is in its card cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Question shown, answer hidden
    Presenting,
    /// Answer revealed, waiting for a score
    AwaitingScore,
    /// No cards left
    Finished,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Presenting => write!(f, "presenting a question"),
            Phase::AwaitingScore => write!(f, "awaiting a score"),
            Phase::Finished => write!(f, "finished"),
        }
    }
}

/// The learner's response to a card
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Score {
    /// Self-assessment, for [`RatingMode::SelfRated`] sessions
    Rated(ReviewScore),
    /// Typed answer, for [`RatingMode::AutoRated`] sessions
    Typed(String),
}

/// Read-only view of a session for presentation layers
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub deck: String,
    /// Current question; `None` once finished
    pub question: Option<String>,
    /// Answer length in characters, for sizing an input box
    pub answer_len: usize,
    pub rating_mode: RatingMode,
    pub total: usize,
    pub left: usize,
    pub finished: bool,
}

/// Exact, case-sensitive comparison used by auto-rated sessions
pub fn matches_answer(typed: &str, answer: &str) -> bool {
    typed == answer
}

/// One pass over a deck's due cards
pub struct ReviewSession<S: StatsStore + ?Sized> {
    deck: Deck,
    store: Arc<S>,
    mode: RatingMode,
    queue: Vec<usize>,
    position: usize,
    phase: Phase,
    total: usize,
    left: usize,
}

impl<S: StatsStore + ?Sized> ReviewSession<S> {
    /// Start a session over the cards of `deck` that are due now
    pub fn new(deck: Deck, store: Arc<S>, mode: RatingMode) -> Self {
        Self::new_at(deck, store, mode, crate::scheduler::now())
    }

    /// Start a session over the cards that are due at `now`.
    ///
    /// Most overdue cards come first; ties keep deck order.
    pub fn new_at(deck: Deck, store: Arc<S>, mode: RatingMode, now: DateTime<FixedOffset>) -> Self {
        let mut due: Vec<(usize, f64)> = deck
            .cards
            .iter()
            .enumerate()
            .filter(|(_, card)| card.stats.is_due_at(now))
            .map(|(idx, card)| (idx, card.stats.sort_param_at(now)))
            .collect();
        due.sort_by(|a, b| b.1.total_cmp(&a.1));

        let queue: Vec<usize> = due.into_iter().map(|(idx, _)| idx).collect();
        let total = queue.len();
        let phase = if total == 0 {
            Phase::Finished
        } else {
            Phase::Presenting
        };

        tracing::info!(
            "Review session for {:?}: {} of {} cards due",
            deck.name,
            total,
            deck.cards.len()
        );

        Self {
            deck,
            store,
            mode,
            queue,
            position: 0,
            phase,
            total,
            left: total,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn rating_mode(&self) -> RatingMode {
        self.mode
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn left(&self) -> usize {
        self.left
    }

    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    /// Give back the deck with all committed stats
    pub fn into_deck(self) -> Deck {
        self.deck
    }

    /// The card being reviewed, if any
    pub fn current(&self) -> Option<&Card> {
        if self.phase == Phase::Finished {
            return None;
        }
        self.queue
            .get(self.position)
            .and_then(|&idx| self.deck.cards.get(idx))
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let current = self.current();
        SessionSnapshot {
            deck: self.deck.name.clone(),
            question: current.map(|c| c.question.clone()),
            answer_len: current.map_or(0, |c| c.answer.chars().count()),
            rating_mode: self.mode,
            total: self.total,
            left: self.left,
            finished: self.phase == Phase::Finished,
        }
    }

    /// Reveal the current card's answer
    pub fn resolve_answer(&mut self) -> Result<&str> {
        if self.phase != Phase::Presenting {
            return Err(Error::SessionState {
                operation: "resolve answer",
                phase: self.phase,
            });
        }

        self.phase = Phase::AwaitingScore;
        let idx = self.queue[self.position];
        Ok(&self.deck.cards[idx].answer)
    }

    /// Score the current card and move on
    pub fn advance(&mut self, score: Score) -> Result<SessionSnapshot> {
        self.advance_at(score, crate::scheduler::now())
    }

    /// Score the current card as of `now`.
    ///
    /// The card's stats only change once the store has accepted the new
    /// record. On a store error the session stays on this card awaiting a
    /// score.
    pub fn advance_at(&mut self, score: Score, now: DateTime<FixedOffset>) -> Result<SessionSnapshot> {
        if self.phase != Phase::AwaitingScore {
            return Err(Error::SessionState {
                operation: "advance",
                phase: self.phase,
            });
        }

        let idx = self.queue[self.position];
        let card = &self.deck.cards[idx];
        let rating = self.rating_for(&score, card)?;

        let mut stats = card.stats.clone();
        let interval = stats.advance_at(rating, now);
        let record = stats.to_json()?;
        self.store.put(&self.deck.name, &card.id, &record)?;

        tracing::debug!(
            "Card {:?} rated {:.2}, next review in {:.2} days",
            card.id,
            rating,
            interval
        );

        self.deck.cards[idx].stats = stats;
        self.position += 1;
        self.left -= 1;
        self.phase = if self.left == 0 {
            tracing::info!("Review session for {:?} finished", self.deck.name);
            Phase::Finished
        } else {
            Phase::Presenting
        };

        Ok(self.snapshot())
    }

    fn rating_for(&self, score: &Score, card: &Card) -> Result<f64> {
        match (self.mode, score) {
            (RatingMode::SelfRated, Score::Rated(s)) => Ok(s.rating()),
            (RatingMode::AutoRated, Score::Typed(typed)) => {
                if matches_answer(typed, &card.answer) {
                    Ok(1.0)
                } else {
                    Ok(0.0)
                }
            }
            (RatingMode::SelfRated, Score::Typed(_)) => Err(Error::InvalidScore(
                "self-rated sessions take a review score, not a typed answer".into(),
            )),
            (RatingMode::AutoRated, Score::Rated(_)) => Err(Error::InvalidScore(
                "auto-rated sessions take a typed answer, not a review score".into(),
            )),
        }
    }
}
