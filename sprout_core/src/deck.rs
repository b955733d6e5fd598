//! Deck loading and reporting.
//!
//! [`DeckManager`] joins what the card source says a deck contains with what
//! the stats store remembers about each card.

use crate::{
    Card, CardReport, CardSource, CardStat, Deck, DeckSummary, Error, RatingMode, Result,
    ReviewSession, StatsStore,
};
use chrono::{DateTime, FixedOffset};
use std::collections::HashSet;
use std::sync::Arc;

pub struct DeckManager<C, S: ?Sized> {
    source: C,
    store: Arc<S>,
}

impl<C: CardSource, S: StatsStore + ?Sized> DeckManager<C, S> {
    pub fn new(source: C, store: Arc<S>) -> Self {
        Self { source, store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Names of all decks, sorted
    pub fn list_decks(&self) -> Result<Vec<String>> {
        let mut names = self.source.deck_names()?;
        names.sort();
        Ok(names)
    }

    /// Load a deck with each card's stats attached.
    ///
    /// Cards without a stored record start with fresh stats. Cards whose
    /// record fails to decode are left out and listed in
    /// [`Deck::unavailable`].
    pub fn load_deck(&self, name: &str) -> Result<Deck> {
        let raw_cards = self.source.cards(name)?;

        {
            let mut seen = HashSet::new();
            if let Some(dup) = raw_cards.iter().find(|c| !seen.insert(c.id.as_str())) {
                return Err(Error::DeckLoad {
                    deck: name.to_string(),
                    reason: format!("duplicate card id {:?}", dup.id),
                });
            }
        }

        // One timestamp so new cards tie and keep deck order in sessions
        let now = crate::scheduler::now();
        let mut cards = Vec::with_capacity(raw_cards.len());
        let mut unavailable = Vec::new();
        for raw in raw_cards {
            let stats = match self.store.get(name, &raw.id)? {
                None => CardStat::new_at(now),
                Some(record) => match CardStat::from_json(&record) {
                    Ok(stats) => stats,
                    Err(e) => {
                        tracing::warn!("Skipping card {:?} in deck {:?}: {}", raw.id, name, e);
                        unavailable.push(raw.id);
                        continue;
                    }
                },
            };
            cards.push(Card {
                id: raw.id,
                question: raw.question,
                answer: raw.answer,
                stats,
            });
        }

        tracing::info!(
            "Loaded deck {:?}: {} cards ({} unavailable)",
            name,
            cards.len(),
            unavailable.len()
        );

        Ok(Deck {
            name: name.to_string(),
            cards,
            unavailable,
        })
    }

    /// Per-card statistics in deck order
    pub fn deck_stats(&self, name: &str) -> Result<Vec<CardReport>> {
        self.deck_stats_at(name, crate::scheduler::now())
    }

    pub fn deck_stats_at(&self, name: &str, now: DateTime<FixedOffset>) -> Result<Vec<CardReport>> {
        let deck = self.load_deck(name)?;
        Ok(deck
            .cards
            .into_iter()
            .map(|card| CardReport {
                dueness: card.stats.sort_param_at(now),
                next_review_at: card.stats.next_review_at(),
                difficulty: card.stats.difficulty,
                interval: card.stats.interval,
                id: card.id,
                question: card.question,
            })
            .collect())
    }

    /// Ready counts for every deck that loads; broken decks are skipped
    pub fn deck_summaries(&self) -> Result<Vec<DeckSummary>> {
        self.deck_summaries_at(crate::scheduler::now())
    }

    pub fn deck_summaries_at(&self, now: DateTime<FixedOffset>) -> Result<Vec<DeckSummary>> {
        let mut summaries = Vec::new();
        for name in self.list_decks()? {
            let deck = match self.load_deck(&name) {
                Ok(deck) => deck,
                Err(e) if e.is_store() => return Err(e),
                Err(e) => {
                    tracing::warn!("Skipping deck {:?}: {}", name, e);
                    continue;
                }
            };

            let cards_ready = deck.cards.iter().filter(|c| c.stats.is_due_at(now)).count();
            let next_review_at = deck
                .cards
                .iter()
                .map(|c| c.stats.next_review_at())
                .filter(|at| *at > now)
                .min();

            summaries.push(DeckSummary {
                name,
                cards_ready,
                next_review_at,
            });
        }
        Ok(summaries)
    }

    /// Load a deck and start reviewing its due cards
    pub fn review_session(&self, name: &str, mode: RatingMode) -> Result<ReviewSession<S>> {
        let deck = self.load_deck(name)?;
        Ok(ReviewSession::new(deck, Arc::clone(&self.store), mode))
    }

    pub fn review_session_at(
        &self,
        name: &str,
        mode: RatingMode,
        now: DateTime<FixedOffset>,
    ) -> Result<ReviewSession<S>> {
        let deck = self.load_deck(name)?;
        Ok(ReviewSession::new_at(deck, Arc::clone(&self.store), mode, now))
    }
}
