//! Where decks come from.
//!
//! The core never interprets deck files itself; it asks a [`CardSource`] for
//! deck names and `(id, question, answer)` triples. [`DeckDir`] is a small
//! source that reads one TOML file per deck; [`MemorySource`] serves decks
//! built in code.
//!
//! A deck file looks like:
//!
//! ```toml
//! [[cards]]
//! question = "あ"
//! answer = "a"
//!
//! [[cards]]
//! id = "ka"
//! question = "か"
//! answer = "ka"
//! ```

use crate::{Error, RawCard, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const DECK_EXTENSION: &str = "toml";

/// Supplier of deck contents
pub trait CardSource {
    /// Names of all available decks
    fn deck_names(&self) -> Result<Vec<String>>;

    /// Cards of one deck in source order.
    ///
    /// Returns [`Error::DeckNotFound`] for an unknown deck and
    /// [`Error::DeckLoad`] when the deck exists but cannot be read.
    fn cards(&self, deck: &str) -> Result<Vec<RawCard>>;
}

/// Decks held in memory
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    decks: BTreeMap<String, Vec<RawCard>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a deck
    pub fn with_deck(mut self, name: impl Into<String>, cards: Vec<RawCard>) -> Self {
        self.decks.insert(name.into(), cards);
        self
    }
}

impl CardSource for MemorySource {
    fn deck_names(&self) -> Result<Vec<String>> {
        Ok(self.decks.keys().cloned().collect())
    }

    fn cards(&self, deck: &str) -> Result<Vec<RawCard>> {
        self.decks
            .get(deck)
            .cloned()
            .ok_or_else(|| Error::DeckNotFound(deck.to_string()))
    }
}

/// Directory of `<deck name>.toml` files
#[derive(Clone, Debug)]
pub struct DeckDir {
    root: PathBuf,
}

#[derive(Debug, Deserialize)]
struct DeckFile {
    #[serde(default)]
    cards: Vec<DeckFileCard>,
}

#[derive(Debug, Deserialize)]
struct DeckFileCard {
    id: Option<String>,
    question: String,
    answer: String,
}

impl DeckDir {
    /// Use `root` as the deck directory; it must exist
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::Config(format!(
                "Deck directory {:?} does not exist",
                root
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File backing `deck`; `None` for names that would leave the root
    fn deck_path(&self, deck: &str) -> Option<PathBuf> {
        let escapes = deck.is_empty()
            || deck == "."
            || deck.contains("..")
            || deck.contains('/')
            || deck.contains('\\');
        if escapes {
            return None;
        }
        Some(self.root.join(format!("{}.{}", deck, DECK_EXTENSION)))
    }
}

impl CardSource for DeckDir {
    fn deck_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(DECK_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn cards(&self, deck: &str) -> Result<Vec<RawCard>> {
        let path = match self.deck_path(deck) {
            Some(path) if path.is_file() => path,
            _ => return Err(Error::DeckNotFound(deck.to_string())),
        };

        let load_err = |reason: String| Error::DeckLoad {
            deck: deck.to_string(),
            reason,
        };
        let contents = std::fs::read_to_string(&path).map_err(|e| load_err(e.to_string()))?;
        let file: DeckFile = toml::from_str(&contents).map_err(|e| load_err(e.to_string()))?;

        tracing::debug!("Read {} cards from {:?}", file.cards.len(), path);
        Ok(file
            .cards
            .into_iter()
            .map(|c| RawCard {
                id: c.id.unwrap_or_else(|| c.question.clone()),
                question: c.question,
                answer: c.answer,
            })
            .collect())
    }
}
