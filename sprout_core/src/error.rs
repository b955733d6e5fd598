//! Error types for the sprout_core library.

use crate::session::Phase;
use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for sprout_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Bad startup parameters (store path, deck root, rating mode)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The card source has no deck with this name
    #[error("Deck not found: {0}")]
    DeckNotFound(String),

    /// One deck's source is missing or malformed
    #[error("Failed to load deck {deck:?}: {reason}")]
    DeckLoad { deck: String, reason: String },

    /// The stats database could not be opened, read or written
    #[error("Stats store error: {0}")]
    Store(String),

    /// Underlying I/O failure of the stats database
    #[error("Stats store I/O error: {0}")]
    StoreIo(#[source] io::Error),

    /// A stored card record does not match the expected schema
    #[error("Malformed card record: {0}")]
    Format(String),

    /// A session operation was invoked in a phase that does not permit it
    #[error("Cannot {operation} while session is {phase}")]
    SessionState {
        operation: &'static str,
        phase: Phase,
    },

    /// The score kind does not match the session's rating mode
    #[error("Invalid score: {0}")]
    InvalidScore(String),
}

impl Error {
    /// True for failures of the stats database itself
    pub fn is_store(&self) -> bool {
        matches!(self, Error::Store(_) | Error::StoreIo(_))
    }
}
