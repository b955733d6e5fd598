#![forbid(unsafe_code)]

//! Core scheduling and review logic for Sprout flashcards.
//!
//! This crate provides:
//! - The SM2+ scheduling algorithm and per-card stats records
//! - A durable single-file stats store
//! - Deck loading and reporting on top of a pluggable card source
//! - The review session state machine
//! - CSV export of review history

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod scheduler;
pub mod store;
pub mod source;
pub mod deck;
pub mod session;
pub mod history;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use scheduler::{CardStat, IntervalSnapshot};
pub use store::{FileStore, StatsStore};
pub use source::{CardSource, DeckDir, MemorySource};
pub use deck::DeckManager;
pub use session::{Phase, ReviewSession, Score, SessionSnapshot};
pub use history::export_history;
