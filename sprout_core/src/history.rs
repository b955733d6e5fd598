//! CSV export of review history.
//!
//! Every review leaves an [`IntervalSnapshot`](crate::IntervalSnapshot) in the
//! card's stats. This module flattens those snapshots into CSV rows for
//! analysis in a spreadsheet or notebook.

use crate::{Deck, Result};
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    deck: &'a str,
    card_id: &'a str,
    reviewed_at: String,
    interval: f64,
    difficulty: f64,
}

/// The columns needed to recognise a row already exported
#[derive(Debug, Deserialize)]
struct ExportedRow {
    deck: String,
    card_id: String,
    reviewed_at: String,
}

/// Latest exported review time per `(deck, card_id)` in an existing CSV
fn last_exported(csv_path: &Path) -> Result<HashMap<(String, String), i64>> {
    let mut latest = HashMap::new();
    if !csv_path.exists() {
        return Ok(latest);
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    for row in reader.deserialize::<ExportedRow>() {
        let row = row?;
        let ts = match DateTime::parse_from_rfc3339(&row.reviewed_at) {
            Ok(at) => at.timestamp(),
            Err(_) => match row.reviewed_at.parse::<i64>() {
                Ok(ts) => ts,
                Err(_) => {
                    tracing::warn!("Ignoring history row with bad time {:?}", row.reviewed_at);
                    continue;
                }
            },
        };
        let entry = latest.entry((row.deck, row.card_id)).or_insert(ts);
        *entry = (*entry).max(ts);
    }
    Ok(latest)
}

/// Append the snapshots of `deck` not yet in the CSV at `csv_path`.
///
/// A snapshot is new when it is later than the last row already exported for
/// its card, so exporting repeatedly records each review once. Headers are
/// written when the file is new. The file is fsynced before returning.
/// Returns the number of rows written.
pub fn export_history(deck: &Deck, csv_path: &Path) -> Result<usize> {
    if let Some(parent) = csv_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let latest = last_exported(csv_path)?;

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(csv_path)?;
    let needs_headers = file.metadata()?.len() == 0;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_headers)
        .from_writer(&file);

    let mut count = 0;
    for card in &deck.cards {
        let after = latest
            .get(&(deck.name.clone(), card.id.clone()))
            .copied()
            .unwrap_or(i64::MIN);
        for snap in card.stats.historical.iter().filter(|s| s.ts > after) {
            let reviewed_at = DateTime::from_timestamp(snap.ts, 0)
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| snap.ts.to_string());
            writer.serialize(CsvRow {
                deck: &deck.name,
                card_id: &card.id,
                reviewed_at,
                interval: snap.interval,
                difficulty: snap.difficulty,
            })?;
            count += 1;
        }
    }

    writer.flush()?;
    drop(writer);
    file.sync_all()?;

    tracing::info!(
        "Exported {} history rows for deck {:?} to {:?}",
        count,
        deck.name,
        csv_path
    );
    Ok(count)
}
