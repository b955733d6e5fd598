//! SM2+ scheduling for a single card.
//!
//! A [`CardStat`] is the durable per-card record. Every review feeds a rating
//! in `[0, 1]` into [`CardStat::advance_at`], which updates the difficulty
//! estimate, stretches or shrinks the interval and appends an
//! [`IntervalSnapshot`] to the permanent history.
//!
//! Ratings at or above [`SUCCESS_THRESHOLD`] count as a successful recall.

use crate::{Error, Result};
use chrono::{DateTime, Duration, FixedOffset, Local};
use serde::{Deserialize, Serialize};

/// Ratings at or above this value count as recalled
pub const SUCCESS_THRESHOLD: f64 = 0.6;
/// Shortest interval a card can be scheduled for, in days
pub const MIN_INTERVAL: f64 = 0.2;
/// Longest interval a card can be scheduled for, in days
pub const MAX_INTERVAL: f64 = 300.0;
/// Cap on how overdue a card can count as
pub const MAX_OVERDUE: f64 = 2.0;

const INITIAL_DIFFICULTY: f64 = 0.3;
const INITIAL_BACKDATE_HOURS: i64 = 5;
const MILLIS_PER_HOUR: f64 = 3_600_000.0;
const MILLIS_PER_DAY: f64 = 24.0 * MILLIS_PER_HOUR;

/// Interval and difficulty recorded at one review
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntervalSnapshot {
    /// Unix seconds of the review
    pub ts: i64,
    /// Interval before the review updated it
    pub interval: f64,
    /// Difficulty after the review updated it
    pub difficulty: f64,
}

/// Persisted learning statistics for one card
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredRecord")]
pub struct CardStat {
    #[serde(rename = "LastReviewedAt")]
    pub last_reviewed_at: DateTime<FixedOffset>,
    #[serde(rename = "Difficulty")]
    pub difficulty: f64,
    #[serde(rename = "Interval")]
    pub interval: f64,
    #[serde(rename = "Historical")]
    pub historical: Vec<IntervalSnapshot>,
}

/// Wire shape of a stored record, validated before it becomes a `CardStat`
#[derive(Deserialize)]
struct StoredRecord {
    #[serde(rename = "LastReviewedAt", alias = "lastReviewedAt")]
    last_reviewed_at: DateTime<FixedOffset>,
    #[serde(rename = "Difficulty", alias = "difficulty")]
    difficulty: f64,
    #[serde(rename = "Interval", alias = "interval")]
    interval: f64,
    #[serde(rename = "Historical", alias = "historical")]
    historical: Vec<IntervalSnapshot>,
}

impl TryFrom<StoredRecord> for CardStat {
    type Error = String;

    fn try_from(record: StoredRecord) -> std::result::Result<Self, String> {
        if !(0.0..=1.0).contains(&record.difficulty) {
            return Err(format!("difficulty {} outside [0, 1]", record.difficulty));
        }
        if !(MIN_INTERVAL..=MAX_INTERVAL).contains(&record.interval) {
            return Err(format!(
                "interval {} outside [{}, {}]",
                record.interval, MIN_INTERVAL, MAX_INTERVAL
            ));
        }
        if let Some(bad) = record
            .historical
            .iter()
            .find(|s| !s.interval.is_finite() || !s.difficulty.is_finite())
        {
            return Err(format!("non-finite value in snapshot at ts {}", bad.ts));
        }

        Ok(CardStat {
            last_reviewed_at: record.last_reviewed_at,
            difficulty: record.difficulty,
            interval: record.interval,
            historical: record.historical,
        })
    }
}

/// Current wall-clock time with the local UTC offset
pub fn now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

fn hours_between(from: DateTime<FixedOffset>, to: DateTime<FixedOffset>) -> f64 {
    let elapsed = to - from;
    match elapsed.num_microseconds() {
        Some(us) => us as f64 / 1_000.0 / MILLIS_PER_HOUR,
        None => elapsed.num_milliseconds() as f64 / MILLIS_PER_HOUR,
    }
}

impl Default for CardStat {
    fn default() -> Self {
        Self::new()
    }
}

impl CardStat {
    /// Stats for a card that has never been reviewed
    pub fn new() -> Self {
        Self::new_at(now())
    }

    /// Stats for a new card, backdated so it is due at `now`
    pub fn new_at(now: DateTime<FixedOffset>) -> Self {
        Self {
            last_reviewed_at: now - Duration::hours(INITIAL_BACKDATE_HOURS),
            difficulty: INITIAL_DIFFICULTY,
            interval: MIN_INTERVAL,
            historical: Vec::new(),
        }
    }

    /// When the card is next due for review
    pub fn next_review_at(&self) -> DateTime<FixedOffset> {
        let millis = (self.interval * MILLIS_PER_DAY).round() as i64;
        self.last_reviewed_at + Duration::milliseconds(millis)
    }

    /// Whether the card is due at `now`
    pub fn is_due_at(&self, now: DateTime<FixedOffset>) -> bool {
        self.next_review_at() <= now
    }

    /// Elapsed time as a fraction of the interval, capped at [`MAX_OVERDUE`]
    pub fn percent_overdue_at(&self, now: DateTime<FixedOffset>) -> f64 {
        let overdue = hours_between(self.last_reviewed_at, now) / (24.0 * self.interval);
        // A review stamped in the future (clock skew) counts as not overdue
        overdue.clamp(0.0, MAX_OVERDUE)
    }

    /// Review priority; higher means more overdue
    pub fn sort_param(&self) -> f64 {
        self.sort_param_at(now())
    }

    pub fn sort_param_at(&self, now: DateTime<FixedOffset>) -> f64 {
        self.percent_overdue_at(now)
    }

    /// Record a review with the given rating and return the new interval
    pub fn advance(&mut self, rating: f64) -> f64 {
        self.advance_at(rating, now())
    }

    /// Record a review made at `now`.
    ///
    /// The rating is clamped to `[0, 1]`; NaN counts as a total miss.
    pub fn advance_at(&mut self, rating: f64, now: DateTime<FixedOffset>) -> f64 {
        let rating = if rating.is_nan() {
            0.0
        } else {
            rating.clamp(0.0, 1.0)
        };
        let success = rating >= SUCCESS_THRESHOLD;
        let percent_overdue = if success {
            self.percent_overdue_at(now)
        } else {
            1.0
        };

        self.difficulty += percent_overdue / 50.0 * (8.0 - 9.0 * rating);
        self.difficulty = self.difficulty.clamp(0.0, 1.0);
        let difficulty_weight = 3.5 - 1.7 * self.difficulty;

        let (min_interval, factor) = if success {
            (
                MIN_INTERVAL,
                MIN_INTERVAL + (difficulty_weight - 1.0) * percent_overdue,
            )
        } else {
            let min_interval = self.interval.min(1.0);
            (min_interval, min_interval / difficulty_weight.powi(2))
        };

        self.historical.push(IntervalSnapshot {
            ts: now.timestamp(),
            interval: self.interval,
            difficulty: self.difficulty,
        });

        self.last_reviewed_at = now;
        self.interval = (self.interval * factor).clamp(min_interval, MAX_INTERVAL);

        tracing::trace!(
            rating,
            success,
            interval = self.interval,
            difficulty = self.difficulty,
            "Advanced card stats"
        );
        self.interval
    }

    /// Serialize to the canonical stored form
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse and validate a stored record
    pub fn from_json(record: &str) -> Result<Self> {
        serde_json::from_str(record).map_err(|e| Error::Format(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 10, 12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_new_card_defaults() {
        let now = fixed_now();
        let stat = CardStat::new_at(now);

        assert_eq!(stat.difficulty, 0.3);
        assert_eq!(stat.interval, 0.2);
        assert!(stat.historical.is_empty());
        assert_eq!(now - stat.last_reviewed_at, Duration::hours(5));
        assert!(stat.is_due_at(now));
    }

    #[test]
    fn test_fresh_card_success_matches_formula() {
        let now = fixed_now();
        let mut stat = CardStat::new_at(now);

        let interval = stat.advance_at(0.8, now);

        let percent_overdue: f64 = (5.0 / (24.0 * 0.2_f64)).min(2.0);
        let difficulty = 0.3 + percent_overdue / 50.0 * (8.0 - 9.0 * 0.8);
        let weight = 3.5 - 1.7 * difficulty;
        let factor = 0.2 + (weight - 1.0) * percent_overdue;
        let expected = (0.2 * factor).clamp(0.2, 300.0);

        assert!((stat.difficulty - difficulty).abs() < 1e-9);
        assert!((interval - expected).abs() < 1e-9);
        assert_eq!(stat.interval, interval);
        assert_eq!(stat.last_reviewed_at, now);
    }

    #[test]
    fn test_snapshot_records_old_interval_and_new_difficulty() {
        let now = fixed_now();
        let mut stat = CardStat::new_at(now);

        stat.advance_at(1.0, now);

        assert_eq!(stat.historical.len(), 1);
        let snap = &stat.historical[0];
        assert_eq!(snap.ts, now.timestamp());
        assert_eq!(snap.interval, 0.2);
        assert_eq!(snap.difficulty, stat.difficulty);
    }

    #[test]
    fn test_failure_shrinks_interval_and_raises_difficulty() {
        let now = fixed_now();
        let mut stat = CardStat {
            last_reviewed_at: now - Duration::days(10),
            difficulty: 0.5,
            interval: 10.0,
            historical: vec![],
        };

        let interval = stat.advance_at(0.0, now);

        // Failure ignores overdue-ness: percent_overdue is fixed at 1
        let difficulty: f64 = 0.5 + 1.0 / 50.0 * 8.0;
        let weight = 3.5 - 1.7 * difficulty;
        let expected = (10.0 * (1.0 / weight.powi(2))).clamp(1.0, 300.0);

        assert!((stat.difficulty - difficulty).abs() < 1e-12);
        assert!((interval - expected).abs() < 1e-12);
        assert!(interval < 10.0);
    }

    #[test]
    fn test_bounds_hold_for_all_ratings() {
        let now = fixed_now();
        let starts = [
            CardStat::new_at(now),
            CardStat {
                last_reviewed_at: now - Duration::days(400),
                difficulty: 0.0,
                interval: 300.0,
                historical: vec![],
            },
            CardStat {
                last_reviewed_at: now,
                difficulty: 1.0,
                interval: 0.2,
                historical: vec![],
            },
        ];

        for start in starts {
            for step in 0..100 {
                let rating = step as f64 / 100.0;
                let mut stat = start.clone();
                let mut at = now;
                // Walk a few reviews deep to reach non-initial states
                for _ in 0..5 {
                    at += Duration::hours(30);
                    stat.advance_at(rating, at);
                    assert!(
                        (MIN_INTERVAL..=MAX_INTERVAL).contains(&stat.interval),
                        "interval {} out of range for rating {}",
                        stat.interval,
                        rating
                    );
                    assert!((0.0..=1.0).contains(&stat.difficulty));
                }
            }
        }
    }

    #[test]
    fn test_out_of_range_rating_is_clamped() {
        let now = fixed_now();
        let mut high = CardStat::new_at(now);
        let mut top = CardStat::new_at(now);
        high.advance_at(7.5, now);
        top.advance_at(1.0, now);
        assert_eq!(high, top);

        let mut nan = CardStat::new_at(now);
        let mut bottom = CardStat::new_at(now);
        nan.advance_at(f64::NAN, now);
        bottom.advance_at(0.0, now);
        assert_eq!(nan, bottom);
    }

    #[test]
    fn test_sort_param_is_capped() {
        let now = fixed_now();
        let overdue = CardStat {
            last_reviewed_at: now - Duration::hours(48),
            difficulty: 0.3,
            interval: 1.0,
            historical: vec![],
        };
        let not_due = CardStat {
            last_reviewed_at: now - Duration::hours(12),
            difficulty: 0.3,
            interval: 1.0,
            historical: vec![],
        };

        assert_eq!(overdue.sort_param_at(now), 2.0);
        assert!(not_due.next_review_at() > now);
        assert!(not_due.sort_param_at(now) < 1.0);
        assert!(overdue.sort_param_at(now) > not_due.sort_param_at(now));
    }

    #[test]
    fn test_future_review_time_is_not_overdue() {
        let now = fixed_now();
        let skewed = CardStat {
            last_reviewed_at: now + Duration::hours(6),
            difficulty: 0.3,
            interval: 1.0,
            historical: vec![],
        };

        assert_eq!(skewed.percent_overdue_at(now), 0.0);
        assert_eq!(skewed.sort_param_at(now), 0.0);
        assert!(!skewed.is_due_at(now));

        // Zero overdue: difficulty is unchanged and the interval drops to the floor
        let mut stat = skewed.clone();
        let interval = stat.advance_at(1.0, now);
        assert_eq!(stat.difficulty, 0.3);
        assert_eq!(interval, MIN_INTERVAL);
    }

    #[test]
    fn test_next_review_at_adds_interval_days() {
        let now = fixed_now();
        let stat = CardStat {
            last_reviewed_at: now,
            difficulty: 0.3,
            interval: 1.5,
            historical: vec![],
        };
        assert_eq!(stat.next_review_at(), now + Duration::hours(36));
    }

    #[test]
    fn test_json_roundtrip_is_exact() {
        let ts = DateTime::parse_from_rfc3339("2023-11-05T08:15:30.123456789-07:00").unwrap();
        let stat = CardStat {
            last_reviewed_at: ts,
            difficulty: 0.1 + 0.2,
            interval: 1.0 / 3.0,
            historical: vec![IntervalSnapshot {
                ts: 1_699_197_330,
                interval: 0.2,
                difficulty: 0.316_666_666_666_666_7,
            }],
        };

        let json = stat.to_json().unwrap();
        let parsed = CardStat::from_json(&json).unwrap();

        assert_eq!(parsed, stat);
        assert_eq!(parsed.last_reviewed_at.offset(), ts.offset());
        assert_eq!(parsed.difficulty.to_bits(), stat.difficulty.to_bits());
        assert_eq!(parsed.to_json().unwrap(), json);
    }

    #[test]
    fn test_stored_field_names() {
        let json = CardStat::new_at(fixed_now()).to_json().unwrap();
        for key in ["LastReviewedAt", "Difficulty", "Interval", "Historical"] {
            assert!(json.contains(key), "missing {} in {}", key, json);
        }
    }

    #[test]
    fn test_unknown_fields_ignored_and_aliases_accepted() {
        let json = r#"{
            "lastReviewedAt": "2024-01-02T03:04:05Z",
            "difficulty": 0.4,
            "interval": 2.5,
            "historical": [{"ts": 1704164645, "interval": 1.0, "difficulty": 0.4}],
            "extra": "ignored"
        }"#;
        let stat = CardStat::from_json(json).unwrap();
        assert_eq!(stat.interval, 2.5);
        assert_eq!(stat.historical.len(), 1);
    }

    #[test]
    fn test_missing_field_is_format_error() {
        let json = r#"{"LastReviewedAt":"2024-01-02T03:04:05Z","Difficulty":0.4,"Interval":2.5}"#;
        assert!(matches!(CardStat::from_json(json), Err(Error::Format(_))));
    }

    #[test]
    fn test_out_of_range_record_is_format_error() {
        let zero_interval =
            r#"{"LastReviewedAt":"2024-01-02T03:04:05Z","Difficulty":0.4,"Interval":0,"Historical":[]}"#;
        let bad_difficulty =
            r#"{"LastReviewedAt":"2024-01-02T03:04:05Z","Difficulty":1.5,"Interval":1,"Historical":[]}"#;

        assert!(matches!(CardStat::from_json(zero_interval), Err(Error::Format(_))));
        assert!(matches!(CardStat::from_json(bad_difficulty), Err(Error::Format(_))));
        assert!(matches!(CardStat::from_json("not json"), Err(Error::Format(_))));
    }
}
