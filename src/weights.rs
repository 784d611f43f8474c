// SPDX-License-Identifier: MPL-2.0

//! Time-of-day weight resolution.
//!
//! The weekly schedule is a sparse list of `(day, time, weights)` entries.
//! The entry in control at any instant is the most recent one at or before
//! that instant; a day with no entries inherits from the latest entry of
//! the nearest preceding day, wrapping around the week.

use chrono::{Datelike, NaiveDateTime};
use hearthview_config::{WeightSet, WeightingEntry};

/// Resolve the normalized weight vector in effect at `now`.
///
/// An empty schedule resolves to equal weights so the engine always has
/// something sensible to sample with.
#[must_use]
pub fn resolve(entries: &[WeightingEntry], now: NaiveDateTime) -> WeightSet {
    let Some(entry) = active_entry(entries, now) else {
        tracing::debug!("weighting schedule is empty; using equal weights");
        return WeightSet::equal();
    };
    tracing::debug!(
        day = ?entry.day,
        time = %entry.time.format("%H:%M"),
        "resolved active weighting entry"
    );
    entry.weights.normalized()
}

/// The schedule entry governing `now`, or `None` when the schedule is empty.
///
/// Entries are assumed sorted by `(day, time)`, which config loading
/// guarantees. Today is searched for the latest entry at or before the
/// current time; failing that, prior days are walked newest-first, each
/// contributing its final entry of the day. Walking a full week lands back
/// on today's weekday, whose latest entry (from last week) closes the loop.
#[must_use]
pub fn active_entry(entries: &[WeightingEntry], now: NaiveDateTime) -> Option<&WeightingEntry> {
    let today = now.weekday().num_days_from_monday();
    let time = now.time();

    let same_day = entries
        .iter()
        .filter(|e| e.day.number() == today && e.time <= time)
        .next_back();
    if same_day.is_some() {
        return same_day;
    }

    for offset in 1..=7 {
        let day = (today + 7 - offset) % 7;
        let latest = entries.iter().filter(|e| e.day.number() == day).next_back();
        if latest.is_some() {
            return latest;
        }
    }

    None
}

/// True when two weight vectors differ enough to justify a playlist
/// rebuild. Sub-permille drift from float normalization does not count.
#[must_use]
pub fn materially_differ(a: &WeightSet, b: &WeightSet) -> bool {
    !a.approx_eq(b, 1e-3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use hearthview_config::Day;

    fn entry(day: Day, hhmm: &str, media: f32, calendar: f32) -> WeightingEntry {
        WeightingEntry {
            day,
            time: NaiveTime::parse_from_str(hhmm, "%H:%M").unwrap(),
            weights: WeightSet {
                media,
                calendar,
                ..WeightSet::default()
            },
        }
    }

    fn at(day: u32, hhmm: &str) -> NaiveDateTime {
        // 2024-07-01 is a Monday.
        NaiveDate::from_ymd_opt(2024, 7, 1 + day)
            .unwrap()
            .and_time(NaiveTime::parse_from_str(hhmm, "%H:%M").unwrap())
    }

    fn schedule() -> Vec<WeightingEntry> {
        vec![
            entry(Day::Monday, "06:00", 0.8, 0.2),
            entry(Day::Monday, "18:00", 0.2, 0.8),
        ]
    }

    #[test]
    fn morning_entry_governs_midday() {
        let weights = resolve(&schedule(), at(0, "12:00"));
        assert!((weights.media - 0.8).abs() < 1e-6);
        assert!((weights.calendar - 0.2).abs() < 1e-6);
    }

    #[test]
    fn evening_entry_takes_over_at_its_time() {
        let weights = resolve(&schedule(), at(0, "18:00"));
        assert!((weights.media - 0.2).abs() < 1e-6);
    }

    #[test]
    fn before_first_entry_falls_back_to_previous_day() {
        // Monday 05:00 predates both Monday entries; the wrap lands on
        // Monday's own latest entry from the prior week.
        let weights = resolve(&schedule(), at(0, "05:00"));
        assert!((weights.calendar - 0.8).abs() < 1e-6);
    }

    #[test]
    fn empty_day_inherits_prior_day_latest() {
        // Tuesday has no entries of its own.
        let weights = resolve(&schedule(), at(1, "09:00"));
        assert!((weights.calendar - 0.8).abs() < 1e-6);
        assert!((weights.media - 0.2).abs() < 1e-6);
    }

    #[test]
    fn empty_schedule_resolves_to_equal() {
        let weights = resolve(&[], at(0, "12:00"));
        assert_eq!(weights, WeightSet::equal());
    }

    #[test]
    fn resolved_weights_sum_to_one() {
        let unnormalized = vec![entry(Day::Monday, "06:00", 3.0, 1.0)];
        let weights = resolve(&unnormalized, at(0, "12:00"));
        assert!((weights.sum() - 1.0).abs() < 1e-6);
        assert!((weights.media - 0.75).abs() < 1e-6);
    }

    #[test]
    fn material_difference_ignores_float_noise() {
        let a = WeightSet::equal();
        let mut b = a;
        b.media += 1e-5;
        assert!(!materially_differ(&a, &b));
        b.media += 0.1;
        assert!(materially_differ(&a, &b));
    }
}
