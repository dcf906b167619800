//! Read-only views derived from completion history.
//!
//! Every function returns `None` when there is nothing to show, so callers
//! can render an explicit "no data" state instead of a row of zeros.

use std::collections::BTreeSet;

use chrono::{Datelike, Duration, NaiveDate, Timelike};
use serde::{Deserialize, Serialize};

use crate::collection::HabitCollection;
use crate::completion::is_completed_on;
use crate::habit::{CompletionHistory, HabitRecord};

/// Histogram order used by [`weekday_histogram`].
pub const WEEKDAY_LABELS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

pub const ROLLING_WINDOW: usize = 7;

/// Length of the trailing window used by [`monthly_active_days`], today included.
pub const ACTIVE_DAYS_WINDOW: i64 = 30;

/// Completed entries per weekday, Monday first.
pub fn weekday_histogram(history: &CompletionHistory) -> Option<[u32; 7]> {
    if history.is_empty() {
        return None;
    }
    let mut counts = [0u32; 7];
    for (date, entry) in history {
        if entry.completed {
            counts[date.weekday().num_days_from_monday() as usize] += 1;
        }
    }
    Some(counts)
}

/// Completed entries per hour of their timestamp. `None` when no completed
/// entry carries a timestamp.
pub fn hour_histogram(history: &CompletionHistory) -> Option<[u32; 24]> {
    let mut counts = [0u32; 24];
    let mut seen = false;
    for entry in history.values().filter(|entry| entry.completed) {
        if let Some(timestamp) = entry.timestamp {
            counts[timestamp.hour() as usize] += 1;
            seen = true;
        }
    }
    seen.then_some(counts)
}

/// Up to `limit` busiest hours as `(hour, count)`, busiest first.
pub fn peak_hours(histogram: &[u32; 24], limit: usize) -> Vec<(u32, u32)> {
    let mut hours: Vec<(u32, u32)> = histogram
        .iter()
        .enumerate()
        .filter(|(_, count)| **count > 0)
        .map(|(hour, count)| (hour as u32, *count))
        .collect();
    hours.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    hours.truncate(limit);
    hours
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatePoint {
    pub date: NaiveDate,
    /// Percentage in `0.0..=100.0`.
    pub rate: f64,
}

/// Completion rate over the trailing [`ROLLING_WINDOW`] recorded dates for
/// every recorded date. Needs at least two recorded dates.
pub fn rolling_completion_rate(history: &CompletionHistory) -> Option<Vec<RatePoint>> {
    if history.len() < 2 {
        return None;
    }
    let entries: Vec<(&NaiveDate, bool)> = history
        .iter()
        .map(|(date, entry)| (date, entry.completed))
        .collect();
    let series = entries
        .iter()
        .enumerate()
        .map(|(index, (date, _))| {
            let start = (index + 1).saturating_sub(ROLLING_WINDOW);
            let window = &entries[start..=index];
            let completed = window.iter().filter(|(_, done)| *done).count();
            RatePoint {
                date: **date,
                rate: completed as f64 / window.len() as f64 * 100.0,
            }
        })
        .collect();
    Some(series)
}

/// Distinct days in the trailing 30 days on which at least one habit was
/// completed. `None` when no habit has any history.
pub fn monthly_active_days(habits: &HabitCollection, today: NaiveDate) -> Option<u32> {
    if habits.iter().all(|habit| habit.history().is_empty()) {
        return None;
    }
    let since = today - Duration::days(ACTIVE_DAYS_WINDOW - 1);
    let active: BTreeSet<NaiveDate> = habits
        .iter()
        .flat_map(|habit| habit.history().iter())
        .filter(|(date, entry)| entry.completed && **date >= since && **date <= today)
        .map(|(date, _)| *date)
        .collect();
    Some(active.len() as u32)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeatLevel {
    None,
    Partial,
    Complete,
}

impl HeatLevel {
    pub fn classify(completed: usize, total: usize) -> Self {
        if completed == 0 {
            HeatLevel::None
        } else if completed >= total {
            HeatLevel::Complete
        } else {
            HeatLevel::Partial
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeatCell {
    pub date: NaiveDate,
    pub completed: usize,
    pub total: usize,
    pub percentage: f64,
    pub level: HeatLevel,
}

/// One cell per day from the earliest recorded date through `today`.
///
/// Today's denominator is the current habit count. Earlier days count the
/// habits that existed on that day, never fewer than the completions seen.
pub fn calendar_heatmap(habits: &HabitCollection, today: NaiveDate) -> Option<Vec<HeatCell>> {
    let earliest = habits
        .iter()
        .filter_map(|habit| habit.history().keys().next().copied())
        .min()?;
    if earliest > today {
        return None;
    }
    let cells = earliest
        .iter_days()
        .take_while(|date| *date <= today)
        .map(|date| {
            let completed = habits
                .iter()
                .filter(|habit| is_completed_on(habit, date))
                .count();
            let existing = if date == today {
                habits.len()
            } else {
                habits
                    .iter()
                    .filter(|habit| habit.created_at().date_naive() <= date)
                    .count()
            };
            let total = existing.max(completed);
            let percentage = if total == 0 {
                0.0
            } else {
                completed as f64 / total as f64 * 100.0
            };
            HeatCell {
                date,
                completed,
                total,
                percentage,
                level: HeatLevel::classify(completed, total),
            }
        })
        .collect();
    Some(cells)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitSummary {
    pub best_streak: u32,
    pub total_completions: usize,
    pub recorded_days: usize,
    /// Percentage rounded to one decimal.
    pub completion_rate: f64,
    pub first_recorded: NaiveDate,
}

pub fn habit_summary(habit: &HabitRecord) -> Option<HabitSummary> {
    let history = habit.history();
    let first_recorded = *history.keys().next()?;
    let total_completions = history.values().filter(|entry| entry.completed).count();
    let recorded_days = history.len();
    let completion_rate =
        (total_completions as f64 / recorded_days as f64 * 1000.0).round() / 10.0;
    Some(HabitSummary {
        best_streak: habit.best_streak(),
        total_completions,
        recorded_days,
        completion_rate,
        first_recorded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::complete;
    use crate::habit::{CompletionEntry, HabitDraft};
    use chrono::{DateTime, FixedOffset, TimeZone};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    fn at(day: u32, hour: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(-5 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 5, day, hour, 30, 0)
            .unwrap()
    }

    fn history(entries: &[(u32, bool)]) -> CompletionHistory {
        entries
            .iter()
            .map(|(day, done)| {
                (
                    date(*day),
                    CompletionEntry {
                        completed: *done,
                        timestamp: Some(at(*day, 7)),
                        value: None,
                    },
                )
            })
            .collect()
    }

    fn habit_created(day: u32) -> HabitRecord {
        HabitRecord::create(HabitDraft::new("h"), at(day, 6)).unwrap()
    }

    #[test]
    fn empty_history_has_no_data() {
        let empty = CompletionHistory::new();
        assert!(weekday_histogram(&empty).is_none());
        assert!(hour_histogram(&empty).is_none());
        assert!(rolling_completion_rate(&empty).is_none());
        assert!(monthly_active_days(&HabitCollection::new(), date(1)).is_none());
        assert!(calendar_heatmap(&HabitCollection::new(), date(1)).is_none());
    }

    #[test]
    fn weekday_histogram_starts_on_monday() {
        // 2024-05-05 is a Sunday, 2024-05-06 a Monday.
        let counts = weekday_histogram(&history(&[(5, true), (6, true), (13, true), (7, false)]))
            .unwrap();
        assert_eq!(counts, [2, 0, 0, 0, 0, 0, 1]);
        assert_eq!(WEEKDAY_LABELS[0], "Mon");
    }

    #[test]
    fn hour_histogram_uses_entry_local_hour() {
        let mut entries = history(&[(1, true), (2, true), (3, false)]);
        entries.insert(
            date(4),
            CompletionEntry {
                completed: true,
                timestamp: Some(at(4, 21)),
                value: None,
            },
        );
        let counts = hour_histogram(&entries).unwrap();
        assert_eq!(counts[7], 2);
        assert_eq!(counts[21], 1);
        assert_eq!(counts.iter().sum::<u32>(), 3);
        assert_eq!(peak_hours(&counts, 3), vec![(7, 2), (21, 1)]);
    }

    #[test]
    fn hour_histogram_without_timestamps_is_unavailable() {
        let entries: CompletionHistory = [(
            date(1),
            CompletionEntry {
                completed: true,
                timestamp: None,
                value: None,
            },
        )]
        .into_iter()
        .collect();
        assert!(hour_histogram(&entries).is_none());
    }

    #[test]
    fn rolling_rate_window_shrinks_at_start() {
        let entries = history(&[
            (1, true),
            (2, false),
            (3, true),
            (4, false),
            (5, true),
            (6, false),
            (7, true),
            (8, false),
            (9, true),
            (10, false),
        ]);
        let series = rolling_completion_rate(&entries).unwrap();
        assert_eq!(series.len(), 10);
        assert_eq!(series[0].rate, 100.0);
        assert_eq!(series[1].rate, 50.0);
        let last = series.last().unwrap();
        assert_eq!(last.date, date(10));
        // d4..=d10 holds completions on d5, d7, d9.
        assert!((last.rate - 3.0 / 7.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn rolling_rate_needs_two_dates() {
        assert!(rolling_completion_rate(&history(&[(1, true)])).is_none());
    }

    #[test]
    fn monthly_active_days_counts_distinct_days_in_window() {
        let a = complete(&complete(&habit_created(1), at(1, 9)), at(20, 9));
        let b = complete(&habit_created(1), at(20, 10));
        let habits: HabitCollection = vec![a, b].into_iter().collect();
        // Window for 2024-05-30 is 2024-05-01..=2024-05-30.
        assert_eq!(monthly_active_days(&habits, date(30)), Some(2));
        // Window for 2024-05-31 starts on 2024-05-02.
        assert_eq!(monthly_active_days(&habits, date(31)), Some(1));
    }

    #[test]
    fn heatmap_classifies_partial_complete_and_none() {
        let mut habits: Vec<HabitRecord> = (0..4).map(|_| habit_created(1)).collect();
        for habit in habits.iter_mut().take(2) {
            *habit = complete(habit, at(2, 9));
        }
        for habit in habits.iter_mut() {
            *habit = complete(habit, at(3, 9));
        }
        let habits: HabitCollection = habits.into_iter().collect();

        let cells = calendar_heatmap(&habits, date(5)).unwrap();
        let levels: Vec<HeatLevel> = cells.iter().map(|cell| cell.level).collect();
        assert_eq!(cells.first().unwrap().date, date(2));
        assert_eq!(
            levels,
            vec![
                HeatLevel::Partial,
                HeatLevel::Complete,
                HeatLevel::None,
                HeatLevel::None
            ]
        );
        assert_eq!(cells[0].percentage, 50.0);
        assert_eq!(cells[3].total, 4);
    }

    #[test]
    fn heatmap_today_uses_current_habit_count() {
        let early = complete(&habit_created(1), at(2, 9));
        let late = habit_created(4);
        let habits: HabitCollection = vec![early, late].into_iter().collect();
        let cells = calendar_heatmap(&habits, date(4)).unwrap();
        assert_eq!(cells[0].total, 1);
        assert_eq!(cells[0].level, HeatLevel::Complete);
        assert_eq!(cells.last().unwrap().total, 2);
    }

    #[test]
    fn summary_rounds_rate_to_one_decimal() {
        let mut habit = habit_created(1);
        habit.completion_history = history(&[(1, true), (2, false), (3, false)]);
        let summary = habit_summary(&habit).unwrap();
        assert_eq!(summary.total_completions, 1);
        assert_eq!(summary.recorded_days, 3);
        assert_eq!(summary.completion_rate, 33.3);
        assert_eq!(summary.first_recorded, date(1));
        assert!(habit_summary(&habit_created(1)).is_none());
    }
}
