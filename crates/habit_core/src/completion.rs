//! Day-level completion toggles and the streak rules that go with them.
//!
//! Regular and Counter habits keep a stored `current_streak` that moves by
//! one per toggle. Quit habits never trust a stored counter: the number of
//! clean days is derived from the latest slip (or the creation day) every
//! time it is read, and only `best_streak` is kept as a high-water mark.

use chrono::{DateTime, FixedOffset, NaiveDate};

use crate::habit::{CompletionEntry, CompletionHistory, HabitRecord};

pub fn is_completed_on(habit: &HabitRecord, date: NaiveDate) -> bool {
    habit
        .history()
        .get(&date)
        .map(|entry| entry.completed)
        .unwrap_or(false)
}

/// Marks the local day of `now` as done.
pub fn complete(habit: &HabitRecord, now: DateTime<FixedOffset>) -> HabitRecord {
    complete_with_value(habit, now, None)
}

/// Like [`complete`], recording an observed value on the entry.
///
/// Completing a day that is already marked only refreshes the entry; the
/// streak counters move once per unmarked -> marked transition.
pub fn complete_with_value(
    habit: &HabitRecord,
    now: DateTime<FixedOffset>,
    value: Option<f64>,
) -> HabitRecord {
    let today = now.date_naive();
    let already_marked = is_completed_on(habit, today);
    let mut updated = habit.clone();

    if !already_marked {
        if habit.is_quit() {
            updated.best_streak = updated.best_streak.max(quit_streak(habit, now));
            updated.current_streak = 0;
        } else {
            updated.current_streak += 1;
            updated.best_streak = updated.best_streak.max(updated.current_streak);
        }
    }
    updated
        .completion_history
        .insert(today, CompletionEntry::completed_at(now).with_value(value));
    if habit.is_quit() {
        updated.last_slip_date = Some(today);
    }
    updated.updated_at = now;
    updated
}

/// Removes the entry for the local day of `now`.
pub fn uncomplete(habit: &HabitRecord, now: DateTime<FixedOffset>) -> HabitRecord {
    let today = now.date_naive();
    if !habit.history().contains_key(&today) {
        return habit.clone();
    }
    let was_marked = is_completed_on(habit, today);
    let mut updated = habit.clone();
    updated.completion_history.remove(&today);

    if habit.is_quit() {
        updated.last_slip_date = latest_slip(&updated.completion_history);
        let clean_days = quit_streak(&updated, now);
        updated.current_streak = 0;
        updated.best_streak = updated.best_streak.max(clean_days);
    } else if was_marked {
        updated.current_streak = updated.current_streak.saturating_sub(1);
    }
    updated.updated_at = now;
    updated
}

/// Most recent day marked as completed, if any.
pub fn latest_slip(history: &CompletionHistory) -> Option<NaiveDate> {
    history
        .iter()
        .rev()
        .find(|(_, entry)| entry.completed)
        .map(|(date, _)| *date)
}

/// Whole days between the reference day and the local day of `now`. The
/// reference day is the latest slip, or the creation day read in `now`'s
/// offset so a timezone change cannot shift it.
pub fn quit_streak(habit: &HabitRecord, now: DateTime<FixedOffset>) -> u32 {
    let reference = latest_slip(habit.history())
        .unwrap_or_else(|| habit.created_at().with_timezone(now.offset()).date_naive());
    u32::try_from((now.date_naive() - reference).num_days()).unwrap_or(0)
}

/// Streak value shown to the user.
pub fn displayed_streak(habit: &HabitRecord, now: DateTime<FixedOffset>) -> u32 {
    if habit.is_quit() {
        quit_streak(habit, now)
    } else {
        habit.current_streak()
    }
}
