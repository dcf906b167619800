use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::collection::HabitCollection;
use crate::completion::is_completed_on;
use crate::habit::{HabitRecord, Recurrence};

/// 0 = Sunday .. 6 = Saturday.
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

impl Recurrence {
    pub fn includes(&self, date: NaiveDate) -> bool {
        match self {
            Recurrence::EveryDay => true,
            Recurrence::SelectedWeekdays(days) => days.contains(&weekday_index(date)),
        }
    }
}

/// Whether `habit` is due on `date`. An empty weekday set is never due.
pub fn is_due_on(habit: &HabitRecord, date: NaiveDate) -> bool {
    habit.recurrence().includes(date)
}

/// Habits split into those due on a day and everything else, both in
/// collection order.
#[derive(Debug, Default)]
pub struct DayAgenda<'a> {
    pub due: Vec<&'a HabitRecord>,
    pub other: Vec<&'a HabitRecord>,
}

pub fn partition_for_day(habits: &HabitCollection, date: NaiveDate) -> DayAgenda<'_> {
    let (due, other): (Vec<_>, Vec<_>) = habits.iter().partition(|habit| is_due_on(habit, date));
    DayAgenda { due, other }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyProgress {
    pub completed: usize,
    pub total: usize,
    pub percentage: u32,
}

/// Progress over the non-Quit habits due on `date`.
pub fn daily_progress(habits: &HabitCollection, date: NaiveDate) -> DailyProgress {
    let counted: Vec<&HabitRecord> = habits
        .iter()
        .filter(|habit| !habit.is_quit() && is_due_on(habit, date))
        .collect();
    let total = counted.len();
    let completed = counted
        .iter()
        .filter(|habit| is_completed_on(habit, date))
        .count();
    let percentage = if total == 0 {
        0
    } else {
        ((completed as f64 / total as f64) * 100.0).round() as u32
    };
    DailyProgress {
        completed,
        total,
        percentage,
    }
}
