//! Command-line surface of the `habits` binary.

use std::path::PathBuf;

use chrono::{NaiveDate, NaiveTime};
use clap::{Args, Parser, Subcommand};

use habit_core::{
    HabitDraft, HabitId, HabitKind, HabitPatch, HabitResult, HealthLink, Recurrence, Reminder,
};

#[derive(Debug, Parser)]
#[command(name = "habits")]
#[command(about = "Track daily habits, streaks and statistics")]
pub struct Cli {
    /// Directory holding the local habit store (overrides HABITS_DATA_DIR)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Synced folder used as the cloud copy (overrides HABITS_CLOUD_DIR)
    #[arg(long, global = true)]
    pub cloud_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the habits due on a day and the day's progress
    List {
        /// Day to show, YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Create a habit
    Add(AddArgs),

    /// Change a habit's details
    Edit(EditArgs),

    /// Remove a habit and its reminder
    Delete { id: String },

    /// Mark today as done (for quit habits: record a slip)
    Complete { id: String },

    /// Clear today's mark
    Uncomplete { id: String },

    /// Statistics for one habit
    Stats { id: String },

    /// Day-by-day completion heatmap across all habits
    Calendar,

    /// Reconcile with the cloud folder
    Sync {
        /// Overwrite the cloud copy with the local habits
        #[arg(long, conflicts_with = "pull")]
        push: bool,
        /// Replace the local habits with the cloud copy
        #[arg(long)]
        pull: bool,
    },

    /// Complete habits whose linked health goal is met
    Health,

    /// Show the signed-in user
    Whoami,
}

#[derive(Debug, Args)]
pub struct AddArgs {
    pub name: String,

    #[arg(long, default_value = "")]
    pub icon: String,

    /// Track abstaining; completing a day records a slip
    #[arg(long, conflicts_with = "target")]
    pub quit: bool,

    /// Daily target, making this a counter habit
    #[arg(long)]
    pub target: Option<f64>,

    #[arg(long, requires = "target")]
    pub unit: Option<String>,

    /// Days the habit is due, 0 = Sunday .. 6 = Saturday (default: every day)
    #[arg(long, value_delimiter = ',')]
    pub days: Vec<u8>,

    /// Daily reminder time, HH:MM
    #[arg(long, value_parser = parse_time)]
    pub remind: Option<NaiveTime>,

    /// Health metric that completes the habit automatically
    #[arg(long)]
    pub health_metric: Option<String>,

    #[arg(long, requires = "health_metric")]
    pub health_target: Option<f64>,
}

impl AddArgs {
    pub fn into_draft(self) -> HabitResult<HabitDraft> {
        let kind = match (self.quit, self.target) {
            (true, _) => HabitKind::Quit,
            (false, Some(target_value)) => HabitKind::Counter {
                target_value,
                unit: self.unit,
            },
            (false, None) => HabitKind::Regular,
        };
        let mut draft = HabitDraft::new(self.name)
            .icon(self.icon)
            .kind(kind)
            .recurrence(recurrence_from(self.days)?);
        if let Some(time) = self.remind {
            draft = draft.reminder(Reminder {
                enabled: true,
                time,
            });
        }
        if let Some(metric) = self.health_metric {
            draft = draft.health(HealthLink {
                metric,
                target: self.health_target,
            });
        }
        Ok(draft)
    }
}

#[derive(Debug, Args)]
pub struct EditArgs {
    pub id: String,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub icon: Option<String>,

    /// New due days, 0 = Sunday .. 6 = Saturday
    #[arg(long, value_delimiter = ',', conflicts_with = "every_day")]
    pub days: Option<Vec<u8>>,

    #[arg(long)]
    pub every_day: bool,

    /// New reminder time, HH:MM
    #[arg(long, value_parser = parse_time, conflicts_with = "no_remind")]
    pub remind: Option<NaiveTime>,

    /// Turn the reminder off
    #[arg(long)]
    pub no_remind: bool,
}

impl EditArgs {
    pub fn into_patch(self) -> HabitResult<(HabitId, HabitPatch)> {
        let recurrence = match (self.every_day, self.days) {
            (true, _) => Some(Recurrence::EveryDay),
            (false, Some(days)) => Some(recurrence_from(days)?),
            (false, None) => None,
        };
        let reminder = if self.no_remind {
            Some(None)
        } else {
            self.remind.map(|time| {
                Some(Reminder {
                    enabled: true,
                    time,
                })
            })
        };
        let patch = HabitPatch {
            name: self.name,
            icon: self.icon,
            recurrence,
            reminder,
            ..HabitPatch::default()
        };
        Ok((HabitId::from(self.id), patch))
    }
}

fn recurrence_from(days: Vec<u8>) -> HabitResult<Recurrence> {
    if days.is_empty() {
        Ok(Recurrence::EveryDay)
    } else {
        Recurrence::weekdays(days)
    }
}

fn parse_time(value: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|err| format!("expected HH:MM ({err})"))
}
