use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use tracing::{info, warn};

use habit_core::completion::{displayed_streak, is_completed_on};
use habit_core::schedule::{daily_progress, partition_for_day};
use habit_core::stats::{
    calendar_heatmap, habit_summary, hour_histogram, monthly_active_days, peak_hours,
    rolling_completion_rate, weekday_histogram, HeatLevel, WEEKDAY_LABELS,
};
use habit_core::{local_now, HabitId, HabitKind, HabitRecord, HabitService};
use habit_sync::SyncService;

use crate::adapters::{ConfiguredIdentity, LogReminderScheduler, StaticHealthProvider};
use crate::cli::Command;
use crate::store::{FolderCloudStore, JsonFileStore};

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub cloud_dir: Option<PathBuf>,
    pub user: Option<String>,
    pub health_readings: Vec<(String, f64)>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(dir) = non_empty_var("HABITS_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        config.cloud_dir = non_empty_var("HABITS_CLOUD_DIR").map(PathBuf::from);
        config.user = non_empty_var("HABITS_USER");
        if let Some(list) = non_empty_var("HABITS_HEALTH") {
            config.health_readings = parse_readings(&list);
        }
        Ok(config)
    }

    /// Command-line values win over the environment.
    pub fn with_overrides(mut self, data_dir: Option<PathBuf>, cloud_dir: Option<PathBuf>) -> Self {
        if let Some(dir) = data_dir {
            self.data_dir = dir;
        }
        if cloud_dir.is_some() {
            self.cloud_dir = cloud_dir;
        }
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".habits"),
            cloud_dir: None,
            user: None,
            health_readings: Vec::new(),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Parses `metric=value` pairs separated by commas. Malformed pairs are
/// skipped with a warning.
fn parse_readings(list: &str) -> Vec<(String, f64)> {
    list.split(',')
        .filter(|pair| !pair.trim().is_empty())
        .filter_map(|pair| {
            let parsed = pair.split_once('=').and_then(|(metric, value)| {
                let value = value.trim().parse::<f64>().ok()?;
                Some((metric.trim().to_string(), value))
            });
            if parsed.is_none() {
                warn!(pair, "ignoring malformed health reading");
            }
            parsed
        })
        .collect()
}

/// The wired-up services for one invocation.
pub struct App {
    habits: HabitService,
    sync: SyncService,
}

impl App {
    pub async fn open(config: &AppConfig) -> Result<Self> {
        let local = Arc::new(JsonFileStore::new(&config.data_dir));
        info!(path = %local.path().display(), "opening habit store");
        let habits = HabitService::builder(local)
            .with_reminder_scheduler(Arc::new(LogReminderScheduler::default()))
            .with_health_provider(Arc::new(StaticHealthProvider::new(
                config.health_readings.iter().cloned(),
            )))
            .with_identity_provider(Arc::new(ConfiguredIdentity::new(config.user.clone())))
            .build()
            .await
            .context("failed to load habits")?;
        let sync = SyncService::new(Arc::new(FolderCloudStore::new(config.cloud_dir.clone())));
        Ok(Self { habits, sync })
    }

    pub fn habits(&self) -> &HabitService {
        &self.habits
    }

    pub fn sync(&self) -> &SyncService {
        &self.sync
    }

    /// Runs one command and returns the text to print.
    pub async fn execute(&self, command: Command, now: DateTime<FixedOffset>) -> Result<String> {
        let today = now.date_naive();
        match command {
            Command::List { date } => self.render_day(date.unwrap_or(today), now),
            Command::Add(args) => {
                let habit = self.habits.add_habit(args.into_draft()?, now).await?;
                Ok(format!("Created {} ({})", label(&habit), habit.id()))
            }
            Command::Edit(args) => {
                let (id, patch) = args.into_patch()?;
                let habit = self
                    .habits
                    .update_habit(&id, patch, now)
                    .await
                    .with_context(|| format!("failed to edit habit `{id}`"))?;
                Ok(format!("Updated {}", label(&habit)))
            }
            Command::Delete { id } => {
                let id = HabitId::from(id);
                if self.habits.delete_habit(&id).await? {
                    Ok(format!("Deleted {id}"))
                } else {
                    Ok(format!("No habit with id {id}"))
                }
            }
            Command::Complete { id } => {
                let id = HabitId::from(id);
                let updated = self.habits.complete(&id, now).await?;
                Ok(describe_toggle(&id, updated.as_ref(), now))
            }
            Command::Uncomplete { id } => {
                let id = HabitId::from(id);
                let updated = self.habits.uncomplete(&id, now).await?;
                Ok(describe_toggle(&id, updated.as_ref(), now))
            }
            Command::Stats { id } => {
                let id = HabitId::from(id);
                let habit = self
                    .habits
                    .get(&id)
                    .with_context(|| format!("no habit with id `{id}`"))?;
                render_stats(&habit, now)
            }
            Command::Calendar => self.render_calendar(today),
            Command::Sync { push, pull } => self.run_sync(push, pull, now.with_timezone(&Utc)).await,
            Command::Health => {
                let completed = self.habits.check_health_goals(now).await?;
                if completed.is_empty() {
                    return Ok("No health goals reached".to_string());
                }
                let mut out = String::new();
                for done in completed {
                    writeln!(out, "Completed {} (reading {})", done.name, done.value)?;
                }
                Ok(out.trim_end().to_string())
            }
            Command::Whoami => Ok(match self.habits.current_user().await? {
                Some(user) => user.display_name.unwrap_or(user.id),
                None => "Not signed in".to_string(),
            }),
        }
    }

    async fn run_sync(&self, push: bool, pull: bool, now: DateTime<Utc>) -> Result<String> {
        if push {
            self.sync.force_upload(&self.habits.snapshot(), now).await?;
            return Ok(format!("Uploaded {} habits", self.habits.snapshot().len()));
        }
        if pull {
            let downloaded = self.sync.force_download().await?;
            let count = downloaded.len();
            self.habits.replace_all(downloaded).await?;
            return Ok(format!("Downloaded {count} habits"));
        }
        let outcome = self.sync.sync(&self.habits, now).await;
        match (outcome.success, outcome.report) {
            (true, Some(report)) => Ok(format!(
                "Synced {} habits ({} kept here, {} taken from the cloud, {} new here, {} new in the cloud)",
                report.habits,
                report.stats.kept_local,
                report.stats.kept_remote,
                report.stats.local_only,
                report.stats.remote_only,
            )),
            _ => bail!(
                "sync failed: {}",
                outcome.error.unwrap_or_else(|| "unknown error".to_string())
            ),
        }
    }

    fn render_day(&self, date: NaiveDate, now: DateTime<FixedOffset>) -> Result<String> {
        let habits = self.habits.snapshot();
        if habits.is_empty() {
            return Ok("No habits yet. Add one with `habits add <name>`.".to_string());
        }
        let agenda = partition_for_day(&habits, date);
        let progress = daily_progress(&habits, date);

        let mut out = String::new();
        writeln!(
            out,
            "{date}: {}/{} done ({}%)",
            progress.completed, progress.total, progress.percentage
        )?;
        for habit in &agenda.due {
            writeln!(out, "{}", habit_line(habit, date, now))?;
        }
        if !agenda.other.is_empty() {
            writeln!(out, "Not due:")?;
            for habit in &agenda.other {
                writeln!(out, "{}", habit_line(habit, date, now))?;
            }
        }
        Ok(out.trim_end().to_string())
    }

    fn render_calendar(&self, today: NaiveDate) -> Result<String> {
        let habits = self.habits.snapshot();
        let Some(cells) = calendar_heatmap(&habits, today) else {
            return Ok("No completions recorded yet".to_string());
        };
        let mut out = String::new();
        for cell in cells {
            let mark = match cell.level {
                HeatLevel::None => ' ',
                HeatLevel::Partial => '+',
                HeatLevel::Complete => '#',
            };
            writeln!(
                out,
                "{} [{mark}] {}/{} ({:.0}%)",
                cell.date, cell.completed, cell.total, cell.percentage
            )?;
        }
        if let Some(active) = monthly_active_days(&habits, today) {
            writeln!(out, "Active days in the last 30: {active}")?;
        }
        Ok(out.trim_end().to_string())
    }
}

fn label(habit: &HabitRecord) -> String {
    if habit.icon().is_empty() {
        habit.name().to_string()
    } else {
        format!("{} {}", habit.icon(), habit.name())
    }
}

fn habit_line(habit: &HabitRecord, date: NaiveDate, now: DateTime<FixedOffset>) -> String {
    let marked = is_completed_on(habit, date);
    let streak = displayed_streak(habit, now);
    let (mark, detail) = match habit.kind() {
        HabitKind::Quit => (
            if marked { "!" } else { " " },
            format!("{streak} days clean"),
        ),
        HabitKind::Counter { target_value, unit } => (
            if marked { "x" } else { " " },
            format!(
                "target {target_value}{}, streak {streak}",
                unit.as_deref().map(|unit| format!(" {unit}")).unwrap_or_default()
            ),
        ),
        HabitKind::Regular => (if marked { "x" } else { " " }, format!("streak {streak}")),
    };
    format!("[{mark}] {} ({detail}) {}", label(habit), habit.id())
}

fn describe_toggle(
    id: &HabitId,
    updated: Option<&HabitRecord>,
    now: DateTime<FixedOffset>,
) -> String {
    match updated {
        Some(habit) if habit.is_quit() => format!(
            "{}: {} days clean, best {}",
            label(habit),
            displayed_streak(habit, now),
            habit.best_streak()
        ),
        Some(habit) => format!(
            "{}: streak {}, best {}",
            label(habit),
            displayed_streak(habit, now),
            habit.best_streak()
        ),
        None => format!("No habit with id {id}"),
    }
}

fn render_stats(habit: &HabitRecord, now: DateTime<FixedOffset>) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "{} ({})", label(habit), habit.id())?;
    writeln!(out, "Current streak: {}", displayed_streak(habit, now))?;

    let Some(summary) = habit_summary(habit) else {
        writeln!(out, "No completions recorded yet")?;
        return Ok(out.trim_end().to_string());
    };
    writeln!(out, "Best streak: {}", summary.best_streak)?;
    writeln!(
        out,
        "Completed {} of {} recorded days ({}%) since {}",
        summary.total_completions,
        summary.recorded_days,
        summary.completion_rate,
        summary.first_recorded
    )?;

    if let Some(days) = weekday_histogram(habit.history()) {
        let row: Vec<String> = WEEKDAY_LABELS
            .iter()
            .zip(days)
            .map(|(label, count)| format!("{label} {count}"))
            .collect();
        writeln!(out, "By weekday: {}", row.join(", "))?;
    }
    if let Some(hours) = hour_histogram(habit.history()) {
        let peaks: Vec<String> = peak_hours(&hours, 3)
            .into_iter()
            .map(|(hour, count)| format!("{hour:02}:00 ({count})"))
            .collect();
        writeln!(out, "Peak hours: {}", peaks.join(", "))?;
    }
    if let Some(point) = rolling_completion_rate(habit.history()).and_then(|series| series.last().copied()) {
        writeln!(out, "7-day rate: {:.0}%", point.rate)?;
    }
    Ok(out.trim_end().to_string())
}

/// Entry point used by the binary.
pub async fn run(config: AppConfig, command: Command) -> Result<()> {
    let app = App::open(&config).await?;
    let output = app.execute(command, local_now()).await?;
    println!("{output}");
    Ok(())
}
