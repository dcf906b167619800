use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{HabitError, HabitResult};
use crate::ports::NotificationHandle;

/// Opaque, immutable habit identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HabitId(String);

impl HabitId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for HabitId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for HabitId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for HabitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HabitKind {
    /// Succeed by doing the thing.
    Regular,
    /// Succeed by abstaining; marking a day records a slip.
    Quit,
    /// Regular streak rules with a per-day target shown to the user.
    Counter {
        target_value: f64,
        #[serde(default)]
        unit: Option<String>,
    },
}

impl HabitKind {
    pub fn is_quit(&self) -> bool {
        matches!(self, Self::Quit)
    }

    pub fn target_value(&self) -> Option<f64> {
        match self {
            Self::Counter { target_value, .. } => Some(*target_value),
            _ => None,
        }
    }
}

/// Which calendar days a habit is due. Weekdays are numbered 0 = Sunday .. 6 = Saturday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "rule", content = "weekdays", rename_all = "snake_case")]
pub enum Recurrence {
    #[default]
    EveryDay,
    SelectedWeekdays(BTreeSet<u8>),
}

impl Recurrence {
    pub fn weekdays(days: impl IntoIterator<Item = u8>) -> HabitResult<Self> {
        let recurrence = Self::SelectedWeekdays(days.into_iter().collect());
        recurrence.validate()?;
        Ok(recurrence)
    }

    fn validate(&self) -> HabitResult<()> {
        if let Self::SelectedWeekdays(days) = self {
            if let Some(bad) = days.iter().find(|day| **day > 6) {
                return Err(HabitError::validation(format!(
                    "weekday {bad} is outside 0..=6"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub enabled: bool,
    pub time: NaiveTime,
}

impl Reminder {
    pub fn at(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(|time| Self {
            enabled: true,
            time,
        })
    }
}

/// Link to a health metric that can complete the habit automatically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthLink {
    pub metric: String,
    #[serde(default)]
    pub target: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionEntry {
    pub completed: bool,
    #[serde(default)]
    pub timestamp: Option<DateTime<FixedOffset>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl CompletionEntry {
    pub fn completed_at(timestamp: DateTime<FixedOffset>) -> Self {
        Self {
            completed: true,
            timestamp: Some(timestamp),
            value: None,
        }
    }

    pub fn with_value(mut self, value: Option<f64>) -> Self {
        self.value = value;
        self
    }
}

/// One entry per local calendar day.
pub type CompletionHistory = BTreeMap<NaiveDate, CompletionEntry>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitRecord {
    pub(crate) id: HabitId,
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) icon: String,
    pub(crate) kind: HabitKind,
    #[serde(default)]
    pub(crate) recurrence: Recurrence,
    #[serde(default)]
    pub(crate) reminder: Option<Reminder>,
    #[serde(default)]
    pub(crate) health: Option<HealthLink>,
    #[serde(default)]
    pub(crate) current_streak: u32,
    #[serde(default)]
    pub(crate) best_streak: u32,
    #[serde(default)]
    pub(crate) completion_history: CompletionHistory,
    #[serde(default)]
    pub(crate) last_slip_date: Option<NaiveDate>,
    #[serde(default)]
    pub(crate) notification_id: Option<NotificationHandle>,
    pub(crate) created_at: DateTime<FixedOffset>,
    pub(crate) updated_at: DateTime<FixedOffset>,
}

impl HabitRecord {
    /// Builds a fresh record with zeroed counters and an empty history.
    pub fn create(draft: HabitDraft, now: DateTime<FixedOffset>) -> HabitResult<Self> {
        Self::create_with_id(HabitId::generate(), draft, now)
    }

    pub fn create_with_id(
        id: HabitId,
        draft: HabitDraft,
        now: DateTime<FixedOffset>,
    ) -> HabitResult<Self> {
        draft.validate()?;
        Ok(Self {
            id,
            name: draft.name.trim().to_string(),
            icon: draft.icon,
            kind: draft.kind,
            recurrence: draft.recurrence,
            reminder: draft.reminder,
            health: draft.health,
            current_streak: 0,
            best_streak: 0,
            completion_history: CompletionHistory::new(),
            last_slip_date: None,
            notification_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Returns an edited copy. `id` and `created_at` are never touched.
    pub fn apply(&self, patch: &HabitPatch, now: DateTime<FixedOffset>) -> HabitResult<Self> {
        patch.validate()?;
        let mut edited = self.clone();
        if let Some(name) = &patch.name {
            edited.name = name.trim().to_string();
        }
        if let Some(icon) = &patch.icon {
            edited.icon = icon.clone();
        }
        if let Some(recurrence) = &patch.recurrence {
            edited.recurrence = recurrence.clone();
        }
        if let Some(reminder) = patch.reminder {
            edited.reminder = reminder;
        }
        if let Some(health) = &patch.health {
            edited.health = health.clone();
        }
        if let Some(kind) = &patch.kind {
            let was_quit = edited.kind.is_quit();
            edited.kind = kind.clone();
            if was_quit != kind.is_quit() {
                edited.current_streak = 0;
            }
            edited.last_slip_date = if kind.is_quit() {
                crate::completion::latest_slip(&edited.completion_history)
            } else {
                None
            };
        }
        edited.updated_at = now;
        Ok(edited)
    }

    pub(crate) fn with_notification(
        &self,
        handle: Option<NotificationHandle>,
        now: DateTime<FixedOffset>,
    ) -> Self {
        let mut updated = self.clone();
        updated.notification_id = handle;
        updated.updated_at = now;
        updated
    }

    pub fn id(&self) -> &HabitId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn icon(&self) -> &str {
        &self.icon
    }

    pub fn kind(&self) -> &HabitKind {
        &self.kind
    }

    pub fn is_quit(&self) -> bool {
        self.kind.is_quit()
    }

    pub fn recurrence(&self) -> &Recurrence {
        &self.recurrence
    }

    pub fn reminder(&self) -> Option<Reminder> {
        self.reminder
    }

    pub fn health(&self) -> Option<&HealthLink> {
        self.health.as_ref()
    }

    /// Stored counter. Only meaningful for non-Quit habits; see
    /// [`crate::completion::displayed_streak`] for what the user sees.
    pub fn current_streak(&self) -> u32 {
        self.current_streak
    }

    pub fn best_streak(&self) -> u32 {
        self.best_streak
    }

    pub fn history(&self) -> &CompletionHistory {
        &self.completion_history
    }

    pub fn last_slip_date(&self) -> Option<NaiveDate> {
        self.last_slip_date
    }

    pub fn notification_id(&self) -> Option<&NotificationHandle> {
        self.notification_id.as_ref()
    }

    pub fn created_at(&self) -> DateTime<FixedOffset> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<FixedOffset> {
        self.updated_at
    }
}

/// Input for creating a habit.
#[derive(Debug, Clone, PartialEq)]
pub struct HabitDraft {
    pub name: String,
    pub icon: String,
    pub kind: HabitKind,
    pub recurrence: Recurrence,
    pub reminder: Option<Reminder>,
    pub health: Option<HealthLink>,
}

impl HabitDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            icon: String::new(),
            kind: HabitKind::Regular,
            recurrence: Recurrence::EveryDay,
            reminder: None,
            health: None,
        }
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    pub fn kind(mut self, kind: HabitKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn recurrence(mut self, recurrence: Recurrence) -> Self {
        self.recurrence = recurrence;
        self
    }

    pub fn reminder(mut self, reminder: Reminder) -> Self {
        self.reminder = Some(reminder);
        self
    }

    pub fn health(mut self, health: HealthLink) -> Self {
        self.health = Some(health);
        self
    }

    pub fn validate(&self) -> HabitResult<()> {
        validate_name(&self.name)?;
        validate_kind(&self.kind)?;
        self.recurrence.validate()
    }
}

/// Subset of mutable fields to replace. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HabitPatch {
    pub name: Option<String>,
    pub icon: Option<String>,
    pub kind: Option<HabitKind>,
    pub recurrence: Option<Recurrence>,
    pub reminder: Option<Option<Reminder>>,
    pub health: Option<Option<HealthLink>>,
}

impl HabitPatch {
    pub fn touches_reminder(&self) -> bool {
        self.reminder.is_some()
    }

    fn validate(&self) -> HabitResult<()> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(kind) = &self.kind {
            validate_kind(kind)?;
        }
        if let Some(recurrence) = &self.recurrence {
            recurrence.validate()?;
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> HabitResult<()> {
    if name.trim().is_empty() {
        return Err(HabitError::validation("name must not be empty"));
    }
    Ok(())
}

fn validate_kind(kind: &HabitKind) -> HabitResult<()> {
    if let HabitKind::Counter { target_value, .. } = kind {
        if !target_value.is_finite() || *target_value <= 0.0 {
            return Err(HabitError::validation("counter target must be positive"));
        }
    }
    Ok(())
}
