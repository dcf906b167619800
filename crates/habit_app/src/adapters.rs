//! Headless stand-ins for the device services a phone would provide.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::info;

use habit_core::ports::{
    GoalStatus, HealthProvider, IdentityProvider, NotificationHandle, PortError, PortResult,
    ReminderRequest, ReminderScheduler, User,
};

/// Logs reminders instead of posting notifications. Handles are unique per
/// process run.
#[derive(Debug, Default)]
pub struct LogReminderScheduler {
    issued: AtomicU64,
}

#[async_trait]
impl ReminderScheduler for LogReminderScheduler {
    async fn schedule(&self, request: ReminderRequest) -> PortResult<NotificationHandle> {
        let serial = self.issued.fetch_add(1, Ordering::Relaxed) + 1;
        let handle = NotificationHandle(format!("reminder-{}-{serial}", request.habit_id));
        info!(
            habit_id = %request.habit_id,
            title = %request.title,
            "daily reminder at {:02}:{:02}",
            request.hour,
            request.minute
        );
        Ok(handle)
    }

    async fn cancel(&self, handle: &NotificationHandle) -> PortResult<()> {
        info!(%handle, "reminder cancelled");
        Ok(())
    }
}

/// Serves fixed metric readings, for example `steps=9000` from the
/// configuration. With no readings the provider reports itself unavailable.
#[derive(Debug, Clone, Default)]
pub struct StaticHealthProvider {
    readings: BTreeMap<String, f64>,
}

impl StaticHealthProvider {
    pub fn new(readings: impl IntoIterator<Item = (String, f64)>) -> Self {
        Self {
            readings: readings.into_iter().collect(),
        }
    }
}

#[async_trait]
impl HealthProvider for StaticHealthProvider {
    async fn is_available(&self) -> bool {
        !self.readings.is_empty()
    }

    async fn check_goal(&self, metric: &str, target: f64) -> PortResult<GoalStatus> {
        let current_value = *self
            .readings
            .get(metric)
            .ok_or_else(|| PortError::NotFound(format!("no reading for `{metric}`")))?;
        Ok(GoalStatus {
            achieved: current_value >= target,
            current_value,
        })
    }
}

/// Reports the configured user name as the signed-in user.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredIdentity {
    user: Option<String>,
}

impl ConfiguredIdentity {
    pub fn new(user: Option<String>) -> Self {
        Self { user }
    }
}

#[async_trait]
impl IdentityProvider for ConfiguredIdentity {
    async fn current_user(&self) -> PortResult<Option<User>> {
        Ok(self.user.as_ref().map(|name| User {
            id: name.to_lowercase(),
            display_name: Some(name.clone()),
        }))
    }
}
