//! Contracts for the platform services the engine talks to.
//!
//! Adapters for a concrete device (key-value storage, a cloud document
//! folder, the notification centre, a health data store) implement these
//! traits; the engine never reaches for them any other way.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collection::HabitCollection;
use crate::habit::HabitId;

/// Error reported by a collaborator.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("item not found: {0}")]
    NotFound(String),
    #[error("an unexpected error occurred: {0}")]
    Unexpected(String),
}

pub type PortResult<T> = Result<T, PortError>;

/// Wholesale storage of the habit collection on the device.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn save(&self, habits: &HabitCollection) -> PortResult<()>;
    /// Returns an empty collection when nothing was saved yet.
    async fn load(&self) -> PortResult<HabitCollection>;
    async fn clear(&self) -> PortResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub available: bool,
    pub reason: Option<String>,
}

impl Availability {
    pub fn available() -> Self {
        Self {
            available: true,
            reason: None,
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            available: false,
            reason: Some(reason.into()),
        }
    }
}

/// Cloud copy of the collection.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn is_available(&self) -> Availability;
    /// Returns an empty collection when no snapshot exists yet.
    async fn read_snapshot(&self) -> PortResult<HabitCollection>;
    async fn write_snapshot(&self, habits: &HabitCollection) -> PortResult<()>;
    async fn last_modified_time(&self) -> PortResult<Option<DateTime<Utc>>>;
}

/// Handle returned by the reminder scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationHandle(pub String);

impl fmt::Display for NotificationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderRequest {
    pub habit_id: HabitId,
    pub title: String,
    pub icon: String,
    pub hour: u32,
    pub minute: u32,
}

/// Platform-specific notification adapters implement this trait.
#[async_trait]
pub trait ReminderScheduler: Send + Sync {
    async fn schedule(&self, request: ReminderRequest) -> PortResult<NotificationHandle>;
    async fn cancel(&self, handle: &NotificationHandle) -> PortResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GoalStatus {
    pub achieved: bool,
    pub current_value: f64,
}

#[async_trait]
pub trait HealthProvider: Send + Sync {
    async fn is_available(&self) -> bool;
    async fn check_goal(&self, metric: &str, target: f64) -> PortResult<GoalStatus>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub display_name: Option<String>,
}

/// Sign-in is handled elsewhere; the engine only asks who is signed in.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_user(&self) -> PortResult<Option<User>>;
}
