use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Local};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::collection::HabitCollection;
use crate::completion::{self, is_completed_on};
use crate::error::{HabitError, HabitResult};
use crate::habit::{HabitDraft, HabitId, HabitPatch, HabitRecord};
use crate::ports::{HealthProvider, IdentityProvider, LocalStore, ReminderScheduler, User};
use crate::reminders;

/// Current wall-clock instant with the device's UTC offset.
pub fn local_now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

/// A habit completed by [`HabitService::check_health_goals`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCompletion {
    pub id: HabitId,
    pub name: String,
    pub value: f64,
}

/// Owns the in-memory habit collection for one application session.
///
/// Readers get an `Arc` snapshot and never observe a half-applied change.
/// Writers are serialised: each one computes a new collection from the
/// latest snapshot, saves it to the local store and only then swaps it in.
pub struct HabitService {
    local: Arc<dyn LocalStore>,
    reminders: Option<Arc<dyn ReminderScheduler>>,
    health: Option<Arc<dyn HealthProvider>>,
    identity: Option<Arc<dyn IdentityProvider>>,
    current: RwLock<Arc<HabitCollection>>,
    write_gate: Mutex<()>,
}

pub struct HabitServiceBuilder {
    local: Arc<dyn LocalStore>,
    reminders: Option<Arc<dyn ReminderScheduler>>,
    health: Option<Arc<dyn HealthProvider>>,
    identity: Option<Arc<dyn IdentityProvider>>,
}

impl HabitServiceBuilder {
    pub fn new(local: Arc<dyn LocalStore>) -> Self {
        Self {
            local,
            reminders: None,
            health: None,
            identity: None,
        }
    }

    pub fn with_reminder_scheduler(mut self, scheduler: Arc<dyn ReminderScheduler>) -> Self {
        self.reminders = Some(scheduler);
        self
    }

    pub fn with_health_provider(mut self, provider: Arc<dyn HealthProvider>) -> Self {
        self.health = Some(provider);
        self
    }

    pub fn with_identity_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(provider);
        self
    }

    /// Builds the service and loads the saved collection.
    pub async fn build(self) -> HabitResult<HabitService> {
        let service = HabitService {
            local: self.local,
            reminders: self.reminders,
            health: self.health,
            identity: self.identity,
            current: RwLock::new(Arc::new(HabitCollection::new())),
            write_gate: Mutex::new(()),
        };
        service.reload().await?;
        Ok(service)
    }
}

impl HabitService {
    pub fn builder(local: Arc<dyn LocalStore>) -> HabitServiceBuilder {
        HabitServiceBuilder::new(local)
    }

    pub fn snapshot(&self) -> Arc<HabitCollection> {
        self.current.read().clone()
    }

    pub fn get(&self, id: &HabitId) -> Option<HabitRecord> {
        self.current.read().get(id).cloned()
    }

    /// Replaces the in-memory collection with what the local store holds.
    pub async fn reload(&self) -> HabitResult<()> {
        let _gate = self.write_gate.lock().await;
        let loaded = self.local.load().await?;
        info!(habits = loaded.len(), "habits loaded");
        *self.current.write() = Arc::new(loaded);
        Ok(())
    }

    #[instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn add_habit(
        &self,
        draft: HabitDraft,
        now: DateTime<FixedOffset>,
    ) -> HabitResult<HabitRecord> {
        let mut habit = HabitRecord::create(draft, now)?;
        let _gate = self.write_gate.lock().await;
        if let Some(scheduler) = &self.reminders {
            if let Some(handle) = reminders::schedule_for(scheduler.as_ref(), &habit).await {
                habit = habit.with_notification(Some(handle), now);
            }
        }
        let next = self.snapshot().with_appended(habit.clone())?;
        if let Err(err) = self.persist(next).await {
            self.release_reminder(&habit).await;
            return Err(err);
        }
        info!(habit_id = %habit.id(), "habit created");
        Ok(habit)
    }

    /// Applies `patch` to a habit. Changing the reminder reschedules it.
    #[instrument(skip(self, patch))]
    pub async fn update_habit(
        &self,
        id: &HabitId,
        patch: HabitPatch,
        now: DateTime<FixedOffset>,
    ) -> HabitResult<HabitRecord> {
        let _gate = self.write_gate.lock().await;
        let current = self.snapshot();
        let existing = current
            .get(id)
            .ok_or_else(|| HabitError::NotFound(id.clone()))?;
        let mut edited = existing.apply(&patch, now)?;

        // The old reminder stays live until the edit is saved.
        let mut superseded = None;
        if patch.touches_reminder() {
            if let Some(scheduler) = &self.reminders {
                let handle = reminders::schedule_for(scheduler.as_ref(), &edited).await;
                edited = edited.with_notification(handle, now);
                superseded = existing.notification_id().cloned();
            } else {
                edited = edited.with_notification(None, now);
            }
        }

        let next = current.with_replaced(edited.clone())?;
        if let Err(err) = self.persist(next).await {
            if patch.touches_reminder() {
                self.release_reminder(&edited).await;
            }
            return Err(err);
        }
        if let (Some(scheduler), Some(handle)) = (&self.reminders, superseded) {
            reminders::cancel_quietly(scheduler.as_ref(), &handle).await;
        }
        debug!(habit_id = %id, "habit updated");
        Ok(edited)
    }

    /// Removes a habit, then cancels its reminder. Returns `false` when
    /// the id is already gone.
    #[instrument(skip(self))]
    pub async fn delete_habit(&self, id: &HabitId) -> HabitResult<bool> {
        let _gate = self.write_gate.lock().await;
        let current = self.snapshot();
        let Some(existing) = current.get(id) else {
            debug!(habit_id = %id, "delete ignored, habit not found");
            return Ok(false);
        };
        let next = current.without(id)?;
        self.persist(next).await?;
        self.release_reminder(existing).await;
        info!(habit_id = %id, "habit deleted");
        Ok(true)
    }

    /// Marks today as done. A stale id is a silent no-op (`Ok(None)`).
    #[instrument(skip(self))]
    pub async fn complete(
        &self,
        id: &HabitId,
        now: DateTime<FixedOffset>,
    ) -> HabitResult<Option<HabitRecord>> {
        self.toggle(id, |habit| completion::complete(habit, now)).await
    }

    /// Clears today's mark. A stale id is a silent no-op (`Ok(None)`).
    #[instrument(skip(self))]
    pub async fn uncomplete(
        &self,
        id: &HabitId,
        now: DateTime<FixedOffset>,
    ) -> HabitResult<Option<HabitRecord>> {
        self.toggle(id, |habit| completion::uncomplete(habit, now)).await
    }

    /// Installs an externally computed collection (e.g. a sync result).
    pub async fn replace_all(&self, habits: HabitCollection) -> HabitResult<()> {
        let _gate = self.write_gate.lock().await;
        self.persist(habits).await
    }

    /// Rebuilds the collection from the latest snapshot while holding the
    /// write gate, then saves and installs the result.
    pub async fn update_all<F>(&self, rebuild: F) -> HabitResult<Arc<HabitCollection>>
    where
        F: FnOnce(&HabitCollection) -> HabitCollection,
    {
        let _gate = self.write_gate.lock().await;
        let next = rebuild(&self.snapshot());
        self.persist(next).await?;
        Ok(self.snapshot())
    }

    /// Clears the local store and the in-memory collection.
    pub async fn clear_all(&self) -> HabitResult<()> {
        let _gate = self.write_gate.lock().await;
        self.local.clear().await?;
        *self.current.write() = Arc::new(HabitCollection::new());
        info!("all habits cleared");
        Ok(())
    }

    /// Asks the health provider about every linked habit that is not done
    /// today and completes the ones whose goal is met.
    #[instrument(skip(self))]
    pub async fn check_health_goals(
        &self,
        now: DateTime<FixedOffset>,
    ) -> HabitResult<Vec<HealthCompletion>> {
        let Some(provider) = &self.health else {
            return Ok(Vec::new());
        };
        if !provider.is_available().await {
            debug!("health provider unavailable, skipping goal check");
            return Ok(Vec::new());
        }

        let today = now.date_naive();
        let snapshot = self.snapshot();
        let mut achieved = Vec::new();
        for habit in snapshot.iter() {
            let Some(link) = habit.health() else {
                continue;
            };
            if is_completed_on(habit, today) {
                continue;
            }
            let target = link
                .target
                .or_else(|| habit.kind().target_value())
                .unwrap_or(1.0);
            match provider.check_goal(&link.metric, target).await {
                Ok(status) if status.achieved => achieved.push(HealthCompletion {
                    id: habit.id().clone(),
                    name: habit.name().to_string(),
                    value: status.current_value,
                }),
                Ok(_) => {}
                Err(err) => {
                    warn!(habit_id = %habit.id(), metric = %link.metric, %err, "health goal check failed");
                }
            }
        }
        if achieved.is_empty() {
            return Ok(achieved);
        }

        let _gate = self.write_gate.lock().await;
        let mut next = (*self.snapshot()).clone();
        let mut applied = Vec::with_capacity(achieved.len());
        for done in achieved {
            match next.with_updated(&done.id, |habit| {
                Ok(completion::complete_with_value(habit, now, Some(done.value)))
            }) {
                Ok(updated) => {
                    next = updated;
                    applied.push(done);
                }
                Err(err) if err.is_not_found() => continue,
                Err(err) => return Err(err),
            }
        }
        self.persist(next).await?;
        info!(completed = applied.len(), "habits completed from health goals");
        Ok(applied)
    }

    pub async fn current_user(&self) -> HabitResult<Option<User>> {
        match &self.identity {
            Some(identity) => Ok(identity.current_user().await?),
            None => Ok(None),
        }
    }

    async fn toggle<F>(&self, id: &HabitId, edit: F) -> HabitResult<Option<HabitRecord>>
    where
        F: FnOnce(&HabitRecord) -> HabitRecord,
    {
        let _gate = self.write_gate.lock().await;
        let next = match self.snapshot().with_updated(id, |habit| Ok(edit(habit))) {
            Ok(next) => next,
            Err(err) if err.is_not_found() => {
                debug!(habit_id = %id, "toggle ignored, habit not found");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        let updated = next.get(id).cloned();
        self.persist(next).await?;
        Ok(updated)
    }

    /// Saves `next` and swaps it in. Callers hold the write gate.
    async fn persist(&self, next: HabitCollection) -> HabitResult<()> {
        self.local.save(&next).await?;
        *self.current.write() = Arc::new(next);
        Ok(())
    }

    async fn release_reminder(&self, habit: &HabitRecord) {
        if let (Some(scheduler), Some(handle)) = (&self.reminders, habit.notification_id()) {
            reminders::cancel_quietly(scheduler.as_ref(), handle).await;
        }
    }
}
