use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use habit_core::ports::{PortError, RemoteStore};
use habit_core::{HabitCollection, HabitError, HabitService};

use crate::merge::{merge, merge_with_stats, MergeStats};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("{reason}")]
    Unavailable { reason: String },
    #[error("a sync is already running")]
    AlreadyRunning,
    #[error("remote store: {0}")]
    Remote(#[from] PortError),
    #[error(transparent)]
    Local(#[from] HabitError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub habits: usize,
    pub stats: MergeStats,
    pub synced_at: DateTime<Utc>,
}

/// What the UI gets back from a sync. Failures are data, never a panic or
/// an error crossing the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub success: bool,
    pub error: Option<String>,
    pub report: Option<SyncReport>,
}

impl SyncOutcome {
    pub fn succeeded(report: SyncReport) -> Self {
        Self {
            success: true,
            error: None,
            report: Some(report),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            report: None,
        }
    }
}

/// Runs the check -> read -> merge -> write remote -> write local -> stamp
/// sequence against one remote store.
///
/// Steps are not transactional: if the local write fails after the remote
/// write succeeded, the remote already holds the merged snapshot.
pub struct SyncService {
    remote: Arc<dyn RemoteStore>,
    last_sync: RwLock<Option<DateTime<Utc>>>,
    busy: AtomicBool,
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SyncService {
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            remote,
            last_sync: RwLock::new(None),
            busy: AtomicBool::new(false),
        }
    }

    pub fn is_syncing(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        *self.last_sync.read()
    }

    /// Reconciles `habits` with the remote copy and reports the result.
    pub async fn sync(&self, habits: &HabitService, now: DateTime<Utc>) -> SyncOutcome {
        match self.try_sync(habits, now).await {
            Ok(report) => SyncOutcome::succeeded(report),
            Err(err) => {
                warn!(%err, "sync failed");
                SyncOutcome::failed(err.to_string())
            }
        }
    }

    #[instrument(skip(self, habits))]
    pub async fn try_sync(
        &self,
        habits: &HabitService,
        now: DateTime<Utc>,
    ) -> Result<SyncReport, SyncError> {
        let _busy = self.acquire()?;
        self.ensure_available().await?;

        let remote = self.remote.read_snapshot().await?;
        let local = habits.snapshot();
        if remote.is_empty() {
            debug!(habits = local.len(), "remote snapshot empty, uploading local habits");
        }
        let (merged, stats) = merge_with_stats(&local, &remote);

        self.remote.write_snapshot(&merged).await?;
        // Edits that landed while the remote write was pending carry a newer
        // `updated_at` than their merged copy and win this second pass.
        let installed = habits
            .update_all(|latest| merge(latest, &merged))
            .await?;
        let count = installed.len();

        let synced_at = self.stamp(now).await;
        info!(habits = count, ?stats, "sync complete");
        Ok(SyncReport {
            habits: count,
            stats,
            synced_at,
        })
    }

    /// Overwrites the remote copy with `habits`.
    pub async fn force_upload(
        &self,
        habits: &HabitCollection,
        now: DateTime<Utc>,
    ) -> Result<(), SyncError> {
        let _busy = self.acquire()?;
        self.ensure_available().await?;
        self.remote.write_snapshot(habits).await?;
        self.stamp(now).await;
        info!(habits = habits.len(), "forced upload");
        Ok(())
    }

    /// Reads the remote copy without merging it.
    pub async fn force_download(&self) -> Result<HabitCollection, SyncError> {
        let _busy = self.acquire()?;
        self.ensure_available().await?;
        Ok(self.remote.read_snapshot().await?)
    }

    fn acquire(&self) -> Result<BusyGuard<'_>, SyncError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SyncError::AlreadyRunning)?;
        Ok(BusyGuard(&self.busy))
    }

    async fn ensure_available(&self) -> Result<(), SyncError> {
        let availability = self.remote.is_available().await;
        if availability.available {
            return Ok(());
        }
        Err(SyncError::Unavailable {
            reason: availability
                .reason
                .unwrap_or_else(|| "remote store is not available".to_string()),
        })
    }

    /// Records the remote modification time, falling back to `now`.
    async fn stamp(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let synced_at = match self.remote.last_modified_time().await {
            Ok(Some(modified)) => modified,
            Ok(None) => now,
            Err(err) => {
                debug!(%err, "remote modification time unavailable");
                now
            }
        };
        *self.last_sync.write() = Some(synced_at);
        synced_at
    }
}
