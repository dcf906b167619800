use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use parking_lot::Mutex;
use tokio::sync::Notify;

use habit_core::ports::{Availability, LocalStore, PortError, PortResult, RemoteStore};
use habit_core::{HabitCollection, HabitDraft, HabitId, HabitPatch, HabitRecord, HabitService};
use habit_sync::{MergeStats, SyncError, SyncService};

#[derive(Default)]
struct MemoryStore {
    saved: Mutex<Option<HabitCollection>>,
    fail_saves: AtomicBool,
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn save(&self, habits: &HabitCollection) -> PortResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("disk full".into()));
        }
        *self.saved.lock() = Some(habits.clone());
        Ok(())
    }

    async fn load(&self) -> PortResult<HabitCollection> {
        Ok(self.saved.lock().clone().unwrap_or_default())
    }

    async fn clear(&self) -> PortResult<()> {
        *self.saved.lock() = None;
        Ok(())
    }
}

#[derive(Default)]
struct FakeCloud {
    signed_out: bool,
    snapshot: Mutex<HabitCollection>,
    modified: Mutex<Option<DateTime<Utc>>>,
    stamp_on_write: Option<DateTime<Utc>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
    hold_reads: Option<Arc<Notify>>,
    hold_writes: Option<Arc<Notify>>,
}

#[async_trait]
impl RemoteStore for FakeCloud {
    async fn is_available(&self) -> Availability {
        if self.signed_out {
            Availability::unavailable("not signed in to the cloud account")
        } else {
            Availability::available()
        }
    }

    async fn read_snapshot(&self) -> PortResult<HabitCollection> {
        if let Some(gate) = &self.hold_reads {
            gate.notified().await;
        }
        Ok(self.snapshot.lock().clone())
    }

    async fn write_snapshot(&self, habits: &HabitCollection) -> PortResult<()> {
        if let Some(gate) = &self.hold_writes {
            gate.notified().await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PortError::Unavailable("quota exceeded".into()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        *self.snapshot.lock() = habits.clone();
        if let Some(stamp) = self.stamp_on_write {
            *self.modified.lock() = Some(stamp);
        }
        Ok(())
    }

    async fn last_modified_time(&self) -> PortResult<Option<DateTime<Utc>>> {
        Ok(*self.modified.lock())
    }
}

fn at(day: u32, hour: u32) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(0)
        .unwrap()
        .with_ymd_and_hms(2024, 3, day, hour, 0, 0)
        .unwrap()
}

fn utc(day: u32, hour: u32) -> DateTime<Utc> {
    at(day, hour).with_timezone(&Utc)
}

fn habit(id: &str, name: &str, created: DateTime<FixedOffset>) -> HabitRecord {
    HabitRecord::create_with_id(id.into(), HabitDraft::new(name), created).unwrap()
}

fn renamed(habit: &HabitRecord, name: &str, when: DateTime<FixedOffset>) -> HabitRecord {
    habit
        .apply(
            &HabitPatch {
                name: Some(name.into()),
                ..HabitPatch::default()
            },
            when,
        )
        .unwrap()
}

async fn service_holding(store: Arc<MemoryStore>, habits: Vec<HabitRecord>) -> HabitService {
    let service = HabitService::builder(store)
        .build()
        .await
        .expect("build habit service");
    service
        .replace_all(habits.into_iter().collect())
        .await
        .expect("seed habits");
    service
}

#[tokio::test]
async fn unavailable_remote_reports_reason() {
    let store = Arc::new(MemoryStore::default());
    let habits = service_holding(store, vec![habit("a", "Read", at(1, 8))]).await;
    let cloud = Arc::new(FakeCloud {
        signed_out: true,
        ..FakeCloud::default()
    });
    let sync = SyncService::new(cloud.clone());

    let outcome = sync.sync(&habits, utc(2, 9)).await;
    assert!(!outcome.success);
    assert_eq!(
        outcome.error.as_deref(),
        Some("not signed in to the cloud account")
    );
    assert!(outcome.report.is_none());
    assert_eq!(cloud.writes.load(Ordering::SeqCst), 0);
    assert_eq!(habits.snapshot().len(), 1);
    assert!(sync.last_sync_time().is_none());
}

#[tokio::test]
async fn first_sync_uploads_local_habits() {
    let store = Arc::new(MemoryStore::default());
    let local = vec![habit("a", "Read", at(1, 8)), habit("b", "Walk", at(1, 9))];
    let habits = service_holding(store, local).await;
    let cloud = Arc::new(FakeCloud::default());
    let sync = SyncService::new(cloud.clone());

    let report = sync.try_sync(&habits, utc(2, 9)).await.unwrap();
    assert_eq!(report.habits, 2);
    assert_eq!(
        report.stats,
        MergeStats {
            local_only: 2,
            ..MergeStats::default()
        }
    );
    assert_eq!(*cloud.snapshot.lock(), *habits.snapshot());
    // No modification time from the remote, so the caller's clock is used.
    assert_eq!(report.synced_at, utc(2, 9));
    assert_eq!(sync.last_sync_time(), Some(utc(2, 9)));
}

#[tokio::test]
async fn newer_remote_versions_replace_local_ones() {
    let base = habit("a", "Read", at(1, 8));
    let store = Arc::new(MemoryStore::default());
    let habits = service_holding(store.clone(), vec![renamed(&base, "Read on phone", at(2, 8))]).await;

    let cloud = Arc::new(FakeCloud {
        stamp_on_write: Some(utc(6, 12)),
        ..FakeCloud::default()
    });
    *cloud.snapshot.lock() = vec![
        renamed(&base, "Read on tablet", at(5, 8)),
        habit("c", "Stretch", at(3, 8)),
    ]
    .into_iter()
    .collect();
    let sync = SyncService::new(cloud.clone());

    let outcome = sync.sync(&habits, utc(7, 9)).await;
    assert!(outcome.success, "{:?}", outcome.error);
    let report = outcome.report.unwrap();
    assert_eq!(report.stats.kept_remote, 1);
    assert_eq!(report.stats.remote_only, 1);
    assert_eq!(report.synced_at, utc(6, 12));

    let merged = habits.snapshot();
    assert_eq!(merged.ids(), vec![HabitId::from("a"), HabitId::from("c")]);
    assert_eq!(merged.get(&"a".into()).unwrap().name(), "Read on tablet");
    assert_eq!(store.saved.lock().as_ref(), Some(&*merged));
    assert_eq!(*cloud.snapshot.lock(), *merged);
}

#[tokio::test]
async fn remote_write_failure_leaves_local_untouched() {
    let store = Arc::new(MemoryStore::default());
    let habits = service_holding(store, vec![habit("a", "Read", at(1, 8))]).await;
    let cloud = Arc::new(FakeCloud::default());
    *cloud.snapshot.lock() = vec![habit("b", "Walk", at(1, 8))].into_iter().collect();
    cloud.fail_writes.store(true, Ordering::SeqCst);
    let sync = SyncService::new(cloud.clone());

    let err = sync.try_sync(&habits, utc(2, 9)).await.unwrap_err();
    assert!(matches!(err, SyncError::Remote(PortError::Unavailable(_))));
    assert_eq!(habits.snapshot().ids(), vec![HabitId::from("a")]);
    assert!(sync.last_sync_time().is_none());
    assert!(!sync.is_syncing());
}

#[tokio::test]
async fn local_save_failure_is_reported_after_remote_write() {
    let store = Arc::new(MemoryStore::default());
    let habits = service_holding(store.clone(), vec![habit("a", "Read", at(1, 8))]).await;
    let cloud = Arc::new(FakeCloud::default());
    *cloud.snapshot.lock() = vec![habit("b", "Walk", at(1, 8))].into_iter().collect();
    let sync = SyncService::new(cloud.clone());

    store.fail_saves.store(true, Ordering::SeqCst);
    let outcome = sync.sync(&habits, utc(2, 9)).await;
    assert!(!outcome.success);
    assert_eq!(cloud.snapshot.lock().len(), 2);
    assert_eq!(habits.snapshot().len(), 1);
    assert!(sync.last_sync_time().is_none());
}

#[tokio::test]
async fn second_sync_is_rejected_while_one_runs() {
    let store = Arc::new(MemoryStore::default());
    let habits = service_holding(store, vec![habit("a", "Read", at(1, 8))]).await;
    let gate = Arc::new(Notify::new());
    let cloud = Arc::new(FakeCloud {
        hold_reads: Some(gate.clone()),
        ..FakeCloud::default()
    });
    let sync = SyncService::new(cloud);

    let first = sync.try_sync(&habits, utc(2, 9));
    let second = async {
        assert!(sync.is_syncing());
        let result = sync.try_sync(&habits, utc(2, 9)).await;
        gate.notify_one();
        result
    };
    let (first, second) = tokio::join!(first, second);

    assert!(first.is_ok());
    assert!(matches!(second, Err(SyncError::AlreadyRunning)));
    assert!(!sync.is_syncing());
}

#[tokio::test]
async fn completion_during_remote_write_survives_the_sync() {
    let store = Arc::new(MemoryStore::default());
    let habits = service_holding(store.clone(), vec![habit("a", "Read", at(1, 8))]).await;
    let gate = Arc::new(Notify::new());
    let cloud = Arc::new(FakeCloud {
        hold_writes: Some(gate.clone()),
        ..FakeCloud::default()
    });
    *cloud.snapshot.lock() = vec![habit("b", "Walk", at(1, 9))].into_iter().collect();
    let sync = SyncService::new(cloud.clone());
    let read = HabitId::from("a");

    let syncing = sync.try_sync(&habits, utc(2, 9));
    let editing = async {
        assert!(sync.is_syncing());
        let done = habits.complete(&read, at(2, 8)).await.unwrap().unwrap();
        assert_eq!(done.current_streak(), 1);
        gate.notify_one();
    };
    let (report, ()) = tokio::join!(syncing, editing);

    let report = report.unwrap();
    assert_eq!(report.habits, 2);
    let merged = habits.snapshot();
    assert_eq!(merged.ids(), vec![HabitId::from("b"), read.clone()]);
    let kept = merged.get(&read).unwrap();
    assert_eq!(kept.current_streak(), 1);
    assert_eq!(kept.history().len(), 1);
    assert_eq!(store.saved.lock().as_ref(), Some(&*merged));
}

#[tokio::test]
async fn force_transfers_skip_the_merge() {
    let store = Arc::new(MemoryStore::default());
    let habits = service_holding(store, vec![habit("a", "Read", at(1, 8))]).await;
    let cloud = Arc::new(FakeCloud::default());
    *cloud.snapshot.lock() = vec![habit("b", "Walk", at(1, 8))].into_iter().collect();
    let sync = SyncService::new(cloud.clone());

    let downloaded = sync.force_download().await.unwrap();
    assert_eq!(downloaded.ids(), vec![HabitId::from("b")]);
    assert!(sync.last_sync_time().is_none());

    sync.force_upload(&habits.snapshot(), utc(3, 9)).await.unwrap();
    assert_eq!(cloud.snapshot.lock().ids(), vec![HabitId::from("a")]);
    assert_eq!(sync.last_sync_time(), Some(utc(3, 9)));
}
