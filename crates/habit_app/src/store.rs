//! File-backed adapters for the storage ports.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::debug;

use habit_core::ports::{Availability, LocalStore, PortError, PortResult, RemoteStore};
use habit_core::HabitCollection;

pub const LOCAL_FILE: &str = "habits.json";
pub const BACKUP_FILE: &str = "habits_backup.json";

fn unexpected(path: &Path, err: impl std::fmt::Display) -> PortError {
    PortError::Unexpected(format!("{}: {err}", path.display()))
}

/// Reads a collection, treating a missing file as an empty one.
async fn read_collection(path: &Path) -> PortResult<HabitCollection> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(HabitCollection::new()),
        Err(err) => return Err(unexpected(path, err)),
    };
    serde_json::from_slice(&bytes).map_err(|err| unexpected(path, err))
}

/// Writes through a sibling temp file so a crash never leaves half a blob.
async fn write_atomically(path: &Path, bytes: Vec<u8>) -> PortResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|err| unexpected(parent, err))?;
    }
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, bytes)
        .await
        .map_err(|err| unexpected(&staging, err))?;
    fs::rename(&staging, path)
        .await
        .map_err(|err| unexpected(path, err))
}

/// The whole collection as one JSON document in the data directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(LOCAL_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl LocalStore for JsonFileStore {
    async fn save(&self, habits: &HabitCollection) -> PortResult<()> {
        let bytes = serde_json::to_vec(habits).map_err(|err| unexpected(&self.path, err))?;
        write_atomically(&self.path, bytes).await?;
        debug!(path = %self.path.display(), habits = habits.len(), "habits saved");
        Ok(())
    }

    async fn load(&self) -> PortResult<HabitCollection> {
        read_collection(&self.path).await
    }

    async fn clear(&self) -> PortResult<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(unexpected(&self.path, err)),
        }
    }
}

/// A synced folder (for example one a cloud drive client mirrors) standing
/// in for the cloud document store. The backup is pretty-printed JSON.
#[derive(Debug, Clone)]
pub struct FolderCloudStore {
    dir: Option<PathBuf>,
}

impl FolderCloudStore {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    fn backup_path(&self) -> PortResult<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(BACKUP_FILE))
            .ok_or_else(|| PortError::Unavailable("no cloud folder configured".into()))
    }
}

#[async_trait]
impl RemoteStore for FolderCloudStore {
    async fn is_available(&self) -> Availability {
        let Some(dir) = &self.dir else {
            return Availability::unavailable(
                "No cloud folder configured. Set HABITS_CLOUD_DIR or pass --cloud-dir.",
            );
        };
        match fs::metadata(dir).await {
            Ok(meta) if meta.is_dir() => Availability::available(),
            Ok(_) => Availability::unavailable(format!("{} is not a directory", dir.display())),
            Err(_) => Availability::unavailable(format!(
                "Cloud folder {} is not reachable. Check that the drive is mounted.",
                dir.display()
            )),
        }
    }

    async fn read_snapshot(&self) -> PortResult<HabitCollection> {
        read_collection(&self.backup_path()?).await
    }

    async fn write_snapshot(&self, habits: &HabitCollection) -> PortResult<()> {
        let path = self.backup_path()?;
        let bytes = serde_json::to_vec_pretty(habits).map_err(|err| unexpected(&path, err))?;
        write_atomically(&path, bytes).await?;
        debug!(path = %path.display(), habits = habits.len(), "cloud backup written");
        Ok(())
    }

    async fn last_modified_time(&self) -> PortResult<Option<DateTime<Utc>>> {
        let path = self.backup_path()?;
        let meta = match fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(unexpected(&path, err)),
        };
        let modified = meta.modified().map_err(|err| unexpected(&path, err))?;
        Ok(Some(DateTime::<Utc>::from(modified)))
    }
}
