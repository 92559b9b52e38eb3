//! Live snapshot ownership, staging and atomic promotion.
//!
//! ## Commit protocol
//!
//! 1. `begin_staging` takes the writer lock (`schedule.db.lock`), copies the
//!    live file (or creates an empty one) at the staging path and opens one
//!    transaction on it.
//! 2. The builder writes through the [`WorkingCopy`].
//! 3. `commit` ends the transaction, closes the connection and fsyncs the
//!    staging file.
//! 4. The staging file is renamed over the live path (atomic on POSIX).
//! 5. The directory is fsynced so the rename survives a crash.
//!
//! A working copy dropped anywhere before step 4 deletes its file. The lock
//! is an OS file lock, so it also excludes writers in other processes and is
//! released if the holder dies.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use rusqlite::{params, Connection};
use timetable_core::{paths, DayClass, RouteNumber, TransportKind};

use crate::error::{io_err, CommitError, StoreError};
use crate::queries;
use crate::rows::{CategoryId, RouteDump, RouteId, SnapshotDump, StationId, StationRow};
use crate::schema;
use crate::snapshot::Snapshot;

/// Owner of `schedule.db` and its staging sibling.
#[derive(Debug, Clone)]
pub struct ScheduleStore {
    data_dir: PathBuf,
    live: PathBuf,
    staging: PathBuf,
    lock: PathBuf,
}

impl ScheduleStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            live: paths::snapshot_path(&data_dir),
            staging: paths::staging_path(&data_dir),
            lock: paths::lock_path(&data_dir),
            data_dir,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn live_path(&self) -> &Path {
        &self.live
    }

    pub fn staging_path(&self) -> &Path {
        &self.staging
    }

    pub fn is_present(&self) -> bool {
        self.live.is_file()
    }

    /// Handle on the live snapshot, or [`StoreError::Absent`].
    pub fn open(&self) -> Result<Snapshot, StoreError> {
        Snapshot::open(&self.live)
    }

    /// Take the writer lock without staging anything.
    ///
    /// Fails with [`StoreError::Busy`] instead of waiting when another
    /// writer holds it.
    pub fn lock_writer(&self) -> Result<WriterLock, StoreError> {
        std::fs::create_dir_all(&self.data_dir).map_err(|e| io_err(&self.data_dir, e))?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&self.lock)
            .map_err(|e| io_err(&self.lock, e))?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(WriterLock {
                file,
                path: self.lock.clone(),
            }),
            Err(err) if err.kind() == fs2::lock_contended_error().kind() => {
                Err(StoreError::Busy {
                    path: self.lock.clone(),
                })
            }
            Err(err) => Err(io_err(&self.lock, err)),
        }
    }

    /// Private writable copy of the live snapshot (empty with schema when
    /// none exists). Nothing reads the staging path.
    ///
    /// The copy holds the writer lock until it is committed or dropped, so a
    /// second writer gets [`StoreError::Busy`].
    pub fn begin_staging(&self) -> Result<WorkingCopy, StoreError> {
        let lock = self.lock_writer()?;
        self.remove_stale_staging()?;

        let seeded = if self.live.is_file() {
            std::fs::copy(&self.live, &self.staging).map_err(|e| io_err(&self.staging, e))?;
            true
        } else {
            false
        };
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&self.staging)
            .map_err(|e| io_err(&self.staging, e))?;

        // From here on the file exists; dropping the working copy removes it.
        let mut copy = WorkingCopy {
            path: self.staging.clone(),
            file,
            conn: None,
            lock: Some(lock),
            promoted: false,
        };
        let conn = Connection::open(&self.staging)?;
        schema::enable_foreign_keys(&conn)?;
        conn.pragma_update(None, "synchronous", "OFF")?;
        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "MEMORY", |row| row.get(0))?;
        schema::ensure(&conn)?;
        conn.execute_batch("BEGIN IMMEDIATE")?;
        copy.conn = Some(conn);

        tracing::debug!(
            "staging {} ({})",
            self.staging.display(),
            if seeded { "seeded from live snapshot" } else { "empty" }
        );
        Ok(copy)
    }

    /// Promote `copy` to be the live snapshot in one rename.
    ///
    /// On error the previous snapshot is untouched and the copy is deleted.
    /// On success the writer lock is handed back, so the caller can record
    /// what it published before another writer starts.
    pub fn commit(&self, mut copy: WorkingCopy) -> Result<WriterLock, CommitError> {
        let staging = copy.path.clone();
        if let Some(conn) = copy.conn.take() {
            conn.execute_batch("COMMIT")
                .map_err(|source| CommitError::Finalize {
                    path: staging.clone(),
                    source,
                })?;
            conn.close().map_err(|(_, source)| CommitError::Finalize {
                path: staging.clone(),
                source,
            })?;
        }

        copy.file.sync_all().map_err(|source| CommitError::Io {
            path: staging.clone(),
            source,
        })?;

        std::fs::rename(&staging, &self.live).map_err(|source| CommitError::Io {
            path: self.live.clone(),
            source,
        })?;
        copy.promoted = true;

        if let Err(err) = sync_dir(&self.data_dir) {
            tracing::warn!("could not fsync {}: {err}", self.data_dir.display());
        }
        tracing::info!("snapshot committed: {}", self.live.display());
        match copy.lock.take() {
            Some(lock) => Ok(lock),
            None => unreachable!("working copy lock is only taken by commit"),
        }
    }

    /// Throw away a working copy without touching the live snapshot.
    pub fn discard(&self, copy: WorkingCopy) {
        tracing::info!("discarding working copy {}", copy.path.display());
        drop(copy);
    }

    /// With the writer lock held, a staging file can only be left over from a
    /// process that died mid-cycle; it is never promoted.
    fn remove_stale_staging(&self) -> Result<(), StoreError> {
        for path in [self.staging.clone(), journal_path(&self.staging)] {
            match std::fs::remove_file(&path) {
                Ok(()) => tracing::warn!("removed stale staging file {}", path.display()),
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(io_err(&path, err)),
            }
        }
        Ok(())
    }
}

fn journal_path(db: &Path) -> PathBuf {
    let mut name = db.as_os_str().to_owned();
    name.push("-journal");
    PathBuf::from(name)
}

/// Exclusive hold on `schedule.db.lock`, released on drop.
#[derive(Debug)]
pub struct WriterLock {
    file: File,
    path: PathBuf,
}

impl WriterLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        if let Err(err) = self.file.unlock() {
            tracing::warn!("could not unlock {}: {err}", self.path.display());
        }
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

// ---------------------------------------------------------------------------
// WorkingCopy
// ---------------------------------------------------------------------------

/// Isolated, writable replica of the snapshot.
///
/// Obtained from [`ScheduleStore::begin_staging`]; consumed by
/// [`ScheduleStore::commit`] or [`ScheduleStore::discard`]. Dropping it
/// uncommitted deletes the staging file.
pub struct WorkingCopy {
    path: PathBuf,
    file: File,
    conn: Option<Connection>,
    lock: Option<WriterLock>,
    promoted: bool,
}

impl std::fmt::Debug for WorkingCopy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkingCopy")
            .field("path", &self.path)
            .field("promoted", &self.promoted)
            .finish()
    }
}

impl WorkingCopy {
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> &Connection {
        match self.conn.as_ref() {
            Some(conn) => conn,
            None => unreachable!("working copy connection is only taken by commit"),
        }
    }

    pub fn category_id(&self, kind: TransportKind) -> Result<Option<CategoryId>, StoreError> {
        queries::category_id(self.conn(), kind)
    }

    pub fn insert_category(&self, kind: TransportKind, name: &str) -> Result<CategoryId, StoreError> {
        self.conn()
            .prepare_cached("INSERT INTO Category (nameCategory, kind) VALUES (?1, ?2)")?
            .execute(params![name, kind.as_str()])?;
        Ok(CategoryId(self.conn().last_insert_rowid()))
    }

    pub fn route_id(
        &self,
        category: CategoryId,
        number: RouteNumber,
    ) -> Result<Option<RouteId>, StoreError> {
        queries::route_id(self.conn(), category, number)
    }

    pub fn insert_route(&self, category: CategoryId, number: RouteNumber) -> Result<RouteId, StoreError> {
        self.conn()
            .prepare_cached("INSERT INTO Bus (nameCategory_id, numBus) VALUES (?1, ?2)")?
            .execute(params![category.0, number.0])?;
        Ok(RouteId(self.conn().last_insert_rowid()))
    }

    /// Delete a route; its stations and their time slots go with it.
    pub fn delete_route(&self, route: RouteId) -> Result<bool, StoreError> {
        let deleted = self
            .conn()
            .prepare_cached("DELETE FROM Bus WHERE id = ?1")?
            .execute(params![route.0])?;
        Ok(deleted > 0)
    }

    pub fn insert_station(
        &self,
        route: RouteId,
        name: &str,
        path: &str,
        link: &str,
    ) -> Result<StationId, StoreError> {
        self.conn()
            .prepare_cached("INSERT INTO Station (station, path, link, Bus_id) VALUES (?1, ?2, ?3, ?4)")?
            .execute(params![name, path, link, route.0])?;
        Ok(StationId(self.conn().last_insert_rowid()))
    }

    pub fn insert_time_slot(
        &self,
        station: StationId,
        day: DayClass,
        hour: &str,
        minutes: &str,
    ) -> Result<(), StoreError> {
        self.conn()
            .prepare_cached("INSERT INTO BusTime (hour, time, day, Station_id) VALUES (?1, ?2, ?3, ?4)")?
            .execute(params![hour, minutes, day.as_str(), station.0])?;
        Ok(())
    }

    pub fn stations_for_route(&self, route: RouteId) -> Result<Vec<StationRow>, StoreError> {
        queries::stations_for_route(self.conn(), route)
    }

    pub fn all_stations(&self) -> Result<Vec<StationRow>, StoreError> {
        queries::all_stations(self.conn())
    }

    pub fn route(
        &self,
        kind: TransportKind,
        number: RouteNumber,
    ) -> Result<Option<RouteDump>, StoreError> {
        queries::find_route_dump(self.conn(), kind, number)
    }

    pub fn dump(&self) -> Result<SnapshotDump, StoreError> {
        queries::dump(self.conn())
    }
}

impl Drop for WorkingCopy {
    fn drop(&mut self) {
        if self.promoted {
            return;
        }
        // Closing rolls back the open transaction.
        drop(self.conn.take());
        for path in [self.path.clone(), journal_path(&self.path)] {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => tracing::warn!("could not remove {}: {err}", path.display()),
            }
        }
    }
}
