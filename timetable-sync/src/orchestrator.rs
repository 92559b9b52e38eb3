//! The cycle state machine and its single-writer guard.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::Utc;
use timetable_core::{paths, Marker};
use timetable_source::{ChangedRoutes, ScheduleSource};
use timetable_store::{MarkerFile, ScheduleStore, StoreError, WorkingCopy, WriterLock};

use crate::context::CycleContext;
use crate::cycle::{CycleOutcome, CycleReport, CycleState};
use crate::detector::{decide, ChangeDetector, Decision};
use crate::error::CycleError;
use crate::rebuild::RebuildEngine;
use crate::synchronizer::RouteSynchronizer;

/// Drives cycles against one store, marker file and source.
///
/// `tick` may be called from any thread; a tick that finds a cycle already
/// running returns [`CycleOutcome::Skipped`] immediately. The same goes for
/// a cycle that finds the store's writer lock held by another process.
pub struct SyncOrchestrator<S> {
    store: ScheduleStore,
    marker: MarkerFile,
    source: S,
    state: Mutex<CycleState>,
    current: Mutex<Option<CycleContext>>,
    last_report: Mutex<Option<CycleReport>>,
    next_id: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Puts the orchestrator back to idle however the cycle ends.
struct InFlight<'a, S> {
    orchestrator: &'a SyncOrchestrator<S>,
}

impl<S> Drop for InFlight<'_, S> {
    fn drop(&mut self) {
        *lock(&self.orchestrator.current) = None;
        *lock(&self.orchestrator.state) = CycleState::Idle;
    }
}

impl<S: ScheduleSource> SyncOrchestrator<S> {
    pub fn new(store: ScheduleStore, marker: MarkerFile, source: S) -> Self {
        Self {
            store,
            marker,
            source,
            state: Mutex::new(CycleState::Idle),
            current: Mutex::new(None),
            last_report: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Snapshot and marker file under their usual names in `data_dir`.
    pub fn for_data_dir(data_dir: &Path, source: S) -> Self {
        Self::new(
            ScheduleStore::new(data_dir),
            MarkerFile::new(paths::marker_path(data_dir)),
            source,
        )
    }

    pub fn store(&self) -> &ScheduleStore {
        &self.store
    }

    pub fn marker_file(&self) -> &MarkerFile {
        &self.marker
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn state(&self) -> CycleState {
        *lock(&self.state)
    }

    pub fn last_report(&self) -> Option<CycleReport> {
        lock(&self.last_report).clone()
    }

    /// Ask the in-flight cycle, if any, to stop at its next route boundary.
    /// Returns whether there was one.
    pub fn cancel(&self) -> bool {
        match lock(&self.current).as_ref() {
            Some(ctx) => {
                tracing::info!("[{ctx}] cancellation requested");
                ctx.cancel();
                true
            }
            None => false,
        }
    }

    /// Run one cycle, or skip if one is already running.
    pub fn tick(&self) -> Result<CycleOutcome, CycleError> {
        let ctx = {
            let mut state = lock(&self.state);
            if *state != CycleState::Idle {
                tracing::debug!("tick dropped: cycle in flight ({})", *state);
                return Ok(CycleOutcome::Skipped);
            }
            *state = CycleState::CheckingMarker;
            let ctx = CycleContext::new(self.next_id.fetch_add(1, Ordering::SeqCst));
            *lock(&self.current) = Some(ctx.clone());
            ctx
        };
        let _in_flight = InFlight { orchestrator: self };

        let started_at = Utc::now();
        let clock = Instant::now();
        let result = self.run_cycle(&ctx);
        let duration_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);

        if let Ok(CycleOutcome::Skipped) = result {
            return result;
        }
        match &result {
            Ok(outcome) => tracing::info!("[{ctx}] {outcome} ({duration_ms} ms)"),
            Err(err) if err.is_cancelled() => tracing::warn!("[{ctx}] {err}"),
            Err(err) => tracing::error!("[{ctx}] cycle failed: {err}"),
        }
        *lock(&self.last_report) = Some(CycleReport {
            id: ctx.id(),
            started_at,
            duration_ms,
            outcome: result.as_ref().ok().cloned(),
            error: result.as_ref().err().map(|e| e.to_string()),
        });
        result
    }

    fn set_state(&self, state: CycleState) {
        *lock(&self.state) = state;
    }

    fn run_cycle(&self, ctx: &CycleContext) -> Result<CycleOutcome, CycleError> {
        let detector = ChangeDetector::new(&self.source);
        let latest = detector.fetch_latest_marker(ctx)?;
        let persisted = self.marker.load()?;

        match decide(self.store.is_present(), persisted.as_ref(), &latest) {
            Decision::UpToDate => Ok(CycleOutcome::UpToDate { marker: latest }),
            Decision::Rebuild => {
                self.set_state(CycleState::Rebuilding);
                self.rebuild(ctx, latest)
            }
            Decision::Synchronize => {
                self.set_state(CycleState::Synchronizing);
                tracing::info!(
                    "[{ctx}] marker moved: {} -> {latest}",
                    persisted.as_ref().map_or("<none>", Marker::as_str)
                );
                match detector.fetch_changed_routes(ctx)? {
                    Some(changes) => self.synchronize(ctx, latest, changes),
                    None => {
                        let Some(_lock) = self.writer_lock(ctx)? else {
                            return Ok(CycleOutcome::Skipped);
                        };
                        self.marker.save(&latest)?;
                        Ok(CycleOutcome::MarkerAdvanced { marker: latest })
                    }
                }
            }
        }
    }

    /// `None` when another writer holds the store.
    fn stage(&self, ctx: &CycleContext) -> Result<Option<WorkingCopy>, CycleError> {
        match self.store.begin_staging() {
            Ok(copy) => Ok(Some(copy)),
            Err(StoreError::Busy { path }) => {
                tracing::info!("[{ctx}] {} is held by another writer, skipping", path.display());
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn writer_lock(&self, ctx: &CycleContext) -> Result<Option<WriterLock>, CycleError> {
        match self.store.lock_writer() {
            Ok(lock) => Ok(Some(lock)),
            Err(StoreError::Busy { path }) => {
                tracing::info!("[{ctx}] {} is held by another writer, skipping", path.display());
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn rebuild(&self, ctx: &CycleContext, latest: Marker) -> Result<CycleOutcome, CycleError> {
        tracing::info!("[{ctx}] no snapshot at {}, rebuilding", self.store.live_path().display());
        let Some(copy) = self.stage(ctx)? else {
            return Ok(CycleOutcome::Skipped);
        };
        let stats = match RebuildEngine::new(&self.source).build(ctx, &copy) {
            Ok(stats) => stats,
            Err(err) => {
                self.store.discard(copy);
                return Err(err.into());
            }
        };
        let _lock = self.store.commit(copy)?;
        self.marker.save(&latest)?;
        Ok(CycleOutcome::Rebuilt {
            marker: latest,
            stats,
        })
    }

    fn synchronize(
        &self,
        ctx: &CycleContext,
        latest: Marker,
        changes: ChangedRoutes,
    ) -> Result<CycleOutcome, CycleError> {
        let Some(copy) = self.stage(ctx)? else {
            return Ok(CycleOutcome::Skipped);
        };
        let stats = match RouteSynchronizer::new(&self.source).apply(ctx, &copy, &changes) {
            Ok(stats) => stats,
            Err(err) => {
                self.store.discard(copy);
                return Err(err.into());
            }
        };
        let _lock = self.store.commit(copy)?;
        self.marker.save(&latest)?;
        Ok(CycleOutcome::Synchronized {
            marker: latest,
            kind: changes.kind,
            routes: changes.routes.into_iter().collect(),
            stats,
        })
    }
}
