//! Incremental patching of a working copy from a change announcement.

use timetable_source::{ChangedRoutes, ScheduleSource};
use timetable_store::WorkingCopy;

use crate::context::CycleContext;
use crate::error::SyncError;
use crate::populate::{insert_stations, insert_time_slots, CycleStats};

/// Replaces the announced routes in a copy seeded from the live snapshot.
///
/// A changed route is always delete-then-reinsert: every row of an affected
/// route gets a fresh id, every row of any other route is left alone.
pub struct RouteSynchronizer<'a, S: ?Sized> {
    source: &'a S,
}

impl<'a, S: ScheduleSource + ?Sized> RouteSynchronizer<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    pub fn apply(
        &self,
        ctx: &CycleContext,
        copy: &WorkingCopy,
        changes: &ChangedRoutes,
    ) -> Result<CycleStats, SyncError> {
        let mut stats = CycleStats::default();
        let category = copy
            .category_id(changes.kind)?
            .ok_or(SyncError::CategoryNotFound(changes.kind))?;

        for &number in &changes.routes {
            if ctx.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            if let Some(route) = copy.route_id(category, number)? {
                copy.delete_route(route)?;
                stats.routes_deleted += 1;
                tracing::debug!("[{ctx}] deleted {} {number}", changes.kind);
            }
        }

        for &number in &changes.routes {
            if ctx.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            let route = copy.insert_route(category, number)?;
            stats.routes_inserted += 1;

            // A withdrawn route keeps its row with no stations.
            let paths = self.source.list_route_paths(changes.kind, number)?;
            if paths.is_empty() {
                tracing::warn!("[{ctx}] {} {number} is not listed any more", changes.kind);
            }
            for station in insert_stations(copy, route, &paths, &mut stats)? {
                let rows = self.source.list_time_slots(&station.link)?;
                insert_time_slots(copy, station.id, &rows, &mut stats)?;
            }
            tracing::debug!("[{ctx}] reinserted {} {number}", changes.kind);
        }

        tracing::info!(
            "[{ctx}] synchronized {} route(s): {} stations, {} time slots",
            stats.routes_inserted,
            stats.stations,
            stats.time_slots
        );
        Ok(stats)
    }
}
