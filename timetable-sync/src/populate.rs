//! Row insertion shared by rebuild and synchronization.

use serde::Serialize;
use timetable_core::DayClass;
use timetable_source::{RoutePaths, TimeSlotRow};
use timetable_store::{RouteId, StationId, StoreError, WorkingCopy};

/// Row counts touched by one rebuild or synchronization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleStats {
    pub categories: usize,
    pub routes_deleted: usize,
    pub routes_inserted: usize,
    pub stations: usize,
    pub time_slots: usize,
    /// Rows whose day label is neither weekday nor weekend.
    pub ignored_time_slots: usize,
}

/// A station inserted but whose timetable has not been fetched yet.
#[derive(Debug)]
pub(crate) struct PendingStation {
    pub id: StationId,
    pub link: String,
}

/// Insert the stops of both path variants under `route`, outbound first.
pub(crate) fn insert_stations(
    copy: &WorkingCopy,
    route: RouteId,
    paths: &RoutePaths,
    stats: &mut CycleStats,
) -> Result<Vec<PendingStation>, StoreError> {
    let mut pending = Vec::new();
    for variant in paths.variants() {
        for stop in &variant.stops {
            let id = copy.insert_station(route, &stop.name, &variant.label, &stop.link)?;
            stats.stations += 1;
            pending.push(PendingStation {
                id,
                link: stop.link.clone(),
            });
        }
    }
    Ok(pending)
}

pub(crate) fn insert_time_slots(
    copy: &WorkingCopy,
    station: StationId,
    rows: &[TimeSlotRow],
    stats: &mut CycleStats,
) -> Result<(), StoreError> {
    for row in rows {
        match DayClass::from_label(&row.day_label) {
            Some(day) => {
                copy.insert_time_slot(station, day, &row.hour, &row.minutes)?;
                stats.time_slots += 1;
            }
            None => {
                tracing::trace!("ignoring '{}' row for station {station}", row.day_label);
                stats.ignored_time_slots += 1;
            }
        }
    }
    Ok(())
}
