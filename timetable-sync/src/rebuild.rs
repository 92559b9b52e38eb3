//! Full snapshot construction from the source listings.
//!
//! Runs in phases so that every route row exists before any station and
//! every station before any time slot:
//!
//! 1. categories
//! 2. route numbers per category (duplicates inserted once)
//! 3. stations per route, outbound path then inbound
//! 4. time slots per station, weekday/weekend only

use std::collections::BTreeSet;

use timetable_core::{RouteNumber, TransportKind};
use timetable_source::ScheduleSource;
use timetable_store::{RouteId, WorkingCopy};

use crate::context::CycleContext;
use crate::error::BuildError;
use crate::populate::{insert_stations, insert_time_slots, CycleStats};

pub struct RebuildEngine<'a, S: ?Sized> {
    source: &'a S,
}

impl<'a, S: ScheduleSource + ?Sized> RebuildEngine<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Populate `copy` from scratch. On error the caller discards the copy;
    /// a partial rebuild is never committed.
    pub fn build(&self, ctx: &CycleContext, copy: &WorkingCopy) -> Result<CycleStats, BuildError> {
        let mut stats = CycleStats::default();

        let listings = self.source.list_categories()?;
        if listings.is_empty() {
            return Err(BuildError::EmptyListing);
        }
        let mut categories = Vec::new();
        for listing in &listings {
            if copy.category_id(listing.kind)?.is_some() {
                tracing::warn!("[{ctx}] category {} listed twice, keeping the first", listing.kind);
                continue;
            }
            let id = copy.insert_category(listing.kind, &listing.name)?;
            stats.categories += 1;
            categories.push((listing.kind, id));
        }
        tracing::info!("[{ctx}] rebuild: {} categories", stats.categories);

        let mut routes: Vec<(TransportKind, RouteNumber, RouteId)> = Vec::new();
        for (kind, category) in categories {
            let mut seen = BTreeSet::new();
            for number in self.source.list_route_numbers(kind)? {
                if !seen.insert(number) {
                    continue;
                }
                let id = copy.insert_route(category, number)?;
                stats.routes_inserted += 1;
                routes.push((kind, number, id));
            }
        }
        tracing::info!("[{ctx}] rebuild: {} routes", stats.routes_inserted);

        let mut stations = Vec::new();
        for (kind, number, route) in routes {
            if ctx.is_cancelled() {
                return Err(BuildError::Cancelled);
            }
            let paths = self.source.list_route_paths(kind, number)?;
            if paths.is_empty() {
                tracing::debug!("[{ctx}] {kind} {number} lists no stops");
            }
            stations.extend(insert_stations(copy, route, &paths, &mut stats)?);
        }
        tracing::info!("[{ctx}] rebuild: {} stations", stats.stations);

        for station in stations {
            if ctx.is_cancelled() {
                return Err(BuildError::Cancelled);
            }
            let rows = self.source.list_time_slots(&station.link)?;
            insert_time_slots(copy, station.id, &rows, &mut stats)?;
        }
        tracing::info!(
            "[{ctx}] rebuild: {} time slots ({} ignored)",
            stats.time_slots,
            stats.ignored_time_slots
        );

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use timetable_core::Marker;
    use timetable_source::{
        CategoryListing, ChangedRoutes, MemorySource, PathVariant, RoutePaths, SourceError,
        StopListing, TimeSlotRow,
    };
    use timetable_store::ScheduleStore;

    fn one_route_source() -> MemorySource {
        MemorySource::new("2024-01-01")
            .with_category(TransportKind::Bus, "Автобус")
            .with_route(
                TransportKind::Bus,
                RouteNumber(12),
                RoutePaths::new(
                    Some(PathVariant::new("A - B", vec![StopListing::new("A", "/a")])),
                    Some(PathVariant::new("B - A", vec![StopListing::new("B", "/b")])),
                ),
            )
            .with_timetable(
                "/a",
                vec![
                    TimeSlotRow::new("будни", "6", "05 35"),
                    TimeSlotRow::new("праздничные", "6", "10"),
                    TimeSlotRow::new("выходные", "7", "00"),
                ],
            )
    }

    #[test]
    fn builds_every_phase_and_counts_ignored_days() {
        let dir = TempDir::new().unwrap();
        let store = ScheduleStore::new(dir.path());
        let copy = store.begin_staging().unwrap();

        let stats = RebuildEngine::new(&one_route_source())
            .build(&CycleContext::new(1), &copy)
            .unwrap();

        assert_eq!(stats.categories, 1);
        assert_eq!(stats.routes_inserted, 1);
        assert_eq!(stats.stations, 2);
        assert_eq!(stats.time_slots, 2);
        assert_eq!(stats.ignored_time_slots, 1);

        let route = copy.route(TransportKind::Bus, RouteNumber(12)).unwrap().unwrap();
        let names: Vec<_> = route.stations.iter().map(|s| s.station.name.as_str()).collect();
        assert_eq!(names, ["A", "B"]);
        assert_eq!(route.stations[0].station.path, "A - B");
    }

    #[test]
    fn duplicate_route_numbers_are_inserted_once() {
        let dir = TempDir::new().unwrap();
        let store = ScheduleStore::new(dir.path());
        let copy = store.begin_staging().unwrap();

        struct Doubled(MemorySource);
        impl ScheduleSource for Doubled {
            fn list_categories(&self) -> Result<Vec<CategoryListing>, SourceError> {
                self.0.list_categories()
            }
            fn list_route_numbers(&self, kind: TransportKind) -> Result<Vec<RouteNumber>, SourceError> {
                let mut numbers = self.0.list_route_numbers(kind)?;
                numbers.extend(numbers.clone());
                Ok(numbers)
            }
            fn list_route_paths(
                &self,
                kind: TransportKind,
                number: RouteNumber,
            ) -> Result<RoutePaths, SourceError> {
                self.0.list_route_paths(kind, number)
            }
            fn list_time_slots(&self, link: &str) -> Result<Vec<TimeSlotRow>, SourceError> {
                self.0.list_time_slots(link)
            }
            fn fetch_latest_marker(&self) -> Result<Marker, SourceError> {
                self.0.fetch_latest_marker()
            }
            fn fetch_changed_routes(&self) -> Result<Option<ChangedRoutes>, SourceError> {
                self.0.fetch_changed_routes()
            }
        }

        let stats = RebuildEngine::new(&Doubled(one_route_source()))
            .build(&CycleContext::new(1), &copy)
            .unwrap();
        assert_eq!(stats.routes_inserted, 1);
    }

    #[test]
    fn empty_listing_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = ScheduleStore::new(dir.path());
        let copy = store.begin_staging().unwrap();

        let err = RebuildEngine::new(&MemorySource::new("x"))
            .build(&CycleContext::new(1), &copy)
            .unwrap_err();
        assert!(matches!(err, BuildError::EmptyListing));
    }

    #[test]
    fn cancelled_before_stations() {
        let dir = TempDir::new().unwrap();
        let store = ScheduleStore::new(dir.path());
        let copy = store.begin_staging().unwrap();
        let ctx = CycleContext::new(1);
        ctx.cancel();

        let err = RebuildEngine::new(&one_route_source()).build(&ctx, &copy).unwrap_err();
        assert!(matches!(err, BuildError::Cancelled));
    }
}
