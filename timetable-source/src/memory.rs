//! In-process listing: the whole remote state held in memory.

use std::collections::{BTreeMap, HashMap};

use timetable_core::{Marker, RouteNumber, TransportKind};

use crate::records::{CategoryListing, ChangedRoutes, RoutePaths, TimeSlotRow};
use crate::{ScheduleSource, SourceError};

/// A [`ScheduleSource`] backed by plain collections.
///
/// Built with the `with_*` methods and mutated with the `set_*` / `replace_*`
/// methods to model the remote site publishing a change.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    marker: Option<Marker>,
    categories: Vec<CategoryListing>,
    routes: BTreeMap<TransportKind, Vec<(RouteNumber, RoutePaths)>>,
    timetables: HashMap<String, Vec<TimeSlotRow>>,
    changes: Option<ChangedRoutes>,
}

impl MemorySource {
    pub fn new(marker: impl Into<Marker>) -> Self {
        Self {
            marker: Some(marker.into()),
            ..Self::default()
        }
    }

    pub fn with_category(mut self, kind: TransportKind, name: impl Into<String>) -> Self {
        self.categories.push(CategoryListing {
            kind,
            name: name.into(),
        });
        self
    }

    pub fn with_route(mut self, kind: TransportKind, number: RouteNumber, paths: RoutePaths) -> Self {
        self.replace_route(kind, number, paths);
        self
    }

    pub fn with_timetable(mut self, link: impl Into<String>, rows: Vec<TimeSlotRow>) -> Self {
        self.timetables.insert(link.into(), rows);
        self
    }

    pub fn with_changes(mut self, changes: ChangedRoutes) -> Self {
        self.changes = Some(changes);
        self
    }

    pub fn set_marker(&mut self, marker: Option<Marker>) {
        self.marker = marker;
    }

    pub fn set_changes(&mut self, changes: Option<ChangedRoutes>) {
        self.changes = changes;
    }

    /// Insert or overwrite a route, keeping its listing position if present.
    pub fn replace_route(&mut self, kind: TransportKind, number: RouteNumber, paths: RoutePaths) {
        let routes = self.routes.entry(kind).or_default();
        match routes.iter_mut().find(|(n, _)| *n == number) {
            Some(entry) => entry.1 = paths,
            None => routes.push((number, paths)),
        }
    }

    /// Withdraw a route from the listing.
    pub fn remove_route(&mut self, kind: TransportKind, number: RouteNumber) {
        if let Some(routes) = self.routes.get_mut(&kind) {
            routes.retain(|(n, _)| *n != number);
        }
    }

    pub fn set_timetable(&mut self, link: impl Into<String>, rows: Vec<TimeSlotRow>) {
        self.timetables.insert(link.into(), rows);
    }
}

impl ScheduleSource for MemorySource {
    fn list_categories(&self) -> Result<Vec<CategoryListing>, SourceError> {
        Ok(self.categories.clone())
    }

    fn list_route_numbers(&self, kind: TransportKind) -> Result<Vec<RouteNumber>, SourceError> {
        Ok(self
            .routes
            .get(&kind)
            .map(|routes| routes.iter().map(|(n, _)| *n).collect())
            .unwrap_or_default())
    }

    fn list_route_paths(
        &self,
        kind: TransportKind,
        number: RouteNumber,
    ) -> Result<RoutePaths, SourceError> {
        Ok(self
            .routes
            .get(&kind)
            .and_then(|routes| routes.iter().find(|(n, _)| *n == number))
            .map(|(_, paths)| paths.clone())
            .unwrap_or_default())
    }

    fn list_time_slots(&self, link: &str) -> Result<Vec<TimeSlotRow>, SourceError> {
        Ok(self.timetables.get(link).cloned().unwrap_or_default())
    }

    fn fetch_latest_marker(&self) -> Result<Marker, SourceError> {
        self.marker.clone().ok_or(SourceError::MissingMarker)
    }

    fn fetch_changed_routes(&self) -> Result<Option<ChangedRoutes>, SourceError> {
        Ok(self.changes.clone())
    }
}
