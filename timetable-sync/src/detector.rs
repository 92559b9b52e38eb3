//! Change detection against the remote marker.

use serde::Serialize;
use timetable_core::Marker;
use timetable_source::{ChangedRoutes, ScheduleSource};

use crate::context::CycleContext;
use crate::error::DetectionError;

/// What a cycle should do after comparing markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// No live snapshot: build one from scratch.
    Rebuild,
    /// Snapshot present, marker moved: apply the announced change set.
    Synchronize,
    /// Snapshot present, marker unchanged: nothing to do.
    UpToDate,
}

/// Pure decision table. A marker mismatch is the only trigger for work on an
/// existing snapshot; a missing persisted marker counts as a mismatch.
pub fn decide(store_present: bool, persisted: Option<&Marker>, latest: &Marker) -> Decision {
    if !store_present {
        Decision::Rebuild
    } else if persisted == Some(latest) {
        Decision::UpToDate
    } else {
        Decision::Synchronize
    }
}

/// Asks the source whether, and what, it has published since the last sync.
pub struct ChangeDetector<'a, S: ?Sized> {
    source: &'a S,
}

impl<'a, S: ScheduleSource + ?Sized> ChangeDetector<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    pub fn fetch_latest_marker(&self, ctx: &CycleContext) -> Result<Marker, DetectionError> {
        let marker = self
            .source
            .fetch_latest_marker()
            .map_err(DetectionError::Marker)?;
        tracing::debug!("[{ctx}] latest remote marker: {marker}");
        Ok(marker)
    }

    /// The announced change set, or `None` when the announcement names no
    /// routes. `None` means "nothing to patch", never "rebuild".
    pub fn fetch_changed_routes(
        &self,
        ctx: &CycleContext,
    ) -> Result<Option<ChangedRoutes>, DetectionError> {
        let changes = self
            .source
            .fetch_changed_routes()
            .map_err(DetectionError::ChangedRoutes)?
            .filter(|c| !c.is_empty());
        match &changes {
            Some(c) => tracing::info!(
                "[{ctx}] change announcement: {} route(s) of kind {}",
                c.routes.len(),
                c.kind
            ),
            None => tracing::info!("[{ctx}] change announcement names no routes"),
        }
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timetable_core::{RouteNumber, TransportKind};
    use timetable_source::MemorySource;

    #[test]
    fn decision_table() {
        let old = Marker::from("2024-01-01");
        let new = Marker::from("2024-02-10");
        assert_eq!(decide(false, Some(&new), &new), Decision::Rebuild);
        assert_eq!(decide(false, None, &new), Decision::Rebuild);
        assert_eq!(decide(true, Some(&new), &new), Decision::UpToDate);
        assert_eq!(decide(true, Some(&old), &new), Decision::Synchronize);
        assert_eq!(decide(true, None, &new), Decision::Synchronize);
    }

    #[test]
    fn empty_change_set_is_reported_as_none() {
        let source = MemorySource::new("x")
            .with_changes(ChangedRoutes::new(TransportKind::Bus, Vec::<RouteNumber>::new()));
        let detector = ChangeDetector::new(&source);
        assert_eq!(detector.fetch_changed_routes(&CycleContext::new(1)).unwrap(), None);
    }

    #[test]
    fn missing_marker_is_a_detection_error() {
        let mut source = MemorySource::new("x");
        source.set_marker(None);
        let detector = ChangeDetector::new(&source);
        let err = detector.fetch_latest_marker(&CycleContext::new(1)).unwrap_err();
        assert!(matches!(err, DetectionError::Marker(_)));
    }

    #[test]
    fn change_set_passes_through() {
        let changes = ChangedRoutes::new(TransportKind::Bus, [RouteNumber(12), RouteNumber(45)]);
        let source = MemorySource::new("x").with_changes(changes.clone());
        let detector = ChangeDetector::new(&source);
        assert_eq!(
            detector.fetch_changed_routes(&CycleContext::new(1)).unwrap(),
            Some(changes)
        );
    }
}
