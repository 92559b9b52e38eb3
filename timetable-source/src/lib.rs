//! # timetable-source
//!
//! The schedule source collaborator: what the sync engine may ask a remote
//! timetable site, and the typed records it gets back.
//!
//! Scraping a particular site lives behind [`ScheduleSource`]. Two
//! implementations ship here: [`MemorySource`] (an in-process listing) and
//! [`FileSource`] (a YAML/JSON listing document re-read when it changes).

pub mod error;
pub mod file;
pub mod memory;
pub mod records;

use std::sync::Arc;

use timetable_core::{Marker, RouteNumber, TransportKind};

pub use error::SourceError;
pub use file::FileSource;
pub use memory::MemorySource;
pub use records::{
    CategoryListing, ChangedRoutes, PathVariant, RoutePaths, StopListing, TimeSlotRow,
};

/// Read-only view of the remote timetable.
///
/// Every call may fail with a [`SourceError`]; callers treat any failure as
/// "abort this cycle", never as fatal to the process.
pub trait ScheduleSource: Send + Sync {
    /// Transport categories offered by the site, in listing order.
    fn list_categories(&self) -> Result<Vec<CategoryListing>, SourceError>;

    /// Route numbers listed under one category, in listing order.
    fn list_route_numbers(&self, kind: TransportKind) -> Result<Vec<RouteNumber>, SourceError>;

    /// Both path variants of one route. A route the site no longer lists
    /// yields empty paths, not an error.
    fn list_route_paths(
        &self,
        kind: TransportKind,
        number: RouteNumber,
    ) -> Result<RoutePaths, SourceError>;

    /// Timetable rows behind a stop's detail link, day labels untranslated.
    fn list_time_slots(&self, link: &str) -> Result<Vec<TimeSlotRow>, SourceError>;

    /// Identifier of the latest published schedule change.
    fn fetch_latest_marker(&self) -> Result<Marker, SourceError>;

    /// Routes named by the latest change announcement. `None` when the
    /// announcement has no parseable change section.
    fn fetch_changed_routes(&self) -> Result<Option<ChangedRoutes>, SourceError>;
}

macro_rules! forward_source {
    ($wrapper:ty) => {
        impl<S: ScheduleSource + ?Sized> ScheduleSource for $wrapper {
            fn list_categories(&self) -> Result<Vec<CategoryListing>, SourceError> {
                (**self).list_categories()
            }

            fn list_route_numbers(
                &self,
                kind: TransportKind,
            ) -> Result<Vec<RouteNumber>, SourceError> {
                (**self).list_route_numbers(kind)
            }

            fn list_route_paths(
                &self,
                kind: TransportKind,
                number: RouteNumber,
            ) -> Result<RoutePaths, SourceError> {
                (**self).list_route_paths(kind, number)
            }

            fn list_time_slots(&self, link: &str) -> Result<Vec<TimeSlotRow>, SourceError> {
                (**self).list_time_slots(link)
            }

            fn fetch_latest_marker(&self) -> Result<Marker, SourceError> {
                (**self).fetch_latest_marker()
            }

            fn fetch_changed_routes(&self) -> Result<Option<ChangedRoutes>, SourceError> {
                (**self).fetch_changed_routes()
            }
        }
    };
}

forward_source!(Box<S>);
forward_source!(Arc<S>);
forward_source!(&S);
