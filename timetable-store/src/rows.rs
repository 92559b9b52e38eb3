//! Row types read back out of a snapshot.

use serde::Serialize;
use timetable_core::{DayClass, RouteNumber, TransportKind};

macro_rules! row_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

row_id!(CategoryId);
row_id!(RouteId);
row_id!(StationId);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryRow {
    pub id: CategoryId,
    pub kind: TransportKind,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteRow {
    pub id: RouteId,
    pub category_id: CategoryId,
    pub number: RouteNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StationRow {
    pub id: StationId,
    pub route_id: RouteId,
    pub name: String,
    /// Heading of the path variant this stop belongs to.
    pub path: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotRow {
    pub id: i64,
    pub station_id: StationId,
    pub day: DayClass,
    pub hour: String,
    pub minutes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StationDump {
    pub station: StationRow,
    pub time_slots: Vec<SlotRow>,
}

/// A route with everything hanging off it, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteDump {
    pub route: RouteRow,
    pub stations: Vec<StationDump>,
}

impl RouteDump {
    pub fn time_slot_count(&self) -> usize {
        self.stations.iter().map(|s| s.time_slots.len()).sum()
    }
}

/// Every row of a snapshot in canonical (id) order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotDump {
    pub categories: Vec<CategoryRow>,
    pub routes: Vec<RouteDump>,
}

impl SnapshotDump {
    pub fn route(&self, category: CategoryId, number: RouteNumber) -> Option<&RouteDump> {
        self.routes
            .iter()
            .find(|r| r.route.category_id == category && r.route.number == number)
    }

    pub fn category(&self, kind: TransportKind) -> Option<&CategoryRow> {
        self.categories.iter().find(|c| c.kind == kind)
    }
}

/// Per-category totals, for status output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    pub kind: TransportKind,
    pub name: String,
    pub routes: u64,
    pub stations: u64,
    pub time_slots: u64,
}
