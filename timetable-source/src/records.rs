//! Records returned by a [`ScheduleSource`](crate::ScheduleSource).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use timetable_core::{RouteNumber, TransportKind};

/// A transport category as listed by the site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryListing {
    pub kind: TransportKind,
    /// Display name as the site prints it (stored verbatim).
    pub name: String,
}

/// One stop on a path variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopListing {
    pub name: String,
    /// Detail link the stop's timetable is fetched from.
    pub link: String,
}

impl StopListing {
    pub fn new(name: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            link: link.into(),
        }
    }
}

/// One direction of a route: its heading and stops in travel order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathVariant {
    pub label: String,
    #[serde(default)]
    pub stops: Vec<StopListing>,
}

impl PathVariant {
    pub fn new(label: impl Into<String>, stops: Vec<StopListing>) -> Self {
        Self {
            label: label.into(),
            stops,
        }
    }
}

/// Both directions of a route, each discovered independently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutePaths {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbound: Option<PathVariant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inbound: Option<PathVariant>,
}

impl RoutePaths {
    pub fn new(outbound: Option<PathVariant>, inbound: Option<PathVariant>) -> Self {
        Self { outbound, inbound }
    }

    /// Outbound first, then inbound; insertion order defines path order.
    pub fn variants(&self) -> impl Iterator<Item = &PathVariant> {
        self.outbound.iter().chain(self.inbound.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.variants().all(|v| v.stops.is_empty())
    }
}

/// One timetable row: departures within an hour for one day label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlotRow {
    /// Untranslated day label (`будни`, `выходные`, `праздничные`, …).
    #[serde(rename = "day")]
    pub day_label: String,
    pub hour: String,
    pub minutes: String,
}

impl TimeSlotRow {
    pub fn new(
        day_label: impl Into<String>,
        hour: impl Into<String>,
        minutes: impl Into<String>,
    ) -> Self {
        Self {
            day_label: day_label.into(),
            hour: hour.into(),
            minutes: minutes.into(),
        }
    }
}

/// Routes named by the latest change announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedRoutes {
    pub kind: TransportKind,
    pub routes: BTreeSet<RouteNumber>,
}

impl ChangedRoutes {
    pub fn new(kind: TransportKind, routes: impl IntoIterator<Item = RouteNumber>) -> Self {
        Self {
            kind,
            routes: routes.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
