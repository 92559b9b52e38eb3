//! Cycle states, outcomes and reports.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use timetable_core::{Marker, RouteNumber, TransportKind};

use crate::populate::CycleStats;

/// Where the orchestrator is in its state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    Idle,
    CheckingMarker,
    Rebuilding,
    Synchronizing,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CycleState::Idle => "idle",
            CycleState::CheckingMarker => "checking marker",
            CycleState::Rebuilding => "rebuilding",
            CycleState::Synchronizing => "synchronizing",
        })
    }
}

/// What a finished cycle did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Another cycle, in this process or another, was writing; this tick
    /// was dropped.
    Skipped,
    /// Remote marker equals the persisted one.
    UpToDate { marker: Marker },
    /// No snapshot existed; a full one was committed.
    Rebuilt { marker: Marker, stats: CycleStats },
    /// The announced routes were replaced and committed.
    Synchronized {
        marker: Marker,
        kind: TransportKind,
        routes: Vec<RouteNumber>,
        stats: CycleStats,
    },
    /// The marker moved but the announcement named no routes.
    MarkerAdvanced { marker: Marker },
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleOutcome::Skipped => write!(f, "skipped: another cycle is writing"),
            CycleOutcome::UpToDate { marker } => write!(f, "up to date ({marker})"),
            CycleOutcome::Rebuilt { marker, stats } => write!(
                f,
                "rebuilt snapshot for {marker}: {} routes, {} stations, {} time slots",
                stats.routes_inserted, stats.stations, stats.time_slots
            ),
            CycleOutcome::Synchronized {
                marker,
                kind,
                routes,
                ..
            } => {
                let numbers: Vec<String> = routes.iter().map(|n| n.to_string()).collect();
                write!(f, "synchronized {kind} {} for {marker}", numbers.join(", "))
            }
            CycleOutcome::MarkerAdvanced { marker } => {
                write!(f, "marker advanced to {marker}, no routes changed")
            }
        }
    }
}

/// Record of the most recent non-skipped cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub id: u64,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<CycleOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CycleReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}
