//! # timetable-sync
//!
//! Keeps the local snapshot in step with the remote timetable.
//!
//! [`SyncOrchestrator::tick`] runs one cycle: fetch the remote marker,
//! compare it with the persisted one, then rebuild ([`RebuildEngine`]),
//! patch the announced routes ([`RouteSynchronizer`]) or do nothing. Both
//! builders write to a private working copy that is only promoted by an
//! atomic commit, and the marker is saved only after that commit succeeds.

pub mod context;
pub mod cycle;
pub mod detector;
pub mod error;
pub mod orchestrator;
mod populate;
pub mod rebuild;
pub mod synchronizer;

pub use context::CycleContext;
pub use cycle::{CycleOutcome, CycleReport, CycleState};
pub use detector::{decide, ChangeDetector, Decision};
pub use error::{BuildError, CycleError, DetectionError, SyncError};
pub use orchestrator::SyncOrchestrator;
pub use populate::CycleStats;
pub use rebuild::RebuildEngine;
pub use synchronizer::RouteSynchronizer;
