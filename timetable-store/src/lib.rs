//! # timetable-store
//!
//! The on-disk relational snapshot and the rules for replacing it.
//!
//! Readers only ever see `schedule.db`. Writers build a [`WorkingCopy`] at a
//! sibling path and [`ScheduleStore::commit`] promotes it with one rename, so
//! any reader observes either the old file or the new one, never a mix.
//! Only one writer, across processes, may hold a working copy at a time
//! ([`WriterLock`]).
//! [`MarkerFile`] records which remote publish the live snapshot reflects.

pub mod error;
pub mod marker;
mod queries;
pub mod rows;
pub mod schema;
pub mod snapshot;
pub mod store;

pub use error::{CommitError, StoreError};
pub use marker::MarkerFile;
pub use rows::{
    CategoryCounts, CategoryId, CategoryRow, RouteDump, RouteId, RouteRow, SlotRow,
    SnapshotDump, StationDump, StationId, StationRow,
};
pub use snapshot::{file_digest, Snapshot};
pub use store::{ScheduleStore, WorkingCopy, WriterLock};
