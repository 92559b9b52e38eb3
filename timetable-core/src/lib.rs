//! Timetable core library: domain types, on-disk layout, settings, errors.
//!
//! - [`types`]: newtypes and closed enums shared by every crate
//! - [`paths`]: where the snapshot, marker, config and logs live
//! - [`config`]: YAML settings load / save
//! - [`error`]: [`ConfigError`], [`ParseError`]

pub mod config;
pub mod error;
pub mod paths;
pub mod types;

pub use config::Settings;
pub use error::{ConfigError, ParseError};
pub use types::{DayClass, Marker, RouteNumber, TransportKind};
