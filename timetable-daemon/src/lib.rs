//! Timetable daemon: periodic sync cycles plus a Unix-socket control surface.

mod error;
pub mod log_rotation;
pub mod logging;
pub mod paths;
pub mod protocol;
mod runtime;

pub use error::DaemonError;
pub use protocol::{
    request_status, request_stop, request_sync, send_request, Command, DaemonRequest,
    DaemonResponse,
};
pub use runtime::{run, serve, start_blocking, Daemon};
