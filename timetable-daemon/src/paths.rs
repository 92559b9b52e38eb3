use std::path::{Path, PathBuf};

use timetable_core::paths::{logs_dir_at, root_at};

pub const DAEMON_LABEL: &str = "dev.timetable.daemon";
pub const DAEMON_LOG: &str = "daemon.log";
pub const DAEMON_SOCKET: &str = "daemon.sock";

pub fn socket_path(home: &Path) -> PathBuf {
    root_at(home).join(DAEMON_SOCKET)
}

pub fn logs_dir(home: &Path) -> PathBuf {
    logs_dir_at(home)
}

pub fn log_path(home: &Path) -> PathBuf {
    logs_dir(home).join(DAEMON_LOG)
}
