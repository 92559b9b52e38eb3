//! On-disk layout.
//!
//! ```text
//! ~/.timetable/
//!   config.yaml
//!   data/
//!     schedule.db            (live snapshot, the served file)
//!     schedule.db.staging    (working copy, never read by clients)
//!     schedule.db.lock       (held by whichever process is writing)
//!     last_update.txt        (marker of the live snapshot)
//!   logs/
//!     daemon.log
//! ```
//!
//! Every helper takes the home directory (or data directory) explicitly so
//! tests can root the whole tree in a `TempDir`.

use std::path::{Path, PathBuf};

pub const ROOT_DIR: &str = ".timetable";
pub const CONFIG_FILE: &str = "config.yaml";
pub const SNAPSHOT_FILE: &str = "schedule.db";
pub const STAGING_FILE: &str = "schedule.db.staging";
pub const LOCK_FILE: &str = "schedule.db.lock";
pub const MARKER_FILE: &str = "last_update.txt";

pub fn root_at(home: &Path) -> PathBuf {
    home.join(ROOT_DIR)
}

pub fn config_path_at(home: &Path) -> PathBuf {
    root_at(home).join(CONFIG_FILE)
}

/// Data directory used when settings do not name one.
pub fn default_data_dir_at(home: &Path) -> PathBuf {
    root_at(home).join("data")
}

pub fn logs_dir_at(home: &Path) -> PathBuf {
    root_at(home).join("logs")
}

pub fn snapshot_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SNAPSHOT_FILE)
}

/// Sibling of the snapshot so the final rename never crosses filesystems.
pub fn staging_path(data_dir: &Path) -> PathBuf {
    data_dir.join(STAGING_FILE)
}

pub fn lock_path(data_dir: &Path) -> PathBuf {
    data_dir.join(LOCK_FILE)
}

pub fn marker_path(data_dir: &Path) -> PathBuf {
    data_dir.join(MARKER_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_and_snapshot_share_a_directory() {
        let data = Path::new("/srv/timetable");
        assert_eq!(snapshot_path(data).parent(), staging_path(data).parent());
        assert_ne!(snapshot_path(data), staging_path(data));
    }

    #[test]
    fn layout_is_rooted_under_home() {
        let home = Path::new("/home/op");
        assert_eq!(
            config_path_at(home),
            PathBuf::from("/home/op/.timetable/config.yaml")
        );
        assert_eq!(
            default_data_dir_at(home),
            PathBuf::from("/home/op/.timetable/data")
        );
        assert_eq!(logs_dir_at(home), PathBuf::from("/home/op/.timetable/logs"));
    }
}
