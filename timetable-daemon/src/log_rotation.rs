//! Size-based rotation of `daemon.log`.
//!
//! `daemon.log` becomes `daemon.log.1`, older generations shift up by one and
//! anything past the last kept generation is deleted.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Rotate once the live log reaches 10 MiB.
pub const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

/// Rotated generations kept next to the live log.
pub const KEEP_GENERATIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    pub max_bytes: u64,
    pub keep: usize,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_bytes: MAX_LOG_BYTES,
            keep: KEEP_GENERATIONS,
        }
    }
}

impl RotationPolicy {
    /// Rotate `log` if it has reached `max_bytes`. Returns whether it did.
    /// A missing log is not an error.
    pub fn apply(&self, log: &Path) -> io::Result<bool> {
        let len = match fs::metadata(log) {
            Ok(meta) => meta.len(),
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(err),
        };
        if len < self.max_bytes || self.keep == 0 {
            return Ok(false);
        }

        match fs::remove_file(generation(log, self.keep)) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }
        for n in (1..self.keep).rev() {
            let from = generation(log, n);
            if from.exists() {
                fs::rename(&from, generation(log, n + 1))?;
            }
        }
        fs::rename(log, generation(log, 1))?;
        // The writer reopens per event, so the next line recreates the file.
        Ok(true)
    }
}

/// Rotate the daemon log under `home`, logging rather than failing.
pub fn rotate_logs(home: &Path) {
    let log = crate::paths::log_path(home);
    match RotationPolicy::default().apply(&log) {
        Ok(true) => tracing::info!(path = %log.display(), "log file rotated"),
        Ok(false) => {}
        Err(err) => tracing::warn!(path = %log.display(), error = %err, "log rotation failed"),
    }
}

fn generation(base: &Path, n: usize) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{n}"));
    PathBuf::from(name)
}
