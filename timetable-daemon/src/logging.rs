//! Daemon log output: `tracing-subscriber` writing to `<root>/logs/daemon.log`.
//!
//! The file is reopened in append mode for every event, so rotation can
//! rename it at any time without the subscriber holding a stale handle.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct DaemonLogFile {
    path: PathBuf,
}

impl DaemonLogFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Where one event ends up: the log file, or stderr when it cannot be opened.
pub enum LogSink {
    File(File),
    Stderr(io::Stderr),
}

impl Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            LogSink::File(f) => f.write(buf),
            LogSink::Stderr(e) => e.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            LogSink::File(f) => f.flush(),
            LogSink::Stderr(e) => e.flush(),
        }
    }
}

impl<'a> MakeWriter<'a> for DaemonLogFile {
    type Writer = LogSink;

    fn make_writer(&'a self) -> Self::Writer {
        let opened = self
            .path
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|()| OpenOptions::new().create(true).append(true).open(&self.path));
        match opened {
            Ok(file) => LogSink::File(file),
            Err(_) => LogSink::Stderr(io::stderr()),
        }
    }
}

/// Install the global subscriber. `log` records from the library crates are
/// captured too. Level comes from `RUST_LOG`, default `info`.
pub fn init_tracing(home: &Path) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(DaemonLogFile::new(crate::paths::log_path(home)))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn writer_recreates_file_after_rename() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs/daemon.log");
        let log = DaemonLogFile::new(&path);

        log.make_writer().write_all(b"first\n").unwrap();
        fs::rename(&path, dir.path().join("logs/daemon.log.1")).unwrap();
        log.make_writer().write_all(b"second\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second\n");
        assert_eq!(
            fs::read_to_string(dir.path().join("logs/daemon.log.1")).unwrap(),
            "first\n"
        );
    }
}
