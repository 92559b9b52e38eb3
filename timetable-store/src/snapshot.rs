//! Read handle on the live snapshot.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};
use sha2::{Digest, Sha256};
use timetable_core::{RouteNumber, TransportKind};

use crate::error::io_err;
use crate::queries;
use crate::rows::{CategoryCounts, RouteDump, SnapshotDump};
use crate::StoreError;

const PIN_ATTEMPTS: usize = 3;

/// The snapshot that was live when [`ScheduleStore::open`](crate::ScheduleStore::open)
/// was called.
///
/// Both the byte view and the SQL view read the same file: a commit that
/// lands while the handle is held replaces the path, not the file the
/// handle already has open.
pub struct Snapshot {
    path: PathBuf,
    file: File,
    conn: Connection,
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot").field("path", &self.path).finish()
    }
}

impl Snapshot {
    pub(crate) fn open(path: &Path) -> Result<Self, StoreError> {
        for _ in 0..PIN_ATTEMPTS {
            let file = match File::open(path) {
                Ok(file) => file,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    return Err(StoreError::Absent {
                        path: path.to_path_buf(),
                    });
                }
                Err(err) => return Err(io_err(path, err)),
            };
            let conn = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            // A commit between the two opens would leave them on different files.
            if same_file(&file, path)? {
                return Ok(Self {
                    path: path.to_path_buf(),
                    file,
                    conn,
                });
            }
            tracing::debug!("snapshot swapped while opening {}, retrying", path.display());
        }
        Err(io_err(
            path,
            std::io::Error::other("snapshot kept changing while being opened"),
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Full file contents, as served to downloaders.
    pub fn read_bytes(&self) -> Result<Vec<u8>, StoreError> {
        let mut file = &self.file;
        file.seek(SeekFrom::Start(0))
            .map_err(|e| io_err(&self.path, e))?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|e| io_err(&self.path, e))?;
        Ok(bytes)
    }

    /// SHA-256 hex digest of the file contents.
    pub fn digest(&self) -> Result<String, StoreError> {
        Ok(sha256_hex(&self.read_bytes()?))
    }

    pub fn dump(&self) -> Result<SnapshotDump, StoreError> {
        queries::dump(&self.conn)
    }

    pub fn route(
        &self,
        kind: TransportKind,
        number: RouteNumber,
    ) -> Result<Option<RouteDump>, StoreError> {
        queries::find_route_dump(&self.conn, kind, number)
    }

    pub fn counts(&self) -> Result<Vec<CategoryCounts>, StoreError> {
        queries::counts(&self.conn)
    }
}

/// SHA-256 hex digest of a file on disk.
pub fn file_digest(path: &Path) -> Result<String, StoreError> {
    let bytes = std::fs::read(path).map_err(|e| io_err(path, e))?;
    Ok(sha256_hex(&bytes))
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(unix)]
fn same_file(file: &File, path: &Path) -> Result<bool, StoreError> {
    use std::os::unix::fs::MetadataExt;

    let held = file.metadata().map_err(|e| io_err(path, e))?;
    let current = match std::fs::metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(io_err(path, err)),
    };
    Ok(held.dev() == current.dev() && held.ino() == current.ino())
}

#[cfg(not(unix))]
fn same_file(_file: &File, _path: &Path) -> Result<bool, StoreError> {
    Ok(true)
}
