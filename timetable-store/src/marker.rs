//! `last_update.txt`: the remote marker the live snapshot reflects.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use timetable_core::Marker;

use crate::error::io_err;
use crate::StoreError;

/// Plain-text file holding one [`Marker`].
#[derive(Debug, Clone)]
pub struct MarkerFile {
    path: PathBuf,
}

impl MarkerFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when the file is missing or blank.
    pub fn load(&self) -> Result<Option<Marker>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => {
                let raw = raw.trim();
                Ok((!raw.is_empty()).then(|| Marker::from(raw)))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_err(&self.path, err)),
        }
    }

    /// Replace the stored marker (tmp file + rename).
    pub fn save(&self, marker: &Marker) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        let tmp = self.path.with_extension("txt.tmp");
        std::fs::write(&tmp, marker.as_str()).map_err(|e| io_err(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| io_err(&self.path, e))?;
        tracing::debug!("marker {} written to {}", marker, self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_loads_as_none() {
        let dir = TempDir::new().unwrap();
        let file = MarkerFile::new(dir.path().join("last_update.txt"));
        assert_eq!(file.load().unwrap(), None);
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let file = MarkerFile::new(dir.path().join("data/last_update.txt"));
        file.save(&Marker::from("10.02.2024")).unwrap();
        assert_eq!(file.load().unwrap(), Some(Marker::from("10.02.2024")));
        assert!(!dir.path().join("data/last_update.txt.tmp").exists());
    }

    #[test]
    fn whitespace_is_trimmed_and_blank_is_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("last_update.txt");
        std::fs::write(&path, "2024-01-01\n").unwrap();
        let file = MarkerFile::new(&path);
        assert_eq!(file.load().unwrap(), Some(Marker::from("2024-01-01")));

        std::fs::write(&path, "  \n").unwrap();
        assert_eq!(file.load().unwrap(), None);
    }
}
