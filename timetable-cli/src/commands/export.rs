//! `timetable export <dest>`: the bytes a download of the snapshot returns.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use timetable_store::{ScheduleStore, StoreError};

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Destination file.
    pub dest: PathBuf,
}

impl ExportArgs {
    pub fn run(self) -> Result<()> {
        let (home, settings) = super::load_settings()?;
        let store = ScheduleStore::new(settings.data_dir_at(&home));

        let snapshot = match store.open() {
            Ok(snapshot) => snapshot,
            Err(StoreError::Absent { path }) => {
                bail!("no snapshot at {}; run `timetable sync` first", path.display())
            }
            Err(err) => return Err(err).context("failed to open snapshot"),
        };
        let bytes = snapshot.read_bytes().context("failed to read snapshot")?;

        let tmp = self.dest.with_extension("export.tmp");
        fs::write(&tmp, &bytes).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &self.dest)
            .with_context(|| format!("rename to {}", self.dest.display()))?;

        println!("✓ Exported {} bytes to {}", bytes.len(), self.dest.display());
        Ok(())
    }
}
