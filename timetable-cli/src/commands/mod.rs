pub mod daemon;
pub mod export;
pub mod init;
pub mod status;
pub mod sync;

use std::path::PathBuf;

use anyhow::{Context, Result};
use timetable_core::{config, Settings};

/// Home directory and the settings stored under it.
pub(crate) fn load_settings() -> Result<(PathBuf, Settings)> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    let settings = config::load_at(&home).context("failed to load settings")?;
    Ok((home, settings))
}
