//! `timetable init --source <file> [--interval <secs>] [--data-dir <dir>]`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use timetable_core::config;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Listing document (YAML, or JSON with a `.json` extension).
    #[arg(long, short = 's')]
    pub source: PathBuf,

    /// Seconds between daemon sync cycles.
    #[arg(long, short = 'i', value_name = "SECS")]
    pub interval: Option<u64>,

    /// Where the snapshot and marker live (default ~/.timetable/data).
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let (home, mut settings) = super::load_settings()?;

        let source = self
            .source
            .canonicalize()
            .with_context(|| format!("cannot resolve source '{}'", self.source.display()))?;
        settings.source = Some(source.clone());
        if let Some(interval) = self.interval {
            settings.interval_secs = interval;
        }
        if let Some(data_dir) = self.data_dir {
            settings.data_dir = Some(data_dir);
        }

        let path = config::save_at(&home, &settings).context("failed to save settings")?;
        println!("✓ Source: {}", source.display());
        println!("  Data dir: {}", settings.data_dir_at(&home).display());
        println!("  Interval: {}s", settings.interval_secs);
        println!("  Saved to: {}", path.display());
        Ok(())
    }
}
