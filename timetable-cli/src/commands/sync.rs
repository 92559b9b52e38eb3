//! `timetable sync [--json]`

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use timetable_source::FileSource;
use timetable_sync::{CycleOutcome, SyncOrchestrator};

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Print the cycle outcome as JSON.
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let (home, settings) = super::load_settings()?;
        let source = settings
            .source
            .clone()
            .context("no listing source configured; run `timetable init --source <file>` first")?;

        let orchestrator =
            SyncOrchestrator::for_data_dir(&settings.data_dir_at(&home), FileSource::new(source));
        let outcome = orchestrator.tick().context("sync cycle failed")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&outcome).context("failed to serialize outcome")?
            );
            return Ok(());
        }

        let mark = match outcome {
            CycleOutcome::Rebuilt { .. } | CycleOutcome::Synchronized { .. } => "✓".green(),
            CycleOutcome::Skipped => "-".yellow(),
            _ => "=".bright_black(),
        };
        println!("{mark} {outcome}");
        Ok(())
    }
}
