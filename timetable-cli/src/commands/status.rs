//! `timetable status`: what the served snapshot currently holds.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use timetable_core::{paths, Marker};
use timetable_store::{CategoryCounts, MarkerFile, ScheduleStore, StoreError};

/// Arguments for `timetable status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    data_dir: PathBuf,
    source: Option<PathBuf>,
    interval_secs: u64,
    marker: Option<Marker>,
    snapshot: SnapshotStatus,
}

#[derive(Debug, Serialize)]
struct SnapshotStatus {
    present: bool,
    path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    digest: Option<String>,
    categories: Vec<CategoryCounts>,
}

#[derive(Tabled)]
struct CountsRow {
    #[tabled(rename = "kind")]
    kind: String,
    #[tabled(rename = "category")]
    name: String,
    #[tabled(rename = "routes")]
    routes: u64,
    #[tabled(rename = "stations")]
    stations: u64,
    #[tabled(rename = "time slots")]
    time_slots: u64,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let (home, settings) = super::load_settings()?;
        let data_dir = settings.data_dir_at(&home);
        let store = ScheduleStore::new(&data_dir);
        let marker = MarkerFile::new(paths::marker_path(&data_dir))
            .load()
            .context("failed to read marker file")?;

        let snapshot = match store.open() {
            Ok(snapshot) => SnapshotStatus {
                present: true,
                path: store.live_path().to_path_buf(),
                digest: Some(snapshot.digest().context("failed to hash snapshot")?),
                categories: snapshot.counts().context("failed to count snapshot rows")?,
            },
            Err(StoreError::Absent { path }) => SnapshotStatus {
                present: false,
                path,
                digest: None,
                categories: Vec::new(),
            },
            Err(err) => return Err(err).context("failed to open snapshot"),
        };

        let report = StatusReport {
            data_dir,
            source: settings.source,
            interval_secs: settings.interval_secs,
            marker,
            snapshot,
        };

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize status JSON")?
            );
            return Ok(());
        }
        print_report(report);
        Ok(())
    }
}

fn print_report(report: StatusReport) {
    println!(
        "Timetable v{} | data: {}",
        env!("CARGO_PKG_VERSION"),
        report.data_dir.display()
    );
    match &report.source {
        Some(source) => println!("Source: {}", source.display()),
        None => println!("Source: {}", "not configured".yellow()),
    }
    match &report.marker {
        Some(marker) => println!("Marker: {}", marker.as_str().bold()),
        None => println!("Marker: {}", "none".bright_black()),
    }

    if !report.snapshot.present {
        println!("Snapshot: {}", "absent".red());
        println!("Run 'timetable sync' to build one.");
        return;
    }
    println!("Snapshot: {}", report.snapshot.path.display());
    if let Some(digest) = &report.snapshot.digest {
        println!("SHA-256: {digest}");
    }

    let rows: Vec<CountsRow> = report
        .snapshot
        .categories
        .into_iter()
        .map(|c| CountsRow {
            kind: c.kind.to_string(),
            name: c.name,
            routes: c.routes,
            stations: c.stations,
            time_slots: c.time_slots,
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}
