//! Timetable: local snapshot of a public transit schedule.
//!
//! # Usage
//!
//! ```text
//! timetable init --source <file> [--interval <secs>] [--data-dir <dir>]
//! timetable sync [--json]
//! timetable status [--json]
//! timetable export <dest>
//! timetable daemon start|stop|status|sync|logs
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    daemon::DaemonCommand, export::ExportArgs, init::InitArgs, status::StatusArgs,
    sync::SyncArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "timetable",
    version,
    about = "Keep a local SQLite snapshot of a transit timetable in sync",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write settings: listing source, sync interval, data directory.
    Init(InitArgs),

    /// Run one sync cycle in the foreground.
    Sync(SyncArgs),

    /// Show the marker, snapshot digest and per-category counts.
    Status(StatusArgs),

    /// Copy the live snapshot file to a destination.
    Export(ExportArgs),

    /// Manage the background sync daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Sync(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Export(args) => args.run(),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}
