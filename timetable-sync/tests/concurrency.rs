mod common;

use std::sync::Arc;
use std::thread;

use tempfile::TempDir;
use timetable_core::Marker;
use timetable_sync::{CycleOutcome, CycleState, SyncOrchestrator};

use common::{initial_remote, publish_update, GatePoint, TestSource, OLD_MARKER};

#[test]
fn tick_during_a_cycle_is_skipped() {
    let dir = TempDir::new().unwrap();
    let source = TestSource::new(initial_remote());
    let orch = Arc::new(SyncOrchestrator::for_data_dir(dir.path(), source.clone()));

    let gate = source.arm(GatePoint::Marker);
    let running = {
        let orch = orch.clone();
        thread::spawn(move || orch.tick())
    };

    gate.entered.wait();
    assert_eq!(orch.state(), CycleState::CheckingMarker);
    assert_eq!(orch.tick().unwrap(), CycleOutcome::Skipped);
    gate.release.wait();

    let outcome = running.join().unwrap().expect("first cycle");
    assert!(matches!(outcome, CycleOutcome::Rebuilt { .. }));
    assert_eq!(orch.state(), CycleState::Idle);

    // The skipped tick did not overwrite the report of the real cycle.
    let report = orch.last_report().unwrap();
    assert!(matches!(report.outcome, Some(CycleOutcome::Rebuilt { .. })));
}

#[test]
fn cancelled_rebuild_is_discarded() {
    let dir = TempDir::new().unwrap();
    let source = TestSource::new(initial_remote());
    let orch = Arc::new(SyncOrchestrator::for_data_dir(dir.path(), source.clone()));

    let gate = source.arm(GatePoint::RoutePaths);
    let running = {
        let orch = orch.clone();
        thread::spawn(move || orch.tick())
    };

    gate.entered.wait();
    assert_eq!(orch.state(), CycleState::Rebuilding);
    assert!(orch.cancel());
    gate.release.wait();

    let err = running.join().unwrap().expect_err("cancelled");
    assert!(err.is_cancelled());
    assert!(!orch.store().is_present());
    assert!(!orch.store().staging_path().exists());
    assert_eq!(orch.marker_file().load().unwrap(), None);
    assert!(!orch.cancel());

    // A later cycle is not affected by the earlier cancellation.
    assert!(matches!(orch.tick().unwrap(), CycleOutcome::Rebuilt { .. }));
}

#[test]
fn cancelled_synchronization_keeps_old_snapshot() {
    let dir = TempDir::new().unwrap();
    let source = TestSource::new(initial_remote());
    let orch = Arc::new(SyncOrchestrator::for_data_dir(dir.path(), source.clone()));
    orch.tick().expect("rebuild");
    let before = orch.store().open().unwrap().digest().unwrap();

    source.edit(publish_update);
    let gate = source.arm(GatePoint::RoutePaths);
    let running = {
        let orch = orch.clone();
        thread::spawn(move || orch.tick())
    };

    gate.entered.wait();
    assert_eq!(orch.state(), CycleState::Synchronizing);
    orch.cancel();
    gate.release.wait();

    let err = running.join().unwrap().expect_err("cancelled");
    assert!(err.is_cancelled());
    assert_eq!(orch.store().open().unwrap().digest().unwrap(), before);
    assert_eq!(
        orch.marker_file().load().unwrap(),
        Some(Marker::from(OLD_MARKER))
    );
}

#[test]
fn readers_see_whole_snapshots_while_cycles_commit() {
    let dir = TempDir::new().unwrap();
    let source = TestSource::new(initial_remote());
    let orch = Arc::new(SyncOrchestrator::for_data_dir(dir.path(), source.clone()));
    orch.tick().expect("rebuild");

    let reader = {
        let store = orch.store().clone();
        thread::spawn(move || {
            for _ in 0..200 {
                let dump = store.open().unwrap().dump().unwrap();
                // 4 routes in every committed state.
                assert_eq!(dump.routes.len(), 4);
                for route in &dump.routes {
                    let editions: Vec<_> = route
                        .stations
                        .iter()
                        .map(|s| s.station.name.split(' ').next().unwrap_or("").to_string())
                        .collect();
                    assert!(editions.windows(2).all(|w| w[0] == w[1]), "mixed route content");
                }
            }
        })
    };

    source.edit(publish_update);
    orch.tick().expect("sync");
    reader.join().unwrap();
}
