#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier, Mutex, RwLock};

use timetable_core::{DayClass, Marker, RouteNumber, TransportKind};
use timetable_source::{
    CategoryListing, ChangedRoutes, MemorySource, PathVariant, RoutePaths, ScheduleSource,
    SourceError, StopListing, TimeSlotRow,
};
use timetable_store::RouteDump;

pub const OLD_MARKER: &str = "2024-01-01";
pub const NEW_MARKER: &str = "2024-02-10";

/// Where a [`Gate`] stops the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePoint {
    Marker,
    RoutePaths,
}

/// Two-step rendezvous: the cycle waits on `entered`, then on `release`.
pub struct Gate {
    point: GatePoint,
    pub entered: Barrier,
    pub release: Barrier,
}

/// A [`MemorySource`] that tests can mutate, break and pause.
pub struct TestSource {
    inner: RwLock<MemorySource>,
    fail_paths_for: Mutex<Option<RouteNumber>>,
    fail_changes: AtomicBool,
    gate: Mutex<Option<Arc<Gate>>>,
}

impl TestSource {
    pub fn new(inner: MemorySource) -> Arc<Self> {
        Arc::new(Self {
            inner: RwLock::new(inner),
            fail_paths_for: Mutex::new(None),
            fail_changes: AtomicBool::new(false),
            gate: Mutex::new(None),
        })
    }

    pub fn edit(&self, f: impl FnOnce(&mut MemorySource)) {
        f(&mut self.inner.write().unwrap());
    }

    pub fn fail_paths_for(&self, number: Option<RouteNumber>) {
        *self.fail_paths_for.lock().unwrap() = number;
    }

    pub fn fail_changes(&self, fail: bool) {
        self.fail_changes.store(fail, Ordering::SeqCst);
    }

    /// Pause the next call at `point` until the test releases it.
    pub fn arm(&self, point: GatePoint) -> Arc<Gate> {
        let gate = Arc::new(Gate {
            point,
            entered: Barrier::new(2),
            release: Barrier::new(2),
        });
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    fn pass(&self, point: GatePoint) {
        let gate = {
            let mut slot = self.gate.lock().unwrap();
            match slot.as_ref() {
                Some(g) if g.point == point => slot.take(),
                _ => None,
            }
        };
        if let Some(gate) = gate {
            gate.entered.wait();
            gate.release.wait();
        }
    }
}

impl ScheduleSource for TestSource {
    fn list_categories(&self) -> Result<Vec<CategoryListing>, SourceError> {
        self.inner.read().unwrap().list_categories()
    }

    fn list_route_numbers(&self, kind: TransportKind) -> Result<Vec<RouteNumber>, SourceError> {
        self.inner.read().unwrap().list_route_numbers(kind)
    }

    fn list_route_paths(
        &self,
        kind: TransportKind,
        number: RouteNumber,
    ) -> Result<RoutePaths, SourceError> {
        self.pass(GatePoint::RoutePaths);
        if *self.fail_paths_for.lock().unwrap() == Some(number) {
            return Err(SourceError::fetch(format!("{kind} {number}"), "connection reset"));
        }
        self.inner.read().unwrap().list_route_paths(kind, number)
    }

    fn list_time_slots(&self, link: &str) -> Result<Vec<TimeSlotRow>, SourceError> {
        self.inner.read().unwrap().list_time_slots(link)
    }

    fn fetch_latest_marker(&self) -> Result<Marker, SourceError> {
        self.pass(GatePoint::Marker);
        self.inner.read().unwrap().fetch_latest_marker()
    }

    fn fetch_changed_routes(&self) -> Result<Option<ChangedRoutes>, SourceError> {
        if self.fail_changes.load(Ordering::SeqCst) {
            return Err(SourceError::fetch("change announcement", "timed out"));
        }
        self.inner.read().unwrap().fetch_changed_routes()
    }
}

fn route_paths(kind: &str, number: u32, edition: &str) -> RoutePaths {
    let stop = |dir: &str, i: usize| {
        StopListing::new(
            format!("{edition} stop {dir}{i}"),
            format!("/{kind}/{number}/{dir}/{i}/{edition}"),
        )
    };
    RoutePaths::new(
        Some(PathVariant::new(
            format!("{number} outbound"),
            vec![stop("out", 0), stop("out", 1)],
        )),
        Some(PathVariant::new(
            format!("{number} inbound"),
            vec![stop("in", 0), stop("in", 1)],
        )),
    )
}

fn add_route(
    source: &mut MemorySource,
    kind: TransportKind,
    number: u32,
    edition: &str,
) {
    let paths = route_paths(kind.as_str(), number, edition);
    for variant in paths.variants() {
        for (i, stop) in variant.stops.iter().enumerate() {
            source.set_timetable(
                stop.link.clone(),
                vec![
                    TimeSlotRow::new("будни", format!("{}", 5 + i), format!("{edition}-05 35")),
                    TimeSlotRow::new("выходные", format!("{}", 7 + i), "10"),
                    TimeSlotRow::new("праздничные", "8", "00"),
                ],
            );
        }
    }
    source.replace_route(kind, RouteNumber(number), paths);
}

/// Remote state as of [`OLD_MARKER`]: buses 12, 45, 70 and trolleybus 1.
pub fn initial_remote() -> MemorySource {
    let mut source = MemorySource::new(OLD_MARKER)
        .with_category(TransportKind::Bus, "Автобус")
        .with_category(TransportKind::Trolleybus, "Троллейбус");
    for n in [12, 45, 70] {
        add_route(&mut source, TransportKind::Bus, n, "v1");
    }
    add_route(&mut source, TransportKind::Trolleybus, 1, "v1");
    source
}

/// Publish [`NEW_MARKER`]: buses 12 and 45 get new stops and times.
pub fn publish_update(source: &mut MemorySource) {
    add_route(source, TransportKind::Bus, 12, "v2");
    add_route(source, TransportKind::Bus, 45, "v2");
    source.set_marker(Some(Marker::from(NEW_MARKER)));
    source.set_changes(Some(ChangedRoutes::new(
        TransportKind::Bus,
        [RouteNumber(12), RouteNumber(45)],
    )));
}

/// Route content without row ids.
pub type StationContent = (String, String, String, Vec<(DayClass, String, String)>);

pub fn content(route: &RouteDump) -> Vec<StationContent> {
    route
        .stations
        .iter()
        .map(|s| {
            (
                s.station.name.clone(),
                s.station.path.clone(),
                s.station.link.clone(),
                s.time_slots
                    .iter()
                    .map(|t| (t.day, t.hour.clone(), t.minutes.clone()))
                    .collect(),
            )
        })
        .collect()
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
