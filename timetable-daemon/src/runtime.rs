use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;

use timetable_core::{config, Settings};
use timetable_source::{FileSource, ScheduleSource};
use timetable_store::file_digest;
use timetable_sync::{CycleOutcome, SyncOrchestrator};

use crate::error::{io_err, DaemonError};
use crate::paths::{logs_dir, socket_path, DAEMON_LABEL};
use crate::protocol::{Command, DaemonRequest, DaemonResponse};

/// How long shutdown waits for an in-flight cycle to reach a route boundary.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Everything the daemon tasks share.
pub struct Daemon<S> {
    home: PathBuf,
    orchestrator: Arc<SyncOrchestrator<S>>,
    interval: Duration,
    started_at_unix: u64,
}

impl<S: ScheduleSource + 'static> Daemon<S> {
    pub fn new(home: PathBuf, orchestrator: Arc<SyncOrchestrator<S>>, interval: Duration) -> Self {
        Self {
            home,
            orchestrator,
            interval,
            started_at_unix: unix_seconds_now(),
        }
    }

    pub fn orchestrator(&self) -> &Arc<SyncOrchestrator<S>> {
        &self.orchestrator
    }
}

/// Load settings under `home`, start the runtime and block until it exits.
pub fn start_blocking(home: &Path) -> Result<(), DaemonError> {
    let settings = config::load_at(home)?;
    settings.validate()?;
    crate::logging::init_tracing(home);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    let result = runtime.block_on(run(home.to_path_buf(), settings));
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

/// Run the daemon against the listing file named in `settings`.
pub async fn run(home: PathBuf, settings: Settings) -> Result<(), DaemonError> {
    let source = settings.source.clone().ok_or(DaemonError::NoSource)?;
    let data_dir = settings.data_dir_at(&home);
    let orchestrator = Arc::new(SyncOrchestrator::for_data_dir(
        &data_dir,
        FileSource::new(source),
    ));
    let daemon = Daemon::new(
        home,
        orchestrator,
        Duration::from_secs(settings.interval_secs),
    );
    serve(Arc::new(daemon)).await
}

/// Run ticker, socket server, log rotation and signal handler until one of
/// them asks for shutdown.
pub async fn serve<S: ScheduleSource + 'static>(daemon: Arc<Daemon<S>>) -> Result<(), DaemonError> {
    ensure_runtime_dirs(&daemon.home)?;
    tracing::info!(
        data_dir = %daemon.orchestrator.store().data_dir().display(),
        interval_secs = daemon.interval.as_secs(),
        "daemon starting"
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let ticker_handle = {
        let shutdown = shutdown_tx.clone();
        let daemon = daemon.clone();
        tokio::spawn(async move {
            let result = ticker_task(daemon, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let daemon = daemon.clone();
        tokio::spawn(async move {
            let result = socket_server_task(daemon, shutdown.clone(), shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let rotation_handle = {
        let shutdown = shutdown_tx.clone();
        let home = daemon.home.clone();
        tokio::spawn(async move {
            let result = log_rotation_task(home, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    // Whatever triggers shutdown, the cycle in flight (timer or manual) is
    // cancelled here.
    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        let daemon = daemon.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            let result = tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => match signal {
                    Ok(()) => {
                        tracing::info!("received ctrl-c, shutting down daemon");
                        let _ = shutdown.send(());
                        Ok(())
                    }
                    Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                },
            };
            if daemon.orchestrator.cancel() {
                tracing::info!("cancelled in-flight sync cycle");
            }
            result
        })
    };

    let (ticker_result, socket_result, rotation_result, signal_result) =
        tokio::join!(ticker_handle, socket_handle, rotation_handle, signal_handle);

    handle_join("ticker", ticker_result)?;
    handle_join("socket_server", socket_result)?;
    handle_join("log_rotation", rotation_result)?;
    handle_join("signal_handler", signal_result)?;
    tracing::info!("daemon stopped");
    Ok(())
}

/// Fires immediately, then every interval. A shutdown during a cycle cancels
/// it and waits for the working copy to be discarded.
async fn ticker_task<S: ScheduleSource + 'static>(
    daemon: Arc<Daemon<S>>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut interval = tokio::time::interval(daemon.interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => {
                let cycle = run_cycle(daemon.orchestrator.clone());
                tokio::pin!(cycle);
                tokio::select! {
                    result = &mut cycle => {
                        if let Err(err) = result {
                            tracing::warn!(error = %err, "timer cycle failed");
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        daemon.orchestrator.cancel();
                        let _ = cycle.await;
                        break;
                    }
                }
            }
        }
    }
    Ok(())
}

/// One orchestrator tick on the blocking pool.
async fn run_cycle<S: ScheduleSource + 'static>(
    orchestrator: Arc<SyncOrchestrator<S>>,
) -> Result<CycleOutcome, String> {
    match tokio::task::spawn_blocking(move || orchestrator.tick()).await {
        Ok(result) => result.map_err(|err| err.to_string()),
        Err(err) => Err(format!("cycle task join error: {err}")),
    }
}

async fn socket_server_task<S: ScheduleSource + 'static>(
    daemon: Arc<Daemon<S>>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let socket = socket_path(&daemon.home);
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let daemon = daemon.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(stream, daemon, shutdown_tx).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client<S: ScheduleSource + 'static>(
    stream: UnixStream,
    daemon: Arc<Daemon<S>>,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request = match serde_json::from_str::<DaemonRequest>(&line) {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &DaemonResponse::error(format!("invalid request: {err}")),
                )
                .await?;
                continue;
            }
        };

        let response = match request.cmd {
            Command::Status => DaemonResponse::ok(build_status_payload(daemon.clone()).await),
            Command::Sync => match run_cycle(daemon.orchestrator.clone()).await {
                Ok(CycleOutcome::Skipped) => DaemonResponse::error("a sync cycle is already running"),
                Ok(outcome) => DaemonResponse::ok(json!(outcome)),
                Err(err) => DaemonResponse::error(err),
            },
            Command::Stop => {
                let _ = shutdown_tx.send(());
                DaemonResponse::ok(json!({ "stopping": true }))
            }
        };

        write_response(&mut writer, &response).await?;
        if request.cmd == Command::Stop {
            break;
        }
    }

    Ok(())
}

async fn build_status_payload<S: ScheduleSource + 'static>(daemon: Arc<Daemon<S>>) -> Value {
    let orchestrator = daemon.orchestrator.clone();
    // Marker and digest read files; keep them off the reactor.
    let (marker, digest) = tokio::task::spawn_blocking(move || {
        let marker = orchestrator.marker_file().load().ok().flatten();
        let digest = file_digest(orchestrator.store().live_path()).ok();
        (marker, digest)
    })
    .await
    .unwrap_or((None, None));

    let store = daemon.orchestrator.store();
    json!({
        "running": true,
        "label": DAEMON_LABEL,
        "started_at_unix": daemon.started_at_unix,
        "uptime_secs": unix_seconds_now().saturating_sub(daemon.started_at_unix),
        "interval_secs": daemon.interval.as_secs(),
        "state": daemon.orchestrator.state(),
        "last_report": daemon.orchestrator.last_report(),
        "marker": marker,
        "snapshot": {
            "present": digest.is_some(),
            "path": store.live_path().display().to_string(),
            "digest": digest,
        },
        "socket": socket_path(&daemon.home).display().to_string(),
    })
}

async fn log_rotation_task(
    home: PathBuf,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut interval = tokio::time::interval(Duration::from_secs(5));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    interval.tick().await;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => {
                let home = home.clone();
                tokio::task::spawn_blocking(move || crate::log_rotation::rotate_logs(&home))
                    .await
                    .ok();
            }
        }
    }
    Ok(())
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

fn ensure_runtime_dirs(home: &Path) -> Result<(), DaemonError> {
    let logs = logs_dir(home);
    fs::create_dir_all(&logs).map_err(|e| io_err(&logs, e))
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &DaemonResponse,
) -> Result<(), DaemonError> {
    let mut payload = serde_json::to_vec(response)?;
    payload.push(b'\n');
    writer
        .write_all(&payload)
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Barrier, Mutex, RwLock};
    use tempfile::TempDir;
    use timetable_core::{Marker, RouteNumber, TransportKind};
    use timetable_source::{
        CategoryListing, ChangedRoutes, MemorySource, PathVariant, RoutePaths, SourceError,
        StopListing, TimeSlotRow,
    };
    use timetable_sync::CycleState;

    use crate::protocol::{request_status, request_stop, request_sync};

    fn listing() -> MemorySource {
        MemorySource::new("2024-01-01")
            .with_category(TransportKind::Bus, "Автобус")
            .with_route(
                TransportKind::Bus,
                RouteNumber(12),
                RoutePaths::new(
                    Some(PathVariant::new("A - B", vec![StopListing::new("A", "/a")])),
                    None,
                ),
            )
            .with_timetable("/a", vec![TimeSlotRow::new("будни", "6", "05")])
    }

    fn daemon(home: &TempDir, interval: Duration) -> Arc<Daemon<MemorySource>> {
        let data_dir = home.path().join("data");
        let orchestrator = Arc::new(SyncOrchestrator::for_data_dir(&data_dir, listing()));
        Arc::new(Daemon::new(home.path().to_path_buf(), orchestrator, interval))
    }

    async fn wait_for(mut check: impl FnMut() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("condition not reached in time");
    }

    /// Listing whose change announcement can be held open by the test.
    struct HeldSource {
        inner: RwLock<MemorySource>,
        hold: Mutex<Option<Arc<(Barrier, Barrier)>>>,
    }

    impl HeldSource {
        fn new(inner: MemorySource) -> Arc<Self> {
            Arc::new(Self {
                inner: RwLock::new(inner),
                hold: Mutex::new(None),
            })
        }

        fn publish(&self, marker: &str, number: RouteNumber) {
            let mut inner = self.inner.write().unwrap();
            inner.set_marker(Some(Marker::from(marker)));
            inner.set_changes(Some(ChangedRoutes::new(TransportKind::Bus, [number])));
        }

        /// The next change-list fetch waits on the first barrier, then the second.
        fn hold(&self) -> Arc<(Barrier, Barrier)> {
            let gate = Arc::new((Barrier::new(2), Barrier::new(2)));
            *self.hold.lock().unwrap() = Some(gate.clone());
            gate
        }
    }

    impl ScheduleSource for HeldSource {
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
            self.inner.read().unwrap().list_route_paths(kind, number)
        }

        fn list_time_slots(&self, link: &str) -> Result<Vec<TimeSlotRow>, SourceError> {
            self.inner.read().unwrap().list_time_slots(link)
        }

        fn fetch_latest_marker(&self) -> Result<Marker, SourceError> {
            self.inner.read().unwrap().fetch_latest_marker()
        }

        fn fetch_changed_routes(&self) -> Result<Option<ChangedRoutes>, SourceError> {
            let gate = self.hold.lock().unwrap().take();
            if let Some(gate) = gate {
                gate.0.wait();
                gate.1.wait();
            }
            self.inner.read().unwrap().fetch_changed_routes()
        }
    }

    #[tokio::test]
    async fn status_payload_before_first_cycle() {
        let home = TempDir::new().unwrap();
        let daemon = daemon(&home, Duration::from_secs(3600));

        let payload = build_status_payload(daemon).await;
        assert_eq!(payload["running"], json!(true));
        assert_eq!(payload["state"], json!("idle"));
        assert_eq!(payload["snapshot"]["present"], json!(false));
        assert_eq!(payload["marker"], Value::Null);
        assert_eq!(payload["last_report"], Value::Null);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn ticker_runs_first_cycle_immediately_then_on_interval() {
        let home = TempDir::new().unwrap();
        let daemon = daemon(&home, Duration::from_millis(100));
        let (shutdown_tx, _) = broadcast::channel::<()>(4);
        let handle = tokio::spawn(ticker_task(daemon.clone(), shutdown_tx.subscribe()));

        let orchestrator = daemon.orchestrator().clone();
        wait_for(|| orchestrator.last_report().is_some_and(|r| r.id >= 3)).await;

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
        let report = orchestrator.last_report().unwrap();
        assert!(report.succeeded());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn socket_status_sync_and_stop() {
        let home = TempDir::new().unwrap();
        let daemon = daemon(&home, Duration::from_secs(3600));
        let server = tokio::spawn(serve(daemon.clone()));

        let orchestrator = daemon.orchestrator().clone();
        wait_for(|| {
            orchestrator.last_report().is_some() && orchestrator.state() == CycleState::Idle
        })
        .await;

        let home_path = home.path().to_path_buf();
        let status = tokio::task::spawn_blocking(move || request_status(&home_path))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status["snapshot"]["present"], json!(true));
        assert_eq!(status["marker"], json!("2024-01-01"));

        let home_path = home.path().to_path_buf();
        let outcome = tokio::task::spawn_blocking(move || request_sync(&home_path))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome["outcome"], json!("up_to_date"));

        let home_path = home.path().to_path_buf();
        tokio::task::spawn_blocking(move || request_stop(&home_path))
            .await
            .unwrap()
            .unwrap();

        server.await.unwrap().unwrap();
        assert!(!socket_path(home.path()).exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stop_cancels_a_manual_sync_in_flight() {
        let home = TempDir::new().unwrap();
        let source = HeldSource::new(listing());
        let orchestrator = Arc::new(SyncOrchestrator::for_data_dir(
            &home.path().join("data"),
            source.clone(),
        ));
        let daemon = Arc::new(Daemon::new(
            home.path().to_path_buf(),
            orchestrator.clone(),
            Duration::from_secs(3600),
        ));
        let server = tokio::spawn(serve(daemon));

        wait_for(|| {
            orchestrator.last_report().is_some() && orchestrator.state() == CycleState::Idle
        })
        .await;
        let digest = file_digest(orchestrator.store().live_path()).unwrap();

        source.publish("2024-02-10", RouteNumber(12));
        let gate = source.hold();

        let home_path = home.path().to_path_buf();
        let sync = tokio::task::spawn_blocking(move || request_sync(&home_path));
        let entered = gate.clone();
        tokio::task::spawn_blocking(move || {
            entered.0.wait();
        })
        .await
        .unwrap();

        let home_path = home.path().to_path_buf();
        tokio::task::spawn_blocking(move || request_stop(&home_path))
            .await
            .unwrap()
            .unwrap();
        server.await.unwrap().unwrap();

        // Shutdown has finished; only now may the manual cycle continue.
        let release = gate.clone();
        tokio::task::spawn_blocking(move || {
            release.1.wait();
        })
        .await
        .unwrap();

        let err = sync.await.unwrap().expect_err("cancelled sync answers an error");
        assert!(err.to_string().contains("cancelled"), "{err}");

        let report = orchestrator.last_report().unwrap();
        assert_eq!(report.id, 2);
        assert!(report.error.unwrap().contains("cancelled"));
        assert_eq!(file_digest(orchestrator.store().live_path()).unwrap(), digest);
        assert_eq!(
            orchestrator.marker_file().load().unwrap(),
            Some(Marker::from("2024-01-01"))
        );
        assert!(!orchestrator.store().staging_path().exists());
    }
}
