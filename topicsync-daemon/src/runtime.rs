use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::time::{Instant, MissedTickBehavior};

use serde::Serialize;

use topicsync_core::{store, ConfigListing, ConfigLoadFailure, Settings};
use topicsync_sync::{ChannelReport, RunSummary, SyncEngine};

use crate::error::DaemonError;
use crate::paths::{socket_path, topicsync_root};
use crate::protocol::{ChannelStatus, DaemonRequest, DaemonStatus, Reply, RunRecord, StopAck};

/// Default trigger interval; one run per minute.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Runtime knobs supplied by the CLI.
#[derive(Debug, Clone, Copy)]
pub struct DaemonOptions {
    pub interval: Duration,
}

impl Default for DaemonOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SyncTarget {
    All,
    Channel(String),
}

impl SyncTarget {
    fn label(&self) -> String {
        match self {
            SyncTarget::All => "all".to_string(),
            SyncTarget::Channel(channel) => channel.clone(),
        }
    }
}

struct SyncJob {
    target: SyncTarget,
    source: &'static str,
    respond_to: oneshot::Sender<Result<RunRecord, DaemonError>>,
}

type LastRun = Arc<RwLock<Option<RunRecord>>>;

#[derive(Clone)]
struct SocketContext {
    home: PathBuf,
    last_run: LastRun,
    sync_tx: mpsc::Sender<SyncJob>,
    shutdown_tx: broadcast::Sender<()>,
    started_at_unix: u64,
    options: DaemonOptions,
    dry_run: bool,
}

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(
    home: &Path,
    settings: &Settings,
    options: DaemonOptions,
) -> Result<(), DaemonError> {
    init_tracing();
    let engine = SyncEngine::from_settings(settings)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| DaemonError::io("failed to start tokio runtime", e))?;
    runtime.block_on(run(home.to_path_buf(), engine, options))
}

/// Run the daemon runtime.
pub async fn run(home: PathBuf, engine: SyncEngine, options: DaemonOptions) -> Result<(), DaemonError> {
    ensure_runtime_dirs(&home)?;

    let last_run: LastRun = Arc::new(RwLock::new(None));
    let started_at_unix = unix_seconds_now();
    let dry_run = engine.is_dry_run();

    let (sync_tx, sync_rx) = mpsc::channel::<SyncJob>(64);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    tracing::info!(
        interval_secs = options.interval.as_secs(),
        dry_run,
        "topicsync daemon starting"
    );

    let ticker_handle = {
        let shutdown = shutdown_tx.clone();
        let sync_tx = sync_tx.clone();
        tokio::spawn(async move {
            let result = ticker_task(options.interval, sync_tx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let processor_handle = {
        let shutdown = shutdown_tx.clone();
        let home = home.clone();
        let last_run = last_run.clone();
        tokio::spawn(async move {
            let result =
                run_processor_task(home, engine, last_run, sync_rx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let ctx = SocketContext {
            home: home.clone(),
            last_run: last_run.clone(),
            sync_tx: sync_tx.clone(),
            shutdown_tx: shutdown.clone(),
            started_at_unix,
            options,
            dry_run,
        };
        tokio::spawn(async move {
            let result = socket_server_task(ctx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Task {
                            task: "signal_handler",
                            detail: err.to_string(),
                        }),
                    }
                }
            }
        })
    };

    let (ticker_result, processor_result, socket_result, signal_result) =
        tokio::join!(ticker_handle, processor_handle, socket_handle, signal_handle);

    handle_join("ticker", ticker_result)?;
    handle_join("run_processor", processor_result)?;
    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

/// Enqueue a full run on every tick. The first tick fires immediately.
///
/// A tick waits for its run to finish and missed ticks are skipped, so runs
/// never overlap.
async fn ticker_task(
    interval: Duration,
    sync_tx: mpsc::Sender<SyncJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = ticker.tick() => {
                match enqueue_run(&sync_tx, SyncTarget::All, "interval").await {
                    Ok(record) => {
                        tracing::info!(
                            applied = record.summary.applied,
                            dry_run = record.summary.dry_run,
                            unchanged = record.summary.unchanged,
                            failed = record.summary.failed,
                            duration_ms = record.duration_ms,
                            "scheduled run completed",
                        );
                    }
                    Err(DaemonError::QueueClosed(_)) => break,
                    Err(err) => {
                        tracing::error!(error = %err, "scheduled run failed");
                    }
                }
            }
        }
    }

    Ok(())
}

async fn run_processor_task(
    home: PathBuf,
    engine: SyncEngine,
    last_run: LastRun,
    mut sync_rx: mpsc::Receiver<SyncJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = sync_rx.recv() => {
                let Some(job) = maybe_job else { break };
                let outcome = execute_run(&home, &engine, &job.target, job.source).await;
                if let Ok(record) = &outcome {
                    *last_run.write().await = Some(record.clone());
                }
                let _ = job.respond_to.send(outcome);
            }
        }
    }

    Ok(())
}

/// Reload configs from the store and run the engine once over them.
///
/// Config files that fail to load are recorded as failed channels; the
/// remaining configs still run.
async fn execute_run(
    home: &Path,
    engine: &SyncEngine,
    target: &SyncTarget,
    source: &'static str,
) -> Result<RunRecord, DaemonError> {
    let started = Instant::now();
    let listing = load_configs(home.to_path_buf(), target.clone()).await?;
    for failure in &listing.failures {
        tracing::error!(
            channel = %failure.channel,
            error = %failure.error,
            "channel config failed to load",
        );
    }
    tracing::debug!(
        run_target = %target.label(),
        source,
        configs = listing.configs.len(),
        invalid = listing.failures.len(),
        "run starting",
    );

    let reports = engine.run_once(&listing.configs).await;
    Ok(build_run_record(
        target,
        source,
        engine.is_dry_run(),
        &reports,
        &listing.failures,
        started.elapsed(),
    ))
}

async fn load_configs(home: PathBuf, target: SyncTarget) -> Result<ConfigListing, DaemonError> {
    let mut listing = tokio::task::spawn_blocking(move || store::list_configs_at(&home))
        .await
        .map_err(|err| DaemonError::Task {
            task: "config_load",
            detail: err.to_string(),
        })??;

    if let SyncTarget::Channel(channel) = &target {
        if !listing.retain_channel(channel) {
            return Err(DaemonError::UnknownChannel(channel.clone()));
        }
    }
    Ok(listing)
}

fn build_run_record(
    target: &SyncTarget,
    source: &'static str,
    dry_run: bool,
    reports: &[ChannelReport],
    load_failures: &[ConfigLoadFailure],
    duration: Duration,
) -> RunRecord {
    let mut summary = RunSummary::from_reports(reports);
    summary.failed += load_failures.len();

    let ran = reports.iter().map(|report| ChannelStatus {
        channel: report.channel.0.clone(),
        status: report.status().to_string(),
        detail: report.detail(),
    });
    let unloadable = load_failures.iter().map(|failure| ChannelStatus {
        channel: failure.channel.0.clone(),
        status: "failed".to_string(),
        detail: failure.error.to_string(),
    });

    RunRecord {
        target: target.label(),
        source: source.to_string(),
        dry_run,
        finished_at_unix: unix_seconds_now(),
        duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        summary,
        channels: ran.chain(unloadable).collect(),
    }
}

async fn socket_server_task(
    ctx: SocketContext,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let socket = socket_path(&ctx.home);
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket)
        .map_err(|e| DaemonError::io(format!("failed to bind {}", socket.display()), e))?;
    set_socket_permissions(&socket)?;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted
                    .map_err(|e| DaemonError::io(format!("accept on {}", socket.display()), e))?;
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(stream, ctx).await {
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

async fn handle_socket_client<S>(stream: S, ctx: SocketContext) -> Result<(), DaemonError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| DaemonError::io("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request: DaemonRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                write_reply(&mut writer, &Reply::<()>::rejected(format!("invalid request: {err}")))
                    .await?;
                continue;
            }
        };

        match request {
            DaemonRequest::Status => {
                write_reply(&mut writer, &Reply::ok(status_snapshot(&ctx).await)).await?;
            }
            DaemonRequest::Sync { channel } => {
                let target = channel.map_or(SyncTarget::All, SyncTarget::Channel);
                match enqueue_run(&ctx.sync_tx, target, "socket").await {
                    Ok(record) => write_reply(&mut writer, &Reply::ok(record)).await?,
                    Err(err) => {
                        write_reply(&mut writer, &Reply::<()>::rejected(err.to_string())).await?
                    }
                }
            }
            DaemonRequest::Stop => {
                let _ = ctx.shutdown_tx.send(());
                write_reply(&mut writer, &Reply::ok(StopAck { stopping: true })).await?;
                break;
            }
        }
    }

    Ok(())
}

async fn status_snapshot(ctx: &SocketContext) -> DaemonStatus {
    DaemonStatus {
        running: true,
        started_at_unix: ctx.started_at_unix,
        interval_secs: ctx.options.interval.as_secs(),
        dry_run: ctx.dry_run,
        socket: socket_path(&ctx.home),
        channels_dir: store::channels_dir_at(&ctx.home),
        last_run: ctx.last_run.read().await.clone(),
    }
}

async fn enqueue_run(
    sync_tx: &mpsc::Sender<SyncJob>,
    target: SyncTarget,
    source: &'static str,
) -> Result<RunRecord, DaemonError> {
    let (tx, rx) = oneshot::channel();
    sync_tx
        .send(SyncJob {
            target,
            source,
            respond_to: tx,
        })
        .await
        .map_err(|_| DaemonError::QueueClosed("sync queue"))?;

    rx.await
        .map_err(|_| DaemonError::QueueClosed("sync response"))?
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::AlreadyRunning {
                socket: socket.to_path_buf(),
            });
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
        Err(err) => Err(DaemonError::io(format!("failed to remove {}", socket.display()), err)),
    }
}

fn ensure_runtime_dirs(home: &Path) -> Result<(), DaemonError> {
    let root = topicsync_root(home);
    if !root.exists() {
        fs::create_dir_all(&root)
            .map_err(|e| DaemonError::io(format!("failed to create {}", root.display()), e))?;
    }
    Ok(())
}

async fn write_reply<W, T>(writer: &mut W, reply: &Reply<T>) -> Result<(), DaemonError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_string(reply)?;
    line.push('\n');
    writer
        .write_all(line.as_bytes())
        .await
        .map_err(|e| DaemonError::io("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| DaemonError::io("daemon socket flush", e))
}

fn handle_join(
    task: &'static str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Task {
            task,
            detail: err.to_string(),
        }),
    }
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Selects JSON log lines when set to `json`.
pub const LOG_FORMAT_VAR: &str = "TOPICSYNC_LOG_FORMAT";

/// Install the process-wide `fmt` subscriber (`RUST_LOG`, default `info`).
///
/// Logs go to stderr so CLI output on stdout stays parseable.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    let json = std::env::var(LOG_FORMAT_VAR)
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .map_err(|e| DaemonError::io(format!("failed to restrict {}", path.display()), e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}
