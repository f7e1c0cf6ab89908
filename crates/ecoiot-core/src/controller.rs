// ── Controller abstraction ──
//
// Lifecycle for one gateway: initial refresh with a readiness check,
// scheduled polling, command routing, and snapshot streaming.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ecoiot_api::{DeviceApi, DeviceClient, TransportConfig};

use crate::command::{Command, CommandEnvelope, CommandRequest, CommandResult};
use crate::config::CoordinatorConfig;
use crate::coordinator::PollCoordinator;
use crate::dispatcher::CommandDispatcher;
use crate::error::CoreError;
use crate::model::{DeviceDescriptor, DeviceReading, Snapshot};
use crate::report::{RefreshPhase, RefreshReport};
use crate::store::StateStore;
use crate::stream::SnapshotStream;

const COMMAND_CHANNEL_SIZE: usize = 64;

// ── ConnectionState ──────────────────────────────────────────────

/// Readiness observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
    /// The initial refresh failed; nothing was started.
    NotReady { reason: String },
}

// ── Controller ───────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. Owns the poll coordinator,
/// the command dispatcher and the background tasks that drive them.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: CoordinatorConfig,
    client: Arc<dyn DeviceApi>,
    coordinator: Arc<PollCoordinator>,
    connection_state: watch::Sender<ConnectionState>,
    session: Mutex<Option<Session>>,
}

/// Background work owned by one successful [`Controller::connect`].
///
/// Torn down whole by `disconnect()`; the next `connect()` starts a new one.
struct Session {
    command_tx: mpsc::Sender<CommandEnvelope>,
    dispatcher: Arc<CommandDispatcher>,
    cancel: CancellationToken,
    task_handles: Vec<JoinHandle<()>>,
}

impl Controller {
    /// Create a controller talking HTTP to `config.host`. Does NOT poll --
    /// call [`connect()`](Self::connect) to run the initial refresh and
    /// start background tasks.
    pub fn new(config: CoordinatorConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let client = DeviceClient::new(&config.host, &TransportConfig::default())?;
        Self::with_client(config, Arc::new(client))
    }

    /// Create a controller over any [`DeviceApi`] implementation.
    pub fn with_client(
        config: CoordinatorConfig,
        client: Arc<dyn DeviceApi>,
    ) -> Result<Self, CoreError> {
        config.validate()?;

        let devices: Arc<[DeviceDescriptor]> = config.devices.iter().cloned().collect();
        let store = Arc::new(StateStore::new());
        let coordinator = Arc::new(PollCoordinator::new(
            Arc::clone(&client),
            devices,
            store,
            config.poll_deadline,
        ));
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);

        Ok(Self {
            inner: Arc::new(ControllerInner {
                config,
                client,
                coordinator,
                connection_state,
                session: Mutex::new(None),
            }),
        })
    }

    /// Access the controller configuration.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    /// Access the underlying StateStore.
    pub fn store(&self) -> &Arc<StateStore> {
        self.inner.coordinator.store()
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Run the initial refresh and start background tasks.
    ///
    /// Fails with [`CoreError::NotReady`] if the first cycle hit its
    /// deadline or no device could be reached at all; nothing is started
    /// in that case and the host may retry later. Connecting again after
    /// [`disconnect()`](Self::disconnect) starts fresh background tasks.
    pub async fn connect(&self) -> Result<(), CoreError> {
        let mut session = self.inner.session.lock().await;
        if session.is_some() {
            debug!("already connected");
            return Ok(());
        }

        self.inner
            .connection_state
            .send_replace(ConnectionState::Connecting);

        let config = &self.inner.config;
        let report = match self.inner.coordinator.refresh().await {
            Ok(report) => report,
            Err(e) => {
                self.inner
                    .connection_state
                    .send_replace(ConnectionState::NotReady {
                        reason: e.to_string(),
                    });
                return Err(e);
            }
        };

        if let Some(reason) = startup_failure(&report) {
            warn!(host = %config.host, %reason, "initial refresh failed");
            self.inner
                .connection_state
                .send_replace(ConnectionState::NotReady {
                    reason: reason.clone(),
                });
            return Err(CoreError::NotReady {
                host: config.host.clone(),
                reason,
            });
        }

        let cancel = CancellationToken::new();
        let dispatcher = Arc::new(CommandDispatcher::new(
            Arc::clone(&self.inner.client),
            Arc::clone(&self.inner.coordinator),
            config.command_timeout,
            config.settle_delay,
        ));
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);

        let mut task_handles = vec![tokio::spawn(command_processor_task(
            Arc::clone(&dispatcher),
            Arc::clone(&self.inner.coordinator),
            command_rx,
            cancel.clone(),
        ))];

        if !config.poll_interval.is_zero() {
            task_handles.push(tokio::spawn(refresh_task(
                Arc::clone(&self.inner.coordinator),
                config.poll_interval,
                cancel.clone(),
            )));
        }

        *session = Some(Session {
            command_tx,
            dispatcher,
            cancel,
            task_handles,
        });
        self.inner
            .connection_state
            .send_replace(ConnectionState::Ready);
        info!(
            host = %config.host,
            devices = config.devices.len(),
            readings = report.readings.len(),
            "coordinator ready"
        );
        Ok(())
    }

    /// Stop background tasks and drop pending follow-up refreshes.
    pub async fn disconnect(&self) {
        let session = self.inner.session.lock().await.take();
        if let Some(session) = session {
            session.cancel.cancel();
            for handle in session.task_handles {
                let _ = handle.await;
            }
            session.dispatcher.shutdown(true).await;
        }

        self.inner
            .connection_state
            .send_replace(ConnectionState::Disconnected);
        debug!("disconnected");
    }

    /// Wait until the initial refresh has settled one way or the other.
    pub async fn wait_ready(&self) -> Result<(), CoreError> {
        let mut rx = self.inner.connection_state.subscribe();
        let state = rx
            .wait_for(|s| matches!(s, ConnectionState::Ready | ConnectionState::NotReady { .. }))
            .await
            .map_err(|_| CoreError::Disconnected)?
            .clone();
        match state {
            ConnectionState::NotReady { reason } => Err(CoreError::NotReady {
                host: self.inner.config.host.clone(),
                reason,
            }),
            _ => Ok(()),
        }
    }

    // ── Command execution ────────────────────────────────────────

    /// Execute a command through the command channel.
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        if *self.inner.connection_state.borrow() != ConnectionState::Ready {
            return Err(CoreError::Disconnected);
        }
        let command_tx = self
            .inner
            .session
            .lock()
            .await
            .as_ref()
            .map(|s| s.command_tx.clone())
            .ok_or(CoreError::Disconnected)?;

        let (tx, rx) = tokio::sync::oneshot::channel();

        command_tx
            .send(CommandEnvelope {
                command: cmd,
                response_tx: tx,
            })
            .await
            .map_err(|_| CoreError::Disconnected)?;

        rx.await.map_err(|_| CoreError::Disconnected)?
    }

    /// Switch one device on or off.
    pub async fn set_device_state(&self, device_id: &str, on: bool) -> Result<(), CoreError> {
        let request = CommandRequest {
            device_id: device_id.to_owned(),
            on,
        };
        self.execute(Command::SetState(request)).await.map(|_| ())
    }

    /// Poll every device now, or join the cycle already in flight.
    pub async fn refresh(&self) -> Result<RefreshReport, CoreError> {
        match self.execute(Command::Refresh).await? {
            CommandResult::Refreshed(report) => Ok(report),
            CommandResult::Accepted => Err(CoreError::Disconnected),
        }
    }

    // ── One-shot convenience ─────────────────────────────────────

    /// One-shot: connect, run closure, disconnect.
    ///
    /// Scheduled polling is disabled; the closure sees the snapshot from
    /// the initial refresh.
    pub async fn oneshot<F, Fut, T>(config: CoordinatorConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Controller) -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let mut cfg = config;
        cfg.poll_interval = Duration::ZERO;

        let controller = Controller::new(cfg)?;
        controller.connect().await?;
        let result = f(controller.clone()).await;
        controller.disconnect().await;
        result
    }

    // ── State observation ────────────────────────────────────────

    /// Subscribe to connection state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    /// Subscribe to snapshot publications.
    pub fn subscribe(&self) -> SnapshotStream {
        self.store().subscribe()
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.store().read()
    }

    /// One device's reading from the current snapshot.
    pub fn device_reading(&self, device_id: &str) -> Option<Arc<DeviceReading>> {
        self.store().read_device(device_id)
    }

    /// Configured devices, in configuration order.
    pub fn devices(&self) -> &[DeviceDescriptor] {
        self.inner.coordinator.devices()
    }

    pub fn phase(&self) -> RefreshPhase {
        self.inner.coordinator.phase()
    }

    /// Report of the most recently completed poll cycle.
    pub fn last_report(&self) -> Option<RefreshReport> {
        self.inner.coordinator.last_report()
    }
}

/// Why the first cycle counts as a failed startup, if it does.
fn startup_failure(report: &RefreshReport) -> Option<String> {
    if let Some(err) = report.degraded() {
        return Some(err.to_string());
    }
    report.gateway_unreachable().then(|| {
        let first = report
            .failures
            .first()
            .map_or_else(String::new, |f| format!(": {}", f.message));
        format!(
            "no device answered ({} failed){first}",
            report.failures.len()
        )
    })
}

// ── Background tasks ─────────────────────────────────────────────

/// Scheduled refresh. Overlapping ticks join the cycle in flight.
async fn refresh_task(
    coordinator: Arc<PollCoordinator>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                match coordinator.refresh().await {
                    Ok(report) => {
                        if let Some(err) = report.degraded() {
                            warn!(error = %err, "scheduled refresh degraded");
                        }
                    }
                    Err(e) => warn!(error = %e, "scheduled refresh failed"),
                }
            }
        }
    }
}

/// Receive commands from the channel and run each on its own task, so a
/// slow device never holds up commands to the others.
async fn command_processor_task(
    dispatcher: Arc<CommandDispatcher>,
    coordinator: Arc<PollCoordinator>,
    mut rx: mpsc::Receiver<CommandEnvelope>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                let dispatcher = Arc::clone(&dispatcher);
                let coordinator = Arc::clone(&coordinator);
                tokio::spawn(async move {
                    let result = route_command(&dispatcher, &coordinator, envelope.command).await;
                    let _ = envelope.response_tx.send(result);
                });
            }
        }
    }
}

// ── Command routing ──────────────────────────────────────────────

async fn route_command(
    dispatcher: &CommandDispatcher,
    coordinator: &Arc<PollCoordinator>,
    cmd: Command,
) -> Result<CommandResult, CoreError> {
    match cmd {
        Command::SetState(CommandRequest { device_id, on }) => {
            dispatcher.set_state(&device_id, on).await?;
            Ok(CommandResult::Accepted)
        }
        Command::Refresh => {
            let report = coordinator.refresh().await?;
            Ok(CommandResult::Refreshed(report))
        }
    }
}
