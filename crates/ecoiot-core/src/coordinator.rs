// ── Poll coordinator ──
//
// Runs refresh cycles: every configured device is polled concurrently
// under one deadline, the answers are aggregated into a fresh snapshot,
// and the snapshot is published to the store in a single swap. At most one
// cycle runs at a time; concurrent callers join the cycle in flight.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use ecoiot_api::{CommandName, DeviceApi, DeviceDescriptor, Params, Reply};

use crate::error::CoreError;
use crate::model::{DeviceReading, Snapshot};
use crate::report::{DeviceFailure, RefreshPhase, RefreshReport};
use crate::store::StateStore;

type SharedRefresh = Shared<BoxFuture<'static, Option<RefreshReport>>>;

/// Drives poll cycles against one gateway and publishes their snapshots.
pub struct PollCoordinator {
    client: Arc<dyn DeviceApi>,
    devices: Arc<[DeviceDescriptor]>,
    store: Arc<StateStore>,
    poll_deadline: Duration,
    last_cycle: AtomicU64,
    in_flight: Mutex<Option<SharedRefresh>>,
    phase: watch::Sender<RefreshPhase>,
    last_report: watch::Sender<Option<RefreshReport>>,
}

impl PollCoordinator {
    pub fn new(
        client: Arc<dyn DeviceApi>,
        devices: Arc<[DeviceDescriptor]>,
        store: Arc<StateStore>,
        poll_deadline: Duration,
    ) -> Self {
        let (phase, _) = watch::channel(RefreshPhase::Idle);
        let (last_report, _) = watch::channel(None);
        Self {
            client,
            devices,
            store,
            poll_deadline,
            last_cycle: AtomicU64::new(0),
            in_flight: Mutex::new(None),
            phase,
            last_report,
        }
    }

    /// Run a refresh cycle, or join the one already in flight.
    ///
    /// The cycle itself runs on its own task, so dropping this future does
    /// not abandon a cycle other callers may be waiting on.
    pub async fn refresh(self: &Arc<Self>) -> Result<RefreshReport, CoreError> {
        let pending = {
            let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(pending) = slot.as_ref() {
                debug!("refresh already in flight, joining it");
                pending.clone()
            } else {
                let this = Arc::clone(self);
                let handle = tokio::spawn(async move {
                    let _clear = InFlightGuard(&this.in_flight);
                    this.run_cycle().await
                });
                let pending = async move { handle.await.ok() }.boxed().shared();
                *slot = Some(pending.clone());
                pending
            }
        };
        pending.await.ok_or(CoreError::Disconnected)
    }

    /// The store this coordinator publishes to.
    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    pub fn devices(&self) -> &[DeviceDescriptor] {
        &self.devices
    }

    /// Current cycle phase.
    pub fn phase(&self) -> RefreshPhase {
        *self.phase.borrow()
    }

    /// Subscribe to phase changes.
    pub fn phase_changes(&self) -> watch::Receiver<RefreshPhase> {
        self.phase.subscribe()
    }

    /// Report of the most recently completed cycle.
    pub fn last_report(&self) -> Option<RefreshReport> {
        self.last_report.borrow().clone()
    }

    // ── Cycle ────────────────────────────────────────────────────────

    async fn run_cycle(&self) -> RefreshReport {
        let cycle = self.last_cycle.fetch_add(1, Ordering::Relaxed) + 1;
        let started_at = Utc::now();
        let started = Instant::now();
        let deadline = started + self.poll_deadline;

        self.phase.send_replace(RefreshPhase::Polling { cycle });
        debug!(cycle, devices = self.devices.len(), "poll cycle started");

        let mut pending: FuturesUnordered<_> = self
            .devices
            .iter()
            .map(|device| async move {
                let remaining = deadline.saturating_duration_since(Instant::now());
                let result = self
                    .client
                    .request(device, CommandName::ReadDevice, &Params::new(), remaining)
                    .await;
                // The client's bound ends with the cycle: running out of time
                // there is the cycle's deadline, not this device failing.
                match result {
                    Err(e) if e.is_timeout() && Instant::now() >= deadline => (device, None),
                    result => (device, Some(result)),
                }
            })
            .collect();

        let mut outcomes = Vec::with_capacity(self.devices.len());
        let mut answered = HashSet::with_capacity(self.devices.len());
        while let Ok(Some((device, result))) =
            tokio::time::timeout_at(deadline, pending.next()).await
        {
            if let Some(result) = result {
                answered.insert(device.id.as_str());
                outcomes.push((device, result));
            }
        }
        // Anything still pending is cancelled here.
        drop(pending);

        self.phase.send_replace(RefreshPhase::Aggregating { cycle });
        let mut report = RefreshReport::new(cycle, started_at);
        let mut readings = BTreeMap::new();

        for (device, result) in outcomes {
            match result {
                Ok(Reply::Body(fields)) => {
                    readings.insert(device.id.clone(), Arc::new(DeviceReading::new(fields)));
                    report.readings.push(device.id.clone());
                }
                Ok(Reply::Ack) => {
                    debug!(device_id = %device.id, "read answered with bare acknowledgement");
                    report.no_data.push(device.id.clone());
                }
                Err(e) => {
                    warn!(
                        cycle,
                        device_id = %device.id,
                        kind = %e.kind(),
                        error = %e,
                        "device poll failed"
                    );
                    report.failures.push(DeviceFailure::new(&device.id, &e));
                }
            }
        }
        report.abandoned = self
            .devices
            .iter()
            .filter(|d| !answered.contains(d.id.as_str()))
            .map(|d| d.id.clone())
            .collect();
        report.readings.sort();
        report.no_data.sort();
        report
            .failures
            .sort_by(|a, b| a.device_id.cmp(&b.device_id));

        if report.is_degraded() {
            warn!(
                cycle,
                abandoned = ?report.abandoned,
                deadline_ms = self.poll_deadline.as_millis(),
                "poll deadline reached, publishing partial snapshot"
            );
        }

        report.published = self.store.replace(Snapshot {
            cycle,
            taken_at: Some(started_at),
            readings,
        });
        report.elapsed = started.elapsed();
        self.phase.send_replace(RefreshPhase::Published { cycle });

        info!(
            cycle,
            readings = report.readings.len(),
            failures = report.failures.len(),
            abandoned = report.abandoned.len(),
            elapsed_ms = report.elapsed.as_millis(),
            "poll cycle complete"
        );

        self.last_report.send_replace(Some(report.clone()));
        self.phase.send_replace(RefreshPhase::Idle);
        report
    }
}

/// Empties the in-flight slot when a cycle task ends, including by panic.
struct InFlightGuard<'a>(&'a Mutex<Option<SharedRefresh>>);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
