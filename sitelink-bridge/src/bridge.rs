//! The gateway orchestrator.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use sitelink_cloud::CloudClient;
use sitelink_common::{CommandHandler, DeviceEvent, Metric, MetricAdapter};
use sitelink_device::DeviceSession;
use sitelink_snmp::{OidTables, SnmpAdapter};

use crate::config::{GatewayConfig, StationConfig};
use crate::convert;
use crate::error::{BridgeError, Result};
use crate::executor::CommandExecutor;
use crate::registration::{StationIdentity, resolve_station};
use crate::status::{AdapterStatus, BridgeState, BridgeStatus};

/// Timing and identity settings for a [`Bridge`].
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    pub station: StationConfig,
    pub metrics_interval: Duration,
    pub commands_interval: Duration,
    pub shutdown_timeout: Duration,
}

impl From<&GatewayConfig> for BridgeSettings {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            station: config.station.clone(),
            metrics_interval: config.metrics_interval(),
            commands_interval: config.commands_interval(),
            shutdown_timeout: config.shutdown_timeout(),
        }
    }
}

#[derive(Clone)]
struct AdapterEntry {
    adapter: Arc<dyn MetricAdapter>,
    /// A required adapter that cannot connect aborts startup.
    required: bool,
}

/// Loops spawned by [`Bridge::start`].
struct Running {
    token: CancellationToken,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

/// Wires adapters, the command handler and the backend together.
///
/// [`start`](Self::start) connects the adapters, logs in, resolves the
/// station and spawns the metrics, command and event loops.
/// [`stop`](Self::stop) cancels them, waits up to the shutdown timeout and
/// closes the adapters.
pub struct Bridge {
    settings: BridgeSettings,
    cloud: Arc<CloudClient>,
    identity: Arc<StationIdentity>,
    adapters: Vec<AdapterEntry>,
    commands: Option<Arc<dyn CommandHandler>>,
    events: Mutex<Option<mpsc::Receiver<DeviceEvent>>>,
    cache: Arc<RwLock<Vec<Metric>>>,
    last_upload: Arc<RwLock<Option<DateTime<Utc>>>>,
    state: RwLock<BridgeState>,
    shutdown: CancellationToken,
    running: Mutex<Option<Running>>,
}

impl Bridge {
    pub fn new(settings: BridgeSettings, cloud: CloudClient) -> Self {
        let identity = Arc::new(StationIdentity::new(settings.station.id.clone()));
        Self {
            settings,
            cloud: Arc::new(cloud),
            identity,
            adapters: Vec::new(),
            commands: None,
            events: Mutex::new(None),
            cache: Arc::new(RwLock::new(Vec::new())),
            last_upload: Arc::new(RwLock::new(None)),
            state: RwLock::new(BridgeState::Created),
            shutdown: CancellationToken::new(),
            running: Mutex::new(None),
        }
    }

    /// Build the bridge described by a configuration file.
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        config.validate()?;

        let cloud = CloudClient::new(config.cloud.clone())?;
        let mut bridge = Bridge::new(BridgeSettings::from(config), cloud);

        if let Some(device) = &config.device {
            let session = Arc::new(DeviceSession::new(device.clone())?);
            let events = session.take_events();
            bridge = bridge.with_device(session);
            if let Some(events) = events {
                bridge = bridge.with_events(events);
            }
        }

        let tables = OidTables::builtin();
        for snmp in &config.snmp {
            let adapter = SnmpAdapter::new(snmp.clone(), &tables)?;
            bridge = bridge.with_adapter(Arc::new(adapter));
        }

        Ok(bridge)
    }

    /// Add the site controller: a required metric source that also executes commands.
    pub fn with_device<D>(mut self, device: Arc<D>) -> Self
    where
        D: MetricAdapter + CommandHandler + 'static,
    {
        self.adapters.push(AdapterEntry {
            adapter: device.clone(),
            required: true,
        });
        self.commands = Some(device);
        self
    }

    /// Add an optional metric source. Connection failures only degrade it.
    pub fn with_adapter(mut self, adapter: Arc<dyn MetricAdapter>) -> Self {
        self.adapters.push(AdapterEntry {
            adapter,
            required: false,
        });
        self
    }

    pub fn with_command_handler(mut self, handler: Arc<dyn CommandHandler>) -> Self {
        self.commands = Some(handler);
        self
    }

    /// Queue of events pushed by the device.
    pub fn with_events(self, events: mpsc::Receiver<DeviceEvent>) -> Self {
        *self.events.lock() = Some(events);
        self
    }

    /// Stop the loops when `parent` is cancelled as well.
    pub fn with_shutdown_token(mut self, parent: CancellationToken) -> Self {
        self.shutdown = parent;
        self
    }

    pub fn cloud(&self) -> &Arc<CloudClient> {
        &self.cloud
    }

    pub fn identity(&self) -> &Arc<StationIdentity> {
        &self.identity
    }

    pub fn state(&self) -> BridgeState {
        *self.state.read()
    }

    /// Copy of the latest-metrics cache.
    pub fn latest_metrics(&self) -> Vec<Metric> {
        self.cache.read().clone()
    }

    pub fn status(&self) -> BridgeStatus {
        BridgeStatus {
            version: env!("CARGO_PKG_VERSION").to_string(),
            state: self.state(),
            station_id: self.identity.configured_id().to_string(),
            resolved_station_id: self.identity.resolved_id(),
            authenticated: self.cloud.is_authenticated(),
            adapters: self
                .adapters
                .iter()
                .map(|entry| AdapterStatus {
                    name: entry.adapter.name().to_string(),
                    connected: entry.adapter.is_connected(),
                })
                .collect(),
            cached_metrics: self.cache.read().len(),
            last_upload: *self.last_upload.read(),
        }
    }

    /// Connect, authenticate and launch the loops.
    ///
    /// Only a required adapter failing to connect is fatal. Backend
    /// problems leave the bridge running offline; the metrics loop keeps
    /// trying to log in. A `stop` issued while starting wins: the loops are
    /// discarded, the adapters closed and `start` returns an error.
    pub async fn start(&self) -> Result<()> {
        {
            let mut state = self.state.write();
            if *state != BridgeState::Created {
                return Err(BridgeError::State {
                    expected: BridgeState::Created.as_str(),
                    actual: state.as_str(),
                });
            }
            *state = BridgeState::Starting;
        }

        let station = self.settings.station.name().to_string();
        tracing::info!(
            station = %station,
            adapters = self.adapters.len(),
            version = env!("CARGO_PKG_VERSION"),
            "Starting bridge"
        );

        for entry in &self.adapters {
            let name = entry.adapter.name();
            match entry.adapter.connect().await {
                Ok(()) => tracing::info!(adapter = %name, "Adapter connected"),
                Err(e) if entry.required => {
                    tracing::error!(adapter = %name, error = %e, "Required adapter failed to connect");
                    self.close_adapters().await;
                    self.abandon_start();
                    return Err(e.into());
                }
                Err(e) => {
                    tracing::warn!(adapter = %name, error = %e, "Adapter failed to connect, will retry")
                }
            }
        }

        match self.cloud.health_check().await {
            Ok(()) => tracing::info!(url = %self.cloud.config().base_url, "Backend reachable"),
            Err(e) => {
                tracing::warn!(url = %self.cloud.config().base_url, error = %e, "Backend health check failed")
            }
        }

        let worker = Arc::new(self.worker());
        worker.ensure_online().await;

        let token = self.shutdown.child_token();
        let mut tasks = Vec::new();

        tasks.push((
            "metrics",
            tokio::spawn(metrics_loop(
                worker.clone(),
                self.settings.metrics_interval,
                token.clone(),
            )),
        ));

        match &self.commands {
            Some(handler) => {
                let executor =
                    CommandExecutor::new(self.cloud.clone(), handler.clone(), self.identity.clone());
                tasks.push((
                    "commands",
                    tokio::spawn(command_loop(
                        worker.clone(),
                        executor,
                        self.settings.commands_interval,
                        token.clone(),
                    )),
                ));
            }
            None => tracing::info!("No command handler configured, command polling disabled"),
        }

        let events = self.events.lock().take();
        if let Some(events) = events {
            tasks.push((
                "events",
                tokio::spawn(event_loop(worker.clone(), events, token.clone())),
            ));
        }

        let loops = tasks.len();
        let interrupted = {
            let mut state = self.state.write();
            if *state == BridgeState::Starting {
                *self.running.lock() = Some(Running {
                    token: token.clone(),
                    tasks: std::mem::take(&mut tasks),
                });
                *state = BridgeState::Started;
                None
            } else {
                Some(*state)
            }
        };

        if let Some(actual) = interrupted {
            tracing::warn!(state = %actual, "Bridge stopped while starting, discarding loops");
            token.cancel();
            for (_, handle) in &tasks {
                handle.abort();
            }
            self.close_adapters().await;
            return Err(BridgeError::State {
                expected: BridgeState::Starting.as_str(),
                actual: actual.as_str(),
            });
        }

        tracing::info!(
            station = %station,
            loops,
            authenticated = self.cloud.is_authenticated(),
            "Bridge started"
        );
        Ok(())
    }

    /// Cancel the loops and close the adapters.
    ///
    /// Loops get `shutdown_timeout` to finish their current cycle; any still
    /// running after that are aborted and the adapters are closed anyway.
    pub async fn stop(&self) -> Result<()> {
        {
            let mut state = self.state.write();
            match *state {
                BridgeState::Started => *state = BridgeState::Stopping,
                BridgeState::Created | BridgeState::Starting => {
                    *state = BridgeState::Stopped;
                    return Ok(());
                }
                BridgeState::Stopping | BridgeState::Stopped => return Ok(()),
            }
        }

        tracing::info!(station = %self.settings.station.name(), "Stopping bridge");

        let running = self.running.lock().take();
        if let Some(running) = running {
            running.token.cancel();

            let deadline = Instant::now() + self.settings.shutdown_timeout;
            for (name, mut handle) in running.tasks {
                match tokio::time::timeout_at(deadline, &mut handle).await {
                    Ok(Ok(())) => tracing::debug!(task = name, "Loop stopped"),
                    Ok(Err(e)) => tracing::warn!(task = name, error = %e, "Loop ended abnormally"),
                    Err(_) => {
                        tracing::warn!(
                            task = name,
                            timeout_ms = self.settings.shutdown_timeout.as_millis() as u64,
                            "Loop did not stop in time, aborting"
                        );
                        handle.abort();
                    }
                }
            }
        }

        self.close_adapters().await;

        *self.state.write() = BridgeState::Stopped;
        tracing::info!(station = %self.settings.station.name(), "Bridge stopped");
        Ok(())
    }

    /// Return to `Created` unless a concurrent `stop` already moved on.
    fn abandon_start(&self) {
        let mut state = self.state.write();
        if *state == BridgeState::Starting {
            *state = BridgeState::Created;
        }
    }

    async fn close_adapters(&self) {
        for entry in &self.adapters {
            if let Err(e) = entry.adapter.close().await {
                tracing::warn!(adapter = %entry.adapter.name(), error = %e, "Failed to close adapter");
            }
        }
    }

    fn worker(&self) -> Worker {
        Worker {
            station: self.settings.station.clone(),
            cloud: self.cloud.clone(),
            identity: self.identity.clone(),
            adapters: self.adapters.iter().map(|e| e.adapter.clone()).collect(),
            cache: self.cache.clone(),
            last_upload: self.last_upload.clone(),
        }
    }
}

/// State shared by the loops.
struct Worker {
    station: StationConfig,
    cloud: Arc<CloudClient>,
    identity: Arc<StationIdentity>,
    adapters: Vec<Arc<dyn MetricAdapter>>,
    cache: Arc<RwLock<Vec<Metric>>>,
    last_upload: Arc<RwLock<Option<DateTime<Utc>>>>,
}

impl Worker {
    /// Log in if needed, then resolve the station if still unresolved.
    /// Returns whether the backend is usable.
    async fn ensure_online(&self) -> bool {
        if !self.cloud.is_authenticated() {
            if let Err(e) = self.cloud.login().await {
                tracing::warn!(error = %e, "Backend login failed, running offline");
                return false;
            }
        }

        if !self.identity.is_resolved()
            && let Err(e) = resolve_station(&self.cloud, &self.station, &self.identity).await
        {
            tracing::warn!(station = %self.station.name(), error = %e, "Station resolution failed");
        }

        true
    }

    /// Poll every adapter, reconnecting disconnected ones once.
    async fn collect_all(&self) -> Vec<Metric> {
        let mut merged = Vec::new();

        for adapter in &self.adapters {
            if !adapter.is_connected() {
                match adapter.connect().await {
                    Ok(()) => tracing::info!(adapter = %adapter.name(), "Adapter reconnected"),
                    Err(e) => {
                        tracing::warn!(adapter = %adapter.name(), error = %e, "Adapter unavailable, skipping");
                        continue;
                    }
                }
            }

            match adapter.collect_metrics().await {
                Ok(metrics) => {
                    tracing::debug!(adapter = %adapter.name(), count = metrics.len(), "Collected metrics");
                    merged.extend(metrics);
                }
                Err(e) => {
                    tracing::warn!(adapter = %adapter.name(), error = %e, "Metric collection failed")
                }
            }
        }

        merged
    }

    async fn metrics_cycle(&self) {
        let metrics = self.collect_all().await;
        *self.cache.write() = metrics;

        if !self.ensure_online().await {
            return;
        }

        let snapshot = self.cache.read().clone();
        let cloud_metrics = convert::to_cloud_metrics(&snapshot);
        if cloud_metrics.is_empty() {
            tracing::debug!(collected = snapshot.len(), "Nothing to upload");
            return;
        }

        let station_id = self.identity.station_id();
        match self.cloud.upload_metrics(&station_id, &cloud_metrics).await {
            Ok(response) => {
                *self.last_upload.write() = Some(Utc::now());
                tracing::info!(
                    station = %station_id,
                    count = cloud_metrics.len(),
                    received = response.received,
                    "Metrics uploaded"
                );
            }
            Err(e) => tracing::warn!(station = %station_id, error = %e, "Metrics upload failed"),
        }
    }

    async fn command_cycle(&self, executor: &CommandExecutor) {
        if !self.cloud.is_authenticated() {
            tracing::debug!("Not authenticated, skipping command poll");
            return;
        }

        match executor.process_pending_commands().await {
            Ok(report) if report.fetched > 0 => tracing::info!(
                fetched = report.fetched,
                succeeded = report.succeeded,
                reported = report.reported,
                "Command cycle complete"
            ),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Command poll failed"),
        }
    }

    /// Replace cached readings of the pushed types, keeping the rest.
    fn merge_pushed(&self, metrics: Vec<Metric>) {
        let mut cache = self.cache.write();
        for metric in metrics {
            match cache.iter_mut().find(|m| m.metric_type == metric.metric_type) {
                Some(slot) => *slot = metric,
                None => cache.push(metric),
            }
        }
    }

    async fn handle_event(&self, event: DeviceEvent) {
        let station_id = self.identity.station_id();

        match event {
            DeviceEvent::Metrics { metrics } => {
                tracing::debug!(count = metrics.len(), "Pushed metrics received");
                self.merge_pushed(metrics);
            }
            DeviceEvent::Alert(alert) => {
                tracing::info!(
                    station = %station_id,
                    kind = alert.kind.as_str(),
                    severity = alert.severity.as_cloud_str(),
                    message = %alert.message,
                    "Device alert"
                );
                let request = convert::to_alert_request(&station_id, &alert);
                if let Err(e) = self.cloud.send_alert(&request).await {
                    tracing::warn!(station = %station_id, error = %e, "Failed to forward alert");
                }
            }
            DeviceEvent::Status(report) => {
                tracing::info!(station = %station_id, status = %report.status, "Device status changed");
                let update = convert::to_status_update(&report);
                if let Err(e) = self.cloud.update_device_status(&station_id, &update).await {
                    tracing::warn!(station = %station_id, error = %e, "Failed to forward device status");
                }
            }
        }
    }
}

async fn metrics_loop(worker: Arc<Worker>, period: Duration, token: CancellationToken) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => worker.metrics_cycle().await,
        }
    }

    tracing::debug!("Metrics loop exited");
}

async fn command_loop(
    worker: Arc<Worker>,
    executor: CommandExecutor,
    period: Duration,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => worker.command_cycle(&executor).await,
        }
    }

    tracing::debug!("Command loop exited");
}

async fn event_loop(
    worker: Arc<Worker>,
    mut events: mpsc::Receiver<DeviceEvent>,
    token: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = token.cancelled() => break,
            event = events.recv() => event,
        };

        match event {
            Some(event) => worker.handle_event(event).await,
            None => {
                tracing::debug!("Device event queue closed");
                break;
            }
        }
    }

    tracing::debug!("Event loop exited");
}
