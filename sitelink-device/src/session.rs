//! Device session: request/response calls and pushed events over one transport.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use sitelink_common::{
    CommandHandler, CommandOutcome, DeviceCommand, DeviceEvent, Metric, MetricAdapter, MetricType,
};

use crate::codec::FrameDecoder;
use crate::config::DeviceSessionConfig;
use crate::error::{DeviceError, Result};
use crate::protocol::{CommandPayload, Message, MetricsRequest, StatusPayload};
use crate::transport::{self, ByteStream};

type Writer = WriteHalf<Box<dyn ByteStream>>;
type Pending = Mutex<HashMap<u16, oneshot::Sender<Message>>>;

/// State shared between the session handle and its read loop.
#[derive(Default)]
struct Shared {
    connected: AtomicBool,
    pending: Pending,
    frames_received: AtomicU64,
    decode_errors: AtomicU64,
}

/// Session with a site controller speaking the framed protocol.
///
/// One background task reads frames: responses are routed to the waiting
/// request by sequence number, pushed messages become [`DeviceEvent`]s on
/// the queue returned by [`take_events`](Self::take_events).
pub struct DeviceSession {
    config: DeviceSessionConfig,
    shared: Arc<Shared>,
    writer: tokio::sync::Mutex<Option<Writer>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    events_tx: mpsc::Sender<DeviceEvent>,
    events_rx: Mutex<Option<mpsc::Receiver<DeviceEvent>>>,
    next_seq: AtomicU16,
}

impl DeviceSession {
    /// Create a session; fails if the configuration is incomplete.
    pub fn new(config: DeviceSessionConfig) -> Result<Self> {
        config.validate()?;

        let (events_tx, events_rx) = mpsc::channel(config.event_buffer);

        Ok(Self {
            config,
            shared: Arc::new(Shared::default()),
            writer: tokio::sync::Mutex::new(None),
            reader: Mutex::new(None),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            next_seq: AtomicU16::new(1),
        })
    }

    pub fn config(&self) -> &DeviceSessionConfig {
        &self.config
    }

    /// Take the pushed-event queue. Only the first caller gets it.
    pub fn take_events(&self) -> Option<mpsc::Receiver<DeviceEvent>> {
        self.events_rx.lock().take()
    }

    /// Frames received and frames rejected so far.
    pub fn frame_stats(&self) -> (u64, u64) {
        (
            self.shared.frames_received.load(Ordering::Relaxed),
            self.shared.decode_errors.load(Ordering::Relaxed),
        )
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Open the configured transport. No-op when already connected.
    pub async fn connect(&self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }

        info!(
            device = %self.config.name,
            connection = %self.config.connection.describe(),
            "Connecting to device"
        );

        let stream =
            transport::open(&self.config.connection, self.config.connect_timeout()).await?;
        self.attach(stream).await;
        Ok(())
    }

    /// Run the session over an already-open stream.
    pub async fn attach(&self, stream: Box<dyn ByteStream>) {
        self.shutdown_io().await;

        let (reader, writer) = tokio::io::split(stream);
        *self.writer.lock().await = Some(writer);
        self.shared.connected.store(true, Ordering::SeqCst);

        let handle = tokio::spawn(read_loop(
            reader,
            self.shared.clone(),
            self.events_tx.clone(),
            self.config.name.clone(),
        ));
        *self.reader.lock() = Some(handle);
    }

    /// Close the transport. No-op when already closed.
    pub async fn close(&self) -> Result<()> {
        if !self.is_connected() && self.reader.lock().is_none() {
            return Ok(());
        }

        self.shutdown_io().await;
        info!(device = %self.config.name, "Device session closed");
        Ok(())
    }

    async fn shutdown_io(&self) {
        self.shared.connected.store(false, Ordering::SeqCst);

        if let Some(handle) = self.reader.lock().take() {
            handle.abort();
        }

        if let Some(mut writer) = self.writer.lock().await.take()
            && let Err(e) = writer.shutdown().await
        {
            debug!(device = %self.config.name, error = %e, "Error shutting down writer");
        }

        // Dropping the senders wakes every waiting request with `Closed`.
        self.shared.pending.lock().clear();
    }

    /// Request metrics; an empty filter asks for everything.
    pub async fn request_metrics(&self, filter: &[MetricType]) -> Result<Vec<Metric>> {
        let request = Message::MetricsRequest(MetricsRequest {
            filter: filter.to_vec(),
        });

        match self.request(request).await? {
            Message::MetricsResponse(payload) => Ok(payload.metrics),
            other => Err(unexpected("metrics_response", &other)),
        }
    }

    /// Request the controller's status.
    pub async fn request_status(&self) -> Result<StatusPayload> {
        match self.request(Message::StatusRequest).await? {
            Message::StatusResponse(status) => Ok(status),
            other => Err(unexpected("status_response", &other)),
        }
    }

    /// Dispatch a command and wait for its result.
    pub async fn send_command(&self, command: &DeviceCommand) -> Result<CommandOutcome> {
        let message = Message::Command(CommandPayload {
            command_id: command.id,
            command_type: command.command_type.clone(),
            params: command.params.clone(),
        });

        match self.request(message).await? {
            Message::CommandResult(result) => {
                if result.command_id != command.id {
                    warn!(
                        device = %self.config.name,
                        expected = command.id,
                        actual = result.command_id,
                        "Command result carries a different command id"
                    );
                }
                Ok(CommandOutcome {
                    success: result.success,
                    output: result.output,
                    return_code: result.return_code,
                    error: result.error,
                })
            }
            other => Err(unexpected("command_result", &other)),
        }
    }

    /// Send a request and wait for the response with the same sequence number.
    async fn request(&self, message: Message) -> Result<Message> {
        if !self.is_connected() {
            return Err(DeviceError::NotConnected);
        }

        let seq = self.next_seq();
        let bytes = message.to_frame(seq)?.encode()?;

        let (tx, rx) = oneshot::channel();
        self.shared.pending.lock().insert(seq, tx);

        if let Err(e) = self.write(&bytes).await {
            self.shared.pending.lock().remove(&seq);
            return Err(e);
        }

        trace!(
            device = %self.config.name,
            seq,
            kind = message.message_type().as_str(),
            "Request sent"
        );

        let timeout = self.config.request_timeout();
        let response = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(DeviceError::Closed),
            Err(_) => {
                self.shared.pending.lock().remove(&seq);
                return Err(DeviceError::Timeout(timeout));
            }
        };

        match response {
            Message::Nack(nack) => Err(DeviceError::Rejected {
                code: nack.code,
                message: nack.message,
            }),
            other => Ok(other),
        }
    }

    async fn write(&self, bytes: &[u8]) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(DeviceError::NotConnected)?;

        let result = async {
            writer.write_all(bytes).await?;
            writer.flush().await
        }
        .await;

        if let Err(e) = result {
            warn!(device = %self.config.name, error = %e, "Write to device failed");
            self.shared.connected.store(false, Ordering::SeqCst);
            return Err(DeviceError::Io(e));
        }
        Ok(())
    }

    /// Sequence 0 is reserved for pushed messages.
    fn next_seq(&self) -> u16 {
        loop {
            let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
            if seq != 0 {
                return seq;
            }
        }
    }

    fn adapter_error(&self, err: DeviceError) -> sitelink_common::Error {
        match err {
            DeviceError::NotConnected => sitelink_common::Error::NotConnected {
                adapter: self.config.name.clone(),
            },
            other => sitelink_common::Error::adapter(&self.config.name, other.to_string()),
        }
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        if let Some(handle) = self.reader.lock().take() {
            handle.abort();
        }
    }
}

fn unexpected(expected: &'static str, actual: &Message) -> DeviceError {
    DeviceError::UnexpectedResponse {
        expected,
        actual: actual.message_type().as_str(),
    }
}

async fn read_loop(
    mut reader: ReadHalf<Box<dyn ByteStream>>,
    shared: Arc<Shared>,
    events: mpsc::Sender<DeviceEvent>,
    device: String,
) {
    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; 2048];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                warn!(device = %device, "Device closed the connection");
                break;
            }
            Ok(n) => n,
            Err(e) => {
                warn!(device = %device, error = %e, "Read from device failed");
                break;
            }
        };

        decoder.extend(&buf[..n]);

        while let Some(result) = decoder.decode_next() {
            let frame = match result {
                Ok(frame) => frame,
                Err(e) => {
                    shared.decode_errors.fetch_add(1, Ordering::Relaxed);
                    warn!(device = %device, error = %e, "Dropping malformed frame");
                    continue;
                }
            };
            shared.frames_received.fetch_add(1, Ordering::Relaxed);

            let message = match Message::from_frame(&frame) {
                Ok(message) => message,
                Err(e) => {
                    shared.decode_errors.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        device = %device,
                        seq = frame.seq,
                        error = %e,
                        "Dropping undecodable message"
                    );
                    // Fails the matching request right away.
                    shared.pending.lock().remove(&frame.seq);
                    continue;
                }
            };

            dispatch(message, frame.seq, &shared, &events, &device);
        }
    }

    shared.connected.store(false, Ordering::SeqCst);
    shared.pending.lock().clear();
}

fn dispatch(
    message: Message,
    seq: u16,
    shared: &Shared,
    events: &mpsc::Sender<DeviceEvent>,
    device: &str,
) {
    if message.is_response() {
        match shared.pending.lock().remove(&seq) {
            Some(waiter) => {
                let _ = waiter.send(message);
            }
            None => debug!(device = %device, seq, "Response with no waiting request"),
        }
        return;
    }

    let event = match message {
        Message::MetricsPush(payload) => DeviceEvent::Metrics {
            metrics: payload.metrics,
        },
        Message::StatusPush(status) => DeviceEvent::Status(status.into()),
        Message::Alert(alert) => DeviceEvent::Alert(alert),
        Message::Heartbeat => {
            trace!(device = %device, "Heartbeat");
            return;
        }
        other => {
            debug!(
                device = %device,
                kind = other.message_type().as_str(),
                "Ignoring unsolicited message"
            );
            return;
        }
    };

    if let Err(e) = events.try_send(event) {
        debug!(device = %device, error = %e, "Event queue unavailable, dropping event");
    }
}

#[async_trait]
impl MetricAdapter for DeviceSession {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn connect(&self) -> sitelink_common::Result<()> {
        DeviceSession::connect(self)
            .await
            .map_err(|e| self.adapter_error(e))
    }

    async fn close(&self) -> sitelink_common::Result<()> {
        DeviceSession::close(self)
            .await
            .map_err(|e| self.adapter_error(e))
    }

    fn is_connected(&self) -> bool {
        DeviceSession::is_connected(self)
    }

    async fn collect_metrics(&self) -> sitelink_common::Result<Vec<Metric>> {
        self.request_metrics(&[])
            .await
            .map_err(|e| self.adapter_error(e))
    }

    async fn collect_metric(
        &self,
        metric_type: MetricType,
    ) -> sitelink_common::Result<Option<Metric>> {
        let metrics = self
            .request_metrics(&[metric_type])
            .await
            .map_err(|e| self.adapter_error(e))?;
        Ok(metrics.into_iter().find(|m| m.metric_type == metric_type))
    }
}

#[async_trait]
impl CommandHandler for DeviceSession {
    async fn execute(&self, command: &DeviceCommand) -> sitelink_common::Result<CommandOutcome> {
        self.send_command(command)
            .await
            .map_err(|e| sitelink_common::Error::Command {
                command_id: command.id,
                message: e.to_string(),
            })
    }
}
