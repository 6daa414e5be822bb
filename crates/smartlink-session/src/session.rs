//! The reconnecting device session.
//!
//! A [`Session`] owns one driver task per `open()`. The driver connects,
//! routes every inbound frame in arrival order, runs the liveness check,
//! and reconnects with capped exponential backoff until `close()` is called.
//! Callers interact through [`Session::send_request`] (fire-and-forget) and
//! [`Session::send_request_awaiting_reply`] (correlated by `requestId`).
//!
//! Several sessions may coexist; none of them touches global state.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use smartlink_core::SessionError;
use smartlink_core::ids::ConnectionId;
use smartlink_core::ota::OtaEvent;
use smartlink_core::protocol::inbound::decode;
use smartlink_core::protocol::{
    self, ConfigSnapshot, DeviceCommand, Payload, REQUEST_ID_FIELD, UpgradeProgress, UpgradeStatus,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::SessionConfig;
use crate::correlator::{Correlator, PendingReply, millis};
use crate::errors::CommandError;
use crate::handlers::{EventHandlers, Notice};
use crate::heartbeat::{Liveness, TickAction};
use crate::reconnect::ReconnectScheduler;
use crate::router::{MessageRouter, Routed};
use crate::state::SessionState;
use crate::transport::{Connection, Connector, WsConnector};

/// A persistent, self-healing link to one device.
pub struct Session {
    inner: Arc<Inner>,
    driver: Mutex<Option<Driver>>,
}

struct Driver {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

struct Inner {
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    correlator: Arc<Correlator>,
    handlers: Arc<EventHandlers>,
    state: watch::Sender<SessionState>,
    link: Mutex<Option<Link>>,
    liveness: Liveness,
    reconnect_attempts: AtomicU32,
}

/// The write side of the current connection.
struct Link {
    connection_id: ConnectionId,
    outbound: mpsc::UnboundedSender<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CloseReason {
    Requested,
    LivenessTimeout,
    Dropped,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("url", &self.inner.config.url)
            .field("state", &self.state())
            .field("pending", &self.inner.correlator.len())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a closed session.
    pub fn new(config: SessionConfig, connector: Arc<dyn Connector>) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                config,
                connector,
                correlator: Arc::new(Correlator::new()),
                handlers: Arc::new(EventHandlers::default()),
                state,
                link: Mutex::new(None),
                liveness: Liveness::new(),
                reconnect_attempts: AtomicU32::new(0),
            }),
            driver: Mutex::new(None),
        }
    }

    /// Create a closed session over WebSocket.
    pub fn websocket(config: SessionConfig) -> Self {
        Self::new(config, Arc::new(WsConnector))
    }

    /// The configuration this session runs with.
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Start connecting. Idempotent while the driver runs.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(&self) {
        let mut driver = self.driver.lock();
        if driver.as_ref().is_some_and(|d| !d.task.is_finished()) {
            debug!("session already running");
            return;
        }
        let cancel = CancellationToken::new();
        let task = tokio::spawn(drive(Arc::clone(&self.inner), cancel.clone()));
        *driver = Some(Driver { cancel, task });
    }

    /// Shut down intentionally. Never followed by a reconnect.
    pub async fn close(&self) {
        let driver = self.driver.lock().take();
        let Some(Driver { cancel, task }) = driver else {
            return;
        };
        cancel.cancel();
        if let Err(e) = task.await {
            warn!(error = %e, "session driver ended abnormally");
        }
    }

    /// Wait until the session is open, up to `timeout`.
    pub async fn wait_until_open(&self, timeout: Duration) -> Result<(), SessionError> {
        let mut rx = self.inner.state.subscribe();
        match tokio::time::timeout(timeout, rx.wait_for(|s| s.is_open())).await {
            Ok(Ok(_)) => Ok(()),
            _ => Err(SessionError::NotConnected),
        }
    }

    // ── Sending ─────────────────────────────────────────────────────

    /// Send a JSON object without expecting a reply.
    pub fn send_request(&self, payload: Value) -> Result<(), SessionError> {
        let payload = into_object(payload)?;
        self.inner.transmit(&payload)
    }

    /// Send a JSON object tagged with a fresh `requestId` and return the
    /// handle that resolves with the device's reply.
    ///
    /// `timeout` defaults to the configured request timeout. Nothing is
    /// registered when the session is not open.
    pub fn request(
        &self,
        payload: Value,
        timeout: Option<Duration>,
    ) -> Result<PendingReply, SessionError> {
        let mut payload = into_object(payload)?;
        let timeout = timeout.unwrap_or(self.inner.config.request_timeout);

        let guard = self.inner.link.lock();
        let Some(link) = guard.as_ref() else {
            return Err(SessionError::NotConnected);
        };

        let id = self.inner.correlator.next_id();
        let _ = payload.insert(REQUEST_ID_FIELD.to_owned(), Value::String(id.to_string()));
        let text = encode(&payload)?;
        let reply = self.inner.correlator.register(id, timeout);
        if link.outbound.send(text).is_err() {
            return Err(SessionError::NotConnected);
        }
        debug!(request_id = %reply.request_id(), timeout_ms = millis(timeout), "request sent");
        Ok(reply)
    }

    /// Send a request and wait for its reply or its deadline.
    pub async fn send_request_awaiting_reply(
        &self,
        payload: Value,
        timeout: Option<Duration>,
    ) -> Result<Value, SessionError> {
        self.request(payload, timeout)?.await
    }

    /// Validate and send a device command without waiting for a reply.
    pub fn send_command(&self, command: &DeviceCommand) -> Result<(), CommandError> {
        command.validate()?;
        let payload = command.to_payload()?;
        debug!(command = command.name(), "sending command");
        self.inner.transmit(&payload)?;
        Ok(())
    }

    /// Validate a device command, send it with a `requestId`, and wait for
    /// the reply.
    pub async fn request_command(
        &self,
        command: &DeviceCommand,
        timeout: Option<Duration>,
    ) -> Result<Value, CommandError> {
        command.validate()?;
        let payload = command.to_payload()?;
        let reply = self.request(Value::Object(payload), timeout)?;
        Ok(reply.await?)
    }

    /// Send a command the way the firmware expects: awaited when it
    /// answers, fire-and-forget otherwise.
    pub async fn execute(&self, command: &DeviceCommand) -> Result<Option<Value>, CommandError> {
        if command.expects_reply() {
            self.request_command(command, None).await.map(Some)
        } else {
            self.send_command(command).map(|()| None)
        }
    }

    /// Ask the device whether newer firmware is available.
    pub async fn check_for_upgrades(&self) -> Result<UpgradeStatus, CommandError> {
        let reply = self
            .request_command(&DeviceCommand::CheckForUpgrades, None)
            .await?;
        Ok(decode::<UpgradeStatus>(&reply)?)
    }

    // ── Observation ─────────────────────────────────────────────────

    /// Current connection state.
    pub fn state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Reconnects scheduled since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.reconnect_attempts.load(Ordering::Relaxed)
    }

    /// Requests still waiting for a reply.
    pub fn pending_requests(&self) -> usize {
        self.inner.correlator.len()
    }

    /// Whether a pong was seen since the last ping.
    pub fn liveness_confirmed(&self) -> bool {
        self.inner.liveness.is_confirmed()
    }

    /// Id of the current connection, when open.
    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.inner
            .link
            .lock()
            .as_ref()
            .map(|link| link.connection_id.clone())
    }

    // ── Handlers ────────────────────────────────────────────────────

    /// Called with every `configData` snapshot.
    pub fn on_config_data(&self, handler: impl Fn(&ConfigSnapshot) + Send + Sync + 'static) {
        self.inner.handlers.config_data.add(Arc::new(handler));
    }

    /// Called with every `upgradeProgress` event.
    pub fn on_upgrade_progress(&self, handler: impl Fn(&UpgradeProgress) + Send + Sync + 'static) {
        self.inner.handlers.upgrade_progress.add(Arc::new(handler));
    }

    /// Called with interpreted `otaProgress` events. Completion and
    /// failure are reported once per flashing run.
    pub fn on_ota_progress(&self, handler: impl Fn(&OtaEvent) + Send + Sync + 'static) {
        self.inner.handlers.ota_progress.add(Arc::new(handler));
    }

    /// Called with connection and protocol notices meant for the user.
    pub fn on_notice(&self, handler: impl Fn(&Notice) + Send + Sync + 'static) {
        self.inner.handlers.notice.add(Arc::new(handler));
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.get_mut().take() {
            driver.cancel.cancel();
        }
    }
}

impl Inner {
    fn set_state(&self, next: SessionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(from = %previous, to = %next, "session state");
        }
    }

    fn transmit(&self, payload: &Payload) -> Result<(), SessionError> {
        let text = encode(payload)?;
        let guard = self.link.lock();
        let Some(link) = guard.as_ref() else {
            return Err(SessionError::NotConnected);
        };
        link.outbound
            .send(text)
            .map_err(|_| SessionError::NotConnected)
    }

    /// Install the link and mark the session open in one step, so a send
    /// never observes one without the other.
    fn open_link(&self, link: Link) {
        let mut slot = self.link.lock();
        if let Some(stale) = slot.replace(link) {
            debug!(connection_id = %stale.connection_id, "dropping stale link");
        }
        self.set_state(SessionState::Open);
    }

    fn close_link(&self) {
        let mut slot = self.link.lock();
        let _ = slot.take();
        self.set_state(SessionState::Closing);
    }

    fn notice(&self, notice: &Notice) {
        self.handlers.notice.emit(notice);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Driver
// ─────────────────────────────────────────────────────────────────────────────

#[instrument(name = "session", skip_all, fields(url = %inner.config.url))]
async fn drive(inner: Arc<Inner>, cancel: CancellationToken) {
    let mut scheduler = ReconnectScheduler::new(inner.config.backoff);
    let mut router = MessageRouter::new(Arc::clone(&inner.correlator), Arc::clone(&inner.handlers));
    let mut lost = false;

    loop {
        inner.set_state(SessionState::Connecting);
        let attempt = tokio::select! {
            () = cancel.cancelled() => break,
            result = inner.connector.connect(&inner.config.url) => result,
        };

        match attempt {
            Ok(connection) => {
                scheduler.reset();
                inner.reconnect_attempts.store(0, Ordering::Relaxed);
                if std::mem::take(&mut lost) {
                    inner.notice(&Notice::ConnectionRestored);
                }

                let reason =
                    run_connection(&inner, &mut router, connection, ConnectionId::new(), &cancel)
                        .await;
                inner.set_state(SessionState::Disconnected);

                if inner.config.fail_pending_on_disconnect {
                    let failed = inner.correlator.fail_all();
                    if failed > 0 {
                        info!(failed, "failed pending requests on disconnect");
                    }
                }
                if reason == CloseReason::Requested {
                    break;
                }
                warn!(?reason, "connection closed");
            }
            Err(e) => {
                inner.set_state(SessionState::Disconnected);
                warn!(error = %e, code = e.code(), "connect failed");
            }
        }

        if !lost {
            lost = true;
            inner.notice(&Notice::ConnectionLost);
        }

        if let Some(delay) = scheduler.schedule() {
            let attempt = scheduler.attempts();
            inner.reconnect_attempts.store(attempt, Ordering::Relaxed);
            info!(attempt, delay_ms = millis(delay), "reconnect scheduled");
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }
        scheduler.fired();
    }

    inner.set_state(SessionState::Disconnected);
    debug!("session driver stopped");
}

#[instrument(skip_all, fields(connection_id = %connection_id))]
async fn run_connection(
    inner: &Inner,
    router: &mut MessageRouter,
    connection: Connection,
    connection_id: ConnectionId,
    cancel: &CancellationToken,
) -> CloseReason {
    let Connection {
        outbound,
        mut inbound,
    } = connection;

    inner.liveness.reset();
    inner.open_link(Link {
        connection_id,
        outbound,
    });
    info!("connection open");

    if let Err(e) = DeviceCommand::GetData
        .to_payload()
        .and_then(|payload| inner.transmit(&payload))
    {
        warn!(error = %e, "initial state request failed");
    }

    let period = inner.config.heartbeat_period();
    if period != inner.config.heartbeat_interval {
        warn!(
            configured_ms = millis(inner.config.heartbeat_interval),
            interval_ms = millis(period),
            "heartbeat interval too short, clamping"
        );
    }
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let reason = loop {
        tokio::select! {
            () = cancel.cancelled() => break CloseReason::Requested,
            frame = inbound.recv() => {
                let Some(text) = frame else {
                    break CloseReason::Dropped;
                };
                if matches!(router.route(&text), Routed::Pong) {
                    inner.liveness.confirm();
                }
            }
            _ = ticker.tick() => {
                match inner.liveness.on_tick() {
                    TickAction::ForceClose => {
                        warn!(interval_ms = millis(period), "no pong since last ping, forcing reconnect");
                        break CloseReason::LivenessTimeout;
                    }
                    TickAction::SendPing => {
                        if let Err(e) = inner.transmit(&protocol::ping()) {
                            debug!(error = %e, "ping not sent");
                        }
                    }
                }
                let expired = inner.correlator.purge_expired();
                if expired > 0 {
                    debug!(expired, "purged expired requests");
                }
            }
        }
    };

    inner.close_link();
    reason
}

fn into_object(payload: Value) -> Result<Payload, SessionError> {
    match payload {
        Value::Object(map) => Ok(map),
        other => Err(SessionError::InvalidPayload(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

fn encode(payload: &Payload) -> Result<String, SessionError> {
    serde_json::to_string(payload).map_err(|e| SessionError::InvalidPayload(e.to_string()))
}
