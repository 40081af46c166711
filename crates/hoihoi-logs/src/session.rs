use std::time::Duration;

use futures::FutureExt;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use hoihoi_remote::{
    ClientConfig, Closed, ConnectRequest, Connector, Transport, TransportEvent, TransportEventKind,
    normalize_namespace, socket_url,
};
use hoihoi_types::{LogLine, LogLinePayload, SessionStatus, TailState, TailStatusPayload, TailTarget};

use crate::buffer::LogBuffer;

/// Errors surfaced by the tail session
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("select a log name")]
    MissingSourceName,

    #[error("log path is missing for the selected log")]
    MissingSourcePath,

    #[error("select a host")]
    MissingHost,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("remote tail error: {0}")]
    RemoteTail(String),
}

impl SessionError {
    /// Raised before any transport is opened
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingSourceName | Self::MissingSourcePath | Self::MissingHost
        )
    }
}

/// What a handled transport event changed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionUpdate {
    Unchanged,
    LinesAppended(usize),
    StatusChanged(SessionStatus),
}

/// Owns the realtime tail session: one transport at a time plus the buffer
///
/// Transport events are delivered on the receiver returned by [`SessionController::new`]
/// and must be fed back through [`SessionController::handle_event`].
pub struct SessionController<C: Connector> {
    config: ClientConfig,

    connector: C,

    /// Handed to every transport this controller opens
    events_tx: mpsc::UnboundedSender<TransportEvent>,

    transport: Option<Box<dyn Transport>>,

    /// Released transports that may still be flushing
    closing: Vec<Closed>,

    /// Id of the current transport; events from older ones are ignored
    session_id: u64,

    status: SessionStatus,

    /// Start-tail emitted, backend has not answered yet
    start_pending: bool,

    /// Target the next start addresses
    target: TailTarget,

    /// Target of the running session
    session_target: Option<TailTarget>,

    buffer: LogBuffer,

    last_error: Option<SessionError>,
}

impl<C: Connector> SessionController<C> {
    pub fn new(
        config: ClientConfig,
        connector: C,
        buffer: LogBuffer,
    ) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let controller = Self {
            config,
            connector,
            events_tx,
            transport: None,
            closing: Vec::new(),
            session_id: 0,
            status: SessionStatus::Idle,
            start_pending: false,
            target: TailTarget::default(),
            session_target: None,
            buffer,
            last_error: None,
        };
        (controller, events_rx)
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn target(&self) -> &TailTarget {
        &self.target
    }

    pub fn session_target(&self) -> Option<&TailTarget> {
        self.session_target.as_ref()
    }

    /// Read handle onto the accumulated lines
    pub fn buffer(&self) -> &LogBuffer {
        &self.buffer
    }

    pub fn last_error(&self) -> Option<&SessionError> {
        self.last_error.as_ref()
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Tail requested and not stopped (connecting, awaiting confirmation or active)
    ///
    /// False after the backend reports `stopped` or `error` even though the
    /// transport stays open; a start then reuses it.
    pub fn is_running(&self) -> bool {
        match self.status {
            SessionStatus::Connecting | SessionStatus::Active => true,
            SessionStatus::ConnectedInactive => self.start_pending,
            SessionStatus::Idle | SessionStatus::Stopping => false,
        }
    }

    /// Set the target for the next start. A running stream is not switched.
    pub fn change_target(&mut self, target: TailTarget) {
        if self.status.has_transport() && self.session_target.as_ref() != Some(&target) {
            debug!(
                next = %target.source_name,
                "target changed while a session is running; takes effect on next start"
            );
        }
        self.target = target;
    }

    /// Start tailing `target`
    ///
    /// Only validation failures are returned; connection problems are
    /// reported through [`Self::status`] and [`Self::last_error`].
    pub fn start(&mut self, target: TailTarget) -> Result<(), SessionError> {
        validate(&target)?;

        match self.status {
            SessionStatus::Connecting | SessionStatus::Active => {
                warn!(status = self.status.label(), "start ignored: session already running");
                return Ok(());
            }
            SessionStatus::ConnectedInactive if self.start_pending => {
                warn!("start ignored: waiting for the backend to confirm the tail");
                return Ok(());
            }
            SessionStatus::ConnectedInactive => {
                // Transport is still up after a remote stop or error
                self.target = target.clone();
                self.session_target = Some(target);
                self.last_error = None;
                self.emit_start();
                return Ok(());
            }
            SessionStatus::Idle | SessionStatus::Stopping => {}
        }

        self.release_transport();
        self.target = target.clone();

        let url = match socket_url(&self.config.base_url, &self.config.socket_path) {
            Ok(url) => url,
            Err(e) => {
                warn!("cannot connect: {}", e);
                self.last_error = Some(SessionError::Connection(e.to_string()));
                return Ok(());
            }
        };

        self.session_id += 1;
        let request = ConnectRequest {
            session_id: self.session_id,
            url,
            namespace: normalize_namespace(&self.config.namespace),
            connect_timeout: self.config.connect_timeout,
        };

        info!(
            session_id = self.session_id,
            url = %request.url,
            host = %target.host,
            log = %target.source_name,
            "starting tail session"
        );

        self.transport = Some(self.connector.open(request, self.events_tx.clone()));
        self.session_target = Some(target);
        self.status = SessionStatus::Connecting;
        self.start_pending = false;
        self.last_error = None;
        Ok(())
    }

    /// Stop tailing and release the transport. Safe to call in any state.
    pub fn stop(&mut self) {
        let Some(mut transport) = self.transport.take() else {
            self.status = SessionStatus::Idle;
            self.start_pending = false;
            return;
        };

        let was_connected = self.status.is_connected();
        self.status = SessionStatus::Stopping;

        if was_connected {
            let stop_event = &self.config.events.stop_tail;
            if let Err(e) = transport.emit(stop_event, Value::Object(Default::default())) {
                debug!("stop request not delivered: {}", e);
            }
        }
        self.track_close(transport.close());

        info!(session_id = self.session_id, "tail session stopped");
        self.status = SessionStatus::Idle;
        self.start_pending = false;
        self.session_target = None;
    }

    /// Stop, then wait up to `limit` for released transports to flush
    ///
    /// Call before the runtime goes away so the stop request reaches the backend.
    pub async fn shutdown(&mut self, limit: Duration) {
        self.stop();
        let pending = futures::future::join_all(std::mem::take(&mut self.closing));
        if tokio::time::timeout(limit, pending).await.is_err() {
            warn!("transport still flushing after {:?}, giving up", limit);
        }
    }

    /// Stop and drop every accumulated line
    pub fn reset(&mut self) {
        self.stop();
        self.clear();
        self.last_error = None;
    }

    /// Append one streamed line
    pub fn receive(&mut self, message: LogLinePayload) {
        let source_name = message.name.unwrap_or_else(|| {
            self.session_target
                .as_ref()
                .unwrap_or(&self.target)
                .source_name
                .clone()
        });
        self.buffer.push(LogLine::new(source_name, message.line));
    }

    /// Drop all accumulated lines. Status is unchanged.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Dispatch one transport event
    pub fn handle_event(&mut self, event: TransportEvent) -> SessionUpdate {
        if event.session_id != self.session_id || self.transport.is_none() {
            trace!(
                event_session = event.session_id,
                current = self.session_id,
                "ignoring event from released transport"
            );
            return SessionUpdate::Unchanged;
        }

        match event.kind {
            TransportEventKind::Connected => {
                if self.status != SessionStatus::Connecting {
                    return SessionUpdate::Unchanged;
                }
                info!(session_id = self.session_id, "connected");
                self.status = SessionStatus::ConnectedInactive;
                self.emit_start();
                SessionUpdate::StatusChanged(self.status)
            }
            TransportEventKind::Message { event, payload } => self.dispatch_message(&event, payload),
            TransportEventKind::Disconnected(reason) | TransportEventKind::Error(reason) => {
                self.connection_lost(reason)
            }
        }
    }

    fn dispatch_message(&mut self, event: &str, payload: Value) -> SessionUpdate {
        if !self.status.is_connected() {
            return SessionUpdate::Unchanged;
        }

        if event == self.config.events.log_line {
            let message = match payload {
                Value::String(line) => LogLinePayload { name: None, line },
                other => match serde_json::from_value::<LogLinePayload>(other) {
                    Ok(message) => message,
                    Err(e) => {
                        warn!("malformed log line payload: {}", e);
                        return SessionUpdate::Unchanged;
                    }
                },
            };
            self.receive(message);
            SessionUpdate::LinesAppended(1)
        } else if event == self.config.events.tail_status {
            match serde_json::from_value::<TailStatusPayload>(payload) {
                Ok(status) => self.apply_remote_status(status),
                Err(e) => {
                    warn!("malformed tail status payload: {}", e);
                    SessionUpdate::Unchanged
                }
            }
        } else {
            trace!(event, "ignoring unknown event");
            SessionUpdate::Unchanged
        }
    }

    fn apply_remote_status(&mut self, payload: TailStatusPayload) -> SessionUpdate {
        self.start_pending = false;
        let previous = self.status;

        match payload.status {
            TailState::Started => {
                info!(session_id = self.session_id, "backend started tailing");
                self.status = SessionStatus::Active;
                self.last_error = None;
            }
            TailState::Stopped => {
                info!(session_id = self.session_id, "backend stopped tailing");
                self.status = SessionStatus::ConnectedInactive;
            }
            TailState::Error => {
                let message = payload
                    .message
                    .unwrap_or_else(|| "tail failed on the backend".to_string());
                warn!(session_id = self.session_id, "backend tail error: {}", message);
                self.status = SessionStatus::ConnectedInactive;
                self.last_error = Some(SessionError::RemoteTail(message));
            }
        }

        if self.status != previous || payload.status == TailState::Error {
            SessionUpdate::StatusChanged(self.status)
        } else {
            SessionUpdate::Unchanged
        }
    }

    fn emit_start(&mut self) {
        let Some(transport) = &self.transport else {
            return;
        };
        let Some(target) = &self.session_target else {
            return;
        };

        let payload = match serde_json::to_value(target.start_request()) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("cannot encode start request: {}", e);
                return;
            }
        };

        match transport.emit(&self.config.events.start_tail, payload) {
            Ok(()) => {
                debug!(log = %target.source_name, "start request sent");
                self.start_pending = true;
            }
            Err(e) => {
                self.connection_lost(e.to_string());
            }
        }
    }

    fn connection_lost(&mut self, reason: String) -> SessionUpdate {
        warn!(session_id = self.session_id, "connection lost: {}", reason);
        self.release_transport();
        self.status = SessionStatus::Idle;
        self.start_pending = false;
        self.session_target = None;
        self.last_error = Some(SessionError::Connection(reason));
        SessionUpdate::StatusChanged(self.status)
    }

    fn release_transport(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            let closed = transport.close();
            self.track_close(closed);
        }
    }

    fn track_close(&mut self, closed: Closed) {
        self.closing
            .retain_mut(|pending| pending.as_mut().now_or_never().is_none());
        self.closing.push(closed);
    }
}

impl<C: Connector> Drop for SessionController<C> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn validate(target: &TailTarget) -> Result<(), SessionError> {
    if target.source_name.trim().is_empty() {
        return Err(SessionError::MissingSourceName);
    }
    if target.source_path.trim().is_empty() {
        return Err(SessionError::MissingSourcePath);
    }
    if target.host.trim().is_empty() {
        return Err(SessionError::MissingHost);
    }
    Ok(())
}
