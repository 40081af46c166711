use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::TransportError;

/// Everything a connector needs to open one streaming transport
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Tags every event this transport reports
    pub session_id: u64,
    /// Fully resolved WebSocket URL
    pub url: String,
    pub namespace: String,
    pub connect_timeout: Option<Duration>,
}

/// What happened on a transport
#[derive(Clone, Debug, PartialEq)]
pub enum TransportEventKind {
    /// Namespace connect acknowledged; emits are now delivered
    Connected,
    /// Inbound Socket.IO event
    Message { event: String, payload: Value },
    /// Transport closed by the remote side
    Disconnected(String),
    /// Connect failure or stream error
    Error(String),
}

/// Event reported by a transport back to its owner
#[derive(Clone, Debug, PartialEq)]
pub struct TransportEvent {
    pub session_id: u64,
    pub kind: TransportEventKind,
}

impl TransportEvent {
    pub fn new(session_id: u64, kind: TransportEventKind) -> Self {
        Self { session_id, kind }
    }
}

/// Completes once a closed transport has flushed its queued frames and shut down
///
/// Dropping it does not cancel the close.
pub type Closed = BoxFuture<'static, ()>;

/// Handle to one open streaming transport
pub trait Transport: Send {
    /// Queue an outbound event. Delivery order matches call order.
    fn emit(&self, event: &str, payload: Value) -> Result<(), TransportError>;

    /// Disconnect after flushing everything already emitted
    ///
    /// The flush happens in the background; await the returned future to
    /// know when it is done. Closing twice is a no-op.
    fn close(&mut self) -> Closed;
}

/// Opens transports without blocking the caller
///
/// The connection attempt runs in the background; its progress is reported
/// through `events`.
pub trait Connector: Send {
    fn open(
        &self,
        request: ConnectRequest,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Box<dyn Transport>;
}
