//! Streaming transport for hoihoi
//!
//! This crate speaks Socket.IO (Engine.IO v4 over WebSocket) to the Log
//! Hoihoi backend and reports connection progress and inbound events over a
//! channel.

mod config;
mod error;
pub mod protocol;
mod transport;
mod websocket;

pub use config::{ClientConfig, EventNames};
pub use error::{ProtocolError, TransportError};
pub use protocol::{normalize_namespace, socket_url};
pub use transport::{
    Closed, ConnectRequest, Connector, Transport, TransportEvent, TransportEventKind,
};
pub use websocket::{WebSocketConnector, WebSocketTransport};
