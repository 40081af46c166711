use thiserror::Error;

/// Malformed or unsupported Engine.IO / Socket.IO frame
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("empty packet")]
    Empty,

    #[error("unknown engine.io packet type '{0}'")]
    UnknownEngineType(char),

    #[error("unknown socket.io packet type '{0}'")]
    UnknownSocketType(char),

    #[error("binary socket.io packets are not supported")]
    BinaryUnsupported,

    #[error("malformed packet: {0}")]
    Malformed(String),

    #[error("invalid JSON in packet: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid backend url '{0}'")]
    InvalidUrl(String),
}

/// Failure talking to the streaming transport
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is closed")]
    Closed,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
