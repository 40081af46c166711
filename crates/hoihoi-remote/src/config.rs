use std::time::Duration;

/// Event names used on the Socket.IO channel
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventNames {
    /// Outbound: ask the backend to start tailing
    pub start_tail: String,
    /// Outbound: ask the backend to stop tailing
    pub stop_tail: String,
    /// Inbound: one streamed log line
    pub log_line: String,
    /// Inbound: tail started/stopped/error
    pub tail_status: String,
}

impl Default for EventNames {
    fn default() -> Self {
        Self {
            start_tail: "start_tail_f".to_string(),
            stop_tail: "stop_tail_f".to_string(),
            log_line: "log".to_string(),
            tail_status: "tail_f_status".to_string(),
        }
    }
}

/// Connection settings handed to the session controller at construction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend base URL (http, https, ws or wss)
    pub base_url: String,

    /// Engine.IO endpoint path
    pub socket_path: String,

    /// Socket.IO namespace
    pub namespace: String,

    /// Give up on a connection attempt after this long (None = wait forever)
    pub connect_timeout: Option<Duration>,

    pub events: EventNames,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:7776".to_string(),
            socket_path: "/socket.io/".to_string(),
            namespace: "/".to_string(),
            // Matches the stock Socket.IO client timeout
            connect_timeout: Some(Duration::from_secs(20)),
            events: EventNames::default(),
        }
    }
}
