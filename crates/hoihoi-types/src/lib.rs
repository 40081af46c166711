//! Shared types for hoihoi
//!
//! This crate contains data structures used across multiple hoihoi crates.

use ratatui::style::Color;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============================================================================
// Tail Targets
// ============================================================================

/// A named log file that can be tailed (one entry in the log catalog)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSource {
    pub name: String,
    pub path: String,
}

impl LogSource {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Which remote file on which host a tail session addresses
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TailTarget {
    /// Logical name of the tailed file (e.g. "genesis")
    pub source_name: String,

    /// Absolute path of the file on the remote host
    pub source_path: String,

    /// Address of the host running the file (CVM IP)
    pub host: String,
}

impl TailTarget {
    pub fn new(
        source_name: impl Into<String>,
        source_path: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            source_path: source_path.into(),
            host: host.into(),
        }
    }

    /// Build a target from a catalog entry on the given host
    pub fn from_source(source: &LogSource, host: impl Into<String>) -> Self {
        Self::new(source.name.clone(), source.path.clone(), host)
    }

    /// Outbound start-tail payload for this target
    pub fn start_request(&self) -> StartTailRequest {
        StartTailRequest {
            cvm_ip: self.host.clone(),
            log_path: self.source_path.clone(),
            log_name: self.source_name.clone(),
        }
    }
}

// ============================================================================
// Session State
// ============================================================================

/// Lifecycle state of the realtime tail session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SessionStatus {
    /// No transport
    #[default]
    Idle,
    /// Transport is being opened
    Connecting,
    /// Transport is up but the backend has not reported a running tail
    ConnectedInactive,
    /// Backend reported the tail as started
    Active,
    /// Teardown in progress
    Stopping,
}

impl SessionStatus {
    /// Short display label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::ConnectedInactive => "connected",
            Self::Active => "tailing",
            Self::Stopping => "stopping",
        }
    }

    /// Indicator color for this status
    pub fn color(&self) -> Color {
        match self {
            Self::Idle => Color::DarkGray,
            Self::Connecting | Self::Stopping => Color::Yellow,
            Self::ConnectedInactive => Color::Cyan,
            Self::Active => Color::Green,
        }
    }

    /// Whether a transport is held in this state
    pub fn has_transport(&self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::ConnectedInactive | Self::Active
        )
    }

    /// Whether the transport is connected in this state
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::ConnectedInactive | Self::Active)
    }
}

// ============================================================================
// Log Types
// ============================================================================

/// One received line of streamed output
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogLine {
    /// Logical name of the stream this line came from
    pub source_name: String,

    /// Raw line content as received
    pub text: String,
}

impl LogLine {
    pub fn new(source_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            text: text.into(),
        }
    }
}

/// Reference-counted log line (cheap to clone for rendering)
pub type SharedLogLine = Arc<LogLine>;

// ============================================================================
// Wire Payloads
// ============================================================================

/// Outbound "start tailing" payload
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartTailRequest {
    pub cvm_ip: String,
    pub log_path: String,
    pub log_name: String,
}

/// Inbound log line payload
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLinePayload {
    #[serde(default)]
    pub name: Option<String>,
    pub line: String,
}

/// Tail state reported by the backend
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TailState {
    Started,
    Stopped,
    Error,
}

/// Inbound tail status payload
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TailStatusPayload {
    pub status: TailState,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_request_payload() {
        let target = TailTarget::new("genesis", "/home/nutanix/data/logs/genesis.out", "10.0.0.1");
        let json = serde_json::to_value(target.start_request()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "cvm_ip": "10.0.0.1",
                "log_path": "/home/nutanix/data/logs/genesis.out",
                "log_name": "genesis",
            })
        );
    }

    #[test]
    fn test_log_line_payload_without_name() {
        let payload: LogLinePayload = serde_json::from_str(r#"{"line":"hello"}"#).unwrap();
        assert_eq!(payload.name, None);
        assert_eq!(payload.line, "hello");
    }

    #[test]
    fn test_status_payload() {
        let payload: TailStatusPayload =
            serde_json::from_str(r#"{"status":"error","message":"ssh failed"}"#).unwrap();
        assert_eq!(payload.status, TailState::Error);
        assert_eq!(payload.message.as_deref(), Some("ssh failed"));

        let payload: TailStatusPayload = serde_json::from_str(r#"{"status":"started"}"#).unwrap();
        assert_eq!(payload.status, TailState::Started);
        assert_eq!(payload.message, None);
    }
}
