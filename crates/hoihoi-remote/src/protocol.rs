//! Engine.IO v4 / Socket.IO v5 text framing
//!
//! Only the subset the tail feed uses is supported: text packets, the default
//! or a named namespace, events with a single JSON argument. Binary
//! attachments are rejected.

use serde::Deserialize;
use serde_json::Value;

use crate::error::ProtocolError;

/// Engine.IO protocol revision sent in the handshake query
pub const ENGINE_IO_VERSION: u8 = 4;

/// Handshake data carried by the Engine.IO open packet
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    #[serde(default)]
    pub ping_interval: u64,
    #[serde(default)]
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: u64,
}

/// Engine.IO packet (outer framing)
#[derive(Clone, Debug, PartialEq)]
pub enum EnginePacket {
    Open(OpenHandshake),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    /// Decode one text frame
    pub fn decode(frame: &str) -> Result<Self, ProtocolError> {
        let mut chars = frame.chars();
        let kind = chars.next().ok_or(ProtocolError::Empty)?;
        let body = chars.as_str();

        match kind {
            '0' => Ok(Self::Open(serde_json::from_str(body)?)),
            '1' => Ok(Self::Close),
            '2' => Ok(Self::Ping(body.to_string())),
            '3' => Ok(Self::Pong(body.to_string())),
            '4' => Ok(Self::Message(body.to_string())),
            '5' => Ok(Self::Upgrade),
            '6' => Ok(Self::Noop),
            other => Err(ProtocolError::UnknownEngineType(other)),
        }
    }

    /// Encode as a text frame
    pub fn encode(&self) -> String {
        match self {
            // Clients never send open; the handshake is server-initiated
            Self::Open(_) => "0".to_string(),
            Self::Close => "1".to_string(),
            Self::Ping(data) => format!("2{}", data),
            Self::Pong(data) => format!("3{}", data),
            Self::Message(data) => format!("4{}", data),
            Self::Upgrade => "5".to_string(),
            Self::Noop => "6".to_string(),
        }
    }
}

/// Socket.IO packet (carried inside an Engine.IO message)
#[derive(Clone, Debug, PartialEq)]
pub enum SocketPacket {
    Connect {
        namespace: String,
        data: Option<Value>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        id: Option<u64>,
        name: String,
        payload: Value,
    },
    Ack {
        namespace: String,
        id: u64,
    },
    ConnectError {
        namespace: String,
        message: String,
    },
}

impl SocketPacket {
    /// Connect request for a namespace
    pub fn connect(namespace: &str) -> Self {
        Self::Connect {
            namespace: namespace.to_string(),
            data: None,
        }
    }

    /// Event with a single argument
    pub fn event(namespace: &str, name: &str, payload: Value) -> Self {
        Self::Event {
            namespace: namespace.to_string(),
            id: None,
            name: name.to_string(),
            payload,
        }
    }

    /// Namespace this packet belongs to
    pub fn namespace(&self) -> &str {
        match self {
            Self::Connect { namespace, .. }
            | Self::Disconnect { namespace }
            | Self::Event { namespace, .. }
            | Self::Ack { namespace, .. }
            | Self::ConnectError { namespace, .. } => namespace,
        }
    }

    /// Decode the body of an Engine.IO message packet
    pub fn decode(body: &str) -> Result<Self, ProtocolError> {
        let mut chars = body.chars();
        let kind = chars.next().ok_or(ProtocolError::Empty)?;
        let mut rest = chars.as_str();

        // Namespace: "/name," prefix, absent for the default namespace
        let namespace = if rest.starts_with('/') {
            match rest.find(',') {
                Some(comma) => {
                    let ns = &rest[..comma];
                    rest = &rest[comma + 1..];
                    ns.to_string()
                }
                None => {
                    let ns = rest.to_string();
                    rest = "";
                    ns
                }
            }
        } else {
            "/".to_string()
        };

        // Optional ack id
        let digits = rest.bytes().take_while(|b| b.is_ascii_digit()).count();
        let id = if digits > 0 {
            let id = rest[..digits]
                .parse::<u64>()
                .map_err(|_| ProtocolError::Malformed(body.to_string()))?;
            rest = &rest[digits..];
            Some(id)
        } else {
            None
        };

        match kind {
            '0' => {
                let data = if rest.is_empty() {
                    None
                } else {
                    Some(serde_json::from_str(rest)?)
                };
                Ok(Self::Connect { namespace, data })
            }
            '1' => Ok(Self::Disconnect { namespace }),
            '2' => {
                let args: Vec<Value> = serde_json::from_str(rest)?;
                let mut args = args.into_iter();
                let name = match args.next() {
                    Some(Value::String(name)) => name,
                    _ => return Err(ProtocolError::Malformed(body.to_string())),
                };
                let payload = args.next().unwrap_or(Value::Null);
                Ok(Self::Event {
                    namespace,
                    id,
                    name,
                    payload,
                })
            }
            '3' => Ok(Self::Ack {
                namespace,
                id: id.ok_or_else(|| ProtocolError::Malformed(body.to_string()))?,
            }),
            '4' => {
                let message = match serde_json::from_str::<Value>(rest)? {
                    Value::String(s) => s,
                    Value::Object(map) => map
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("connection refused")
                        .to_string(),
                    other => other.to_string(),
                };
                Ok(Self::ConnectError { namespace, message })
            }
            '5' | '6' => Err(ProtocolError::BinaryUnsupported),
            other => Err(ProtocolError::UnknownSocketType(other)),
        }
    }

    /// Encode as the body of an Engine.IO message packet
    pub fn encode(&self) -> String {
        let (kind, namespace) = match self {
            Self::Connect { namespace, .. } => ('0', namespace),
            Self::Disconnect { namespace } => ('1', namespace),
            Self::Event { namespace, .. } => ('2', namespace),
            Self::Ack { namespace, .. } => ('3', namespace),
            Self::ConnectError { namespace, .. } => ('4', namespace),
        };

        let mut out = String::new();
        out.push(kind);
        if namespace != "/" && !namespace.is_empty() {
            out.push_str(namespace);
            out.push(',');
        }

        match self {
            Self::Connect { data: Some(data), .. } => out.push_str(&data.to_string()),
            Self::Connect { data: None, .. } | Self::Disconnect { .. } => {}
            Self::Event {
                id, name, payload, ..
            } => {
                if let Some(id) = id {
                    out.push_str(&id.to_string());
                }
                let args = Value::Array(vec![Value::String(name.clone()), payload.clone()]);
                out.push_str(&args.to_string());
            }
            Self::Ack { id, .. } => {
                out.push_str(&id.to_string());
                out.push_str("[]");
            }
            Self::ConnectError { message, .. } => {
                out.push_str(&serde_json::json!({ "message": message }).to_string());
            }
        }

        out
    }

    /// Wrap in an Engine.IO message frame
    pub fn to_frame(&self) -> String {
        EnginePacket::Message(self.encode()).encode()
    }
}

/// Canonical namespace form: leading slash, no trailing slash, "/" for default
pub fn normalize_namespace(namespace: &str) -> String {
    let trimmed = namespace.trim().trim_matches('/');
    format!("/{}", trimmed)
}

/// Build the WebSocket endpoint for a backend base URL
///
/// `http://host:5000` becomes `ws://host:5000/socket.io/?EIO=4&transport=websocket`.
pub fn socket_url(base_url: &str, path: &str) -> Result<String, ProtocolError> {
    let base = base_url.trim().trim_end_matches('/');
    if base.is_empty() {
        return Err(ProtocolError::InvalidUrl(base_url.to_string()));
    }

    let (scheme, rest) = match base.split_once("://") {
        Some(("http", rest)) | Some(("ws", rest)) => ("ws", rest),
        Some(("https", rest)) | Some(("wss", rest)) => ("wss", rest),
        Some(_) => return Err(ProtocolError::InvalidUrl(base_url.to_string())),
        None => ("ws", base),
    };
    if rest.is_empty() {
        return Err(ProtocolError::InvalidUrl(base_url.to_string()));
    }

    let path = path.trim_matches('/');
    let path = if path.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", path)
    };

    Ok(format!(
        "{}://{}{}?EIO={}&transport=websocket",
        scheme, rest, path, ENGINE_IO_VERSION
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_open() {
        let frame = r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;
        match EnginePacket::decode(frame).unwrap() {
            EnginePacket::Open(handshake) => {
                assert_eq!(handshake.sid, "abc");
                assert_eq!(handshake.ping_interval, 25000);
            }
            other => panic!("unexpected packet: {:?}", other),
        }
    }

    #[test]
    fn test_ping_is_answered_with_matching_pong() {
        let ping = EnginePacket::decode("2").unwrap();
        assert_eq!(ping, EnginePacket::Ping(String::new()));
        assert_eq!(EnginePacket::Pong(String::new()).encode(), "3");
    }

    #[test]
    fn test_decode_event_default_namespace() {
        let packet = SocketPacket::decode(r#"2["log",{"name":"genesis","line":"A"}]"#).unwrap();
        assert_eq!(
            packet,
            SocketPacket::Event {
                namespace: "/".to_string(),
                id: None,
                name: "log".to_string(),
                payload: json!({"name": "genesis", "line": "A"}),
            }
        );
    }

    #[test]
    fn test_decode_event_named_namespace_with_ack_id() {
        let packet = SocketPacket::decode(r#"2/tail,12["tail_f_status",{"status":"started"}]"#)
            .unwrap();
        match packet {
            SocketPacket::Event {
                namespace, id, name, ..
            } => {
                assert_eq!(namespace, "/tail");
                assert_eq!(id, Some(12));
                assert_eq!(name, "tail_f_status");
            }
            other => panic!("unexpected packet: {:?}", other),
        }
    }

    #[test]
    fn test_event_without_argument_has_null_payload() {
        let packet = SocketPacket::decode(r#"2["ping_me"]"#).unwrap();
        match packet {
            SocketPacket::Event { payload, .. } => assert_eq!(payload, Value::Null),
            other => panic!("unexpected packet: {:?}", other),
        }
    }

    #[test]
    fn test_encode_event_frames() {
        let stop = SocketPacket::event("/", "stop_tail_f", json!({}));
        assert_eq!(stop.to_frame(), r#"42["stop_tail_f",{}]"#);

        let namespaced = SocketPacket::event("/tail", "stop_tail_f", json!({}));
        assert_eq!(namespaced.to_frame(), r#"42/tail,["stop_tail_f",{}]"#);
    }

    #[test]
    fn test_encode_connect() {
        assert_eq!(SocketPacket::connect("/").to_frame(), "40");
        assert_eq!(SocketPacket::connect("/tail").to_frame(), "40/tail,");
    }

    #[test]
    fn test_decode_connect_ack_and_error() {
        let ack = SocketPacket::decode(r#"0{"sid":"xyz"}"#).unwrap();
        assert!(matches!(ack, SocketPacket::Connect { .. }));

        let err = SocketPacket::decode(r#"4{"message":"not authorized"}"#).unwrap();
        assert_eq!(
            err,
            SocketPacket::ConnectError {
                namespace: "/".to_string(),
                message: "not authorized".to_string(),
            }
        );
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(EnginePacket::decode("").is_err());
        assert!(EnginePacket::decode("9").is_err());
        assert!(SocketPacket::decode(r#"2{"not":"an array"}"#).is_err());
        assert!(SocketPacket::decode(r#"5-["bin",{"_placeholder":true,"num":0}]"#).is_err());
    }

    #[test]
    fn test_normalize_namespace() {
        assert_eq!(normalize_namespace(""), "/");
        assert_eq!(normalize_namespace("/"), "/");
        assert_eq!(normalize_namespace("tail"), "/tail");
        assert_eq!(normalize_namespace("/tail/"), "/tail");
    }

    #[test]
    fn test_socket_url() {
        assert_eq!(
            socket_url("http://10.0.0.5:5000/", "/socket.io/").unwrap(),
            "ws://10.0.0.5:5000/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            socket_url("https://hoihoi.example.com", "socket.io").unwrap(),
            "wss://hoihoi.example.com/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            socket_url("localhost:5000", "socket.io").unwrap(),
            "ws://localhost:5000/socket.io/?EIO=4&transport=websocket"
        );
        assert!(socket_url("", "socket.io").is_err());
        assert!(socket_url("ftp://host", "socket.io").is_err());
    }
}
