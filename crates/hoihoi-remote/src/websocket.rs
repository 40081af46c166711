use std::time::Duration;

use futures::{FutureExt, SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

use crate::error::TransportError;
use crate::protocol::{EnginePacket, SocketPacket};
use crate::transport::{
    Closed, ConnectRequest, Connector, Transport, TransportEvent, TransportEventKind,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = futures::stream::SplitSink<WsStream, Message>;

/// Commands from the transport handle to its connection task
#[derive(Debug)]
enum Command {
    Emit(String),
    Close,
}

/// Opens Socket.IO connections over WebSocket
///
/// Must be used from within a tokio runtime.
#[derive(Clone, Debug, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for WebSocketConnector {
    fn open(
        &self,
        request: ConnectRequest,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Box<dyn Transport> {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let namespace = request.namespace.clone();

        let task = tokio::spawn(run_connection(request, events, commands_rx));

        Box::new(WebSocketTransport {
            namespace,
            commands: commands_tx,
            task: Some(task),
        })
    }
}

/// Handle to a background Socket.IO connection
///
/// Dropping the handle closes the connection after queued frames are sent.
pub struct WebSocketTransport {
    namespace: String,
    commands: mpsc::UnboundedSender<Command>,
    /// Connection task; taken by the first close
    task: Option<JoinHandle<()>>,
}

impl Transport for WebSocketTransport {
    fn emit(&self, event: &str, payload: Value) -> Result<(), TransportError> {
        let frame = SocketPacket::event(&self.namespace, event, payload).to_frame();
        self.commands
            .send(Command::Emit(frame))
            .map_err(|_| TransportError::Closed)
    }

    fn close(&mut self) -> Closed {
        let Some(task) = self.task.take() else {
            return futures::future::ready(()).boxed();
        };
        // Emits queued before this are sent before Close is seen
        let _ = self.commands.send(Command::Close);
        async move {
            if let Err(e) = task.await {
                debug!("connection task ended abnormally: {}", e);
            }
        }
        .boxed()
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        drop(self.close());
    }
}

/// Per-connection protocol state
#[derive(Default)]
struct Link {
    /// Namespace connect acknowledged
    connected: bool,
    /// Emits queued before the namespace was connected
    pending: Vec<String>,
    /// Silence allowed from the server (ping interval + ping timeout)
    heartbeat: Option<Duration>,
}

async fn run_connection(
    request: ConnectRequest,
    events: mpsc::UnboundedSender<TransportEvent>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let session_id = request.session_id;
    let report = |kind: TransportEventKind| events.send(TransportEvent::new(session_id, kind)).is_ok();
    let mut link = Link::default();

    let connecting = connect(&request);
    tokio::pin!(connecting);

    let ws = loop {
        tokio::select! {
            result = &mut connecting => match result {
                Ok(ws) => break ws,
                Err(e) => {
                    warn!(session_id, url = %request.url, "connect failed: {}", e);
                    report(TransportEventKind::Error(e));
                    return;
                }
            },
            command = commands.recv() => match command {
                Some(Command::Emit(frame)) => link.pending.push(frame),
                Some(Command::Close) | None => {
                    debug!(session_id, "connection attempt abandoned");
                    return;
                }
            },
        }
    };

    info!(session_id, url = %request.url, "websocket open");
    let (mut sink, mut stream) = ws.split();

    // Armed by the engine.io handshake, pushed back by every server frame
    let heartbeat = tokio::time::sleep(Duration::ZERO);
    tokio::pin!(heartbeat);

    loop {
        tokio::select! {
            biased;

            command = commands.recv() => match command {
                Some(Command::Emit(frame)) if !link.connected => link.pending.push(frame),
                Some(Command::Emit(frame)) => {
                    trace!(session_id, %frame, "emit");
                    if let Err(e) = sink.send(Message::text(frame)).await {
                        report(TransportEventKind::Error(e.to_string()));
                        break;
                    }
                }
                Some(Command::Close) | None => {
                    if link.connected {
                        let disconnect = SocketPacket::Disconnect {
                            namespace: request.namespace.clone(),
                        };
                        let _ = sink.send(Message::text(disconnect.to_frame())).await;
                    }
                    let _ = sink.close().await;
                    debug!(session_id, "websocket closed by client");
                    break;
                }
            },

            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let outcome = handle_frame(&text, &request, &mut sink, &mut link).await;
                    if let Some(limit) = link.heartbeat {
                        heartbeat.as_mut().reset(Instant::now() + limit);
                    }
                    match outcome {
                        FrameOutcome::Continue => {}
                        FrameOutcome::Report(kind) => {
                            let now_connected = kind == TransportEventKind::Connected;
                            if !report(kind) {
                                break;
                            }
                            if now_connected {
                                if let Err(e) = flush_pending(&mut sink, &mut link).await {
                                    report(TransportEventKind::Error(e));
                                    break;
                                }
                            }
                        }
                        FrameOutcome::Stop(kind) => {
                            report(kind);
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    report(TransportEventKind::Disconnected("connection closed by server".to_string()));
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    report(TransportEventKind::Error(e.to_string()));
                    break;
                }
            },

            () = &mut heartbeat, if link.heartbeat.is_some() => {
                warn!(session_id, "no ping from server, dropping connection");
                report(TransportEventKind::Disconnected("ping timeout".to_string()));
                break;
            }
        }
    }
}

async fn connect(request: &ConnectRequest) -> Result<WsStream, String> {
    if request.url.starts_with("wss://") {
        // Fails only when a provider is already installed
        let _ = rustls::crypto::ring::default_provider().install_default();
    }

    let attempt = tokio_tungstenite::connect_async(request.url.as_str());
    let result = match request.connect_timeout {
        Some(limit) => tokio::time::timeout(limit, attempt)
            .await
            .map_err(|_| format!("timed out after {}s", limit.as_secs_f32()))?,
        None => attempt.await,
    };
    result.map(|(ws, _)| ws).map_err(|e| e.to_string())
}

async fn flush_pending(sink: &mut WsSink, link: &mut Link) -> Result<(), String> {
    for frame in link.pending.drain(..) {
        sink.send(Message::text(frame)).await.map_err(|e| e.to_string())?;
    }
    Ok(())
}

enum FrameOutcome {
    Continue,
    Report(TransportEventKind),
    Stop(TransportEventKind),
}

async fn handle_frame(
    text: &str,
    request: &ConnectRequest,
    sink: &mut WsSink,
    link: &mut Link,
) -> FrameOutcome {
    let packet = match EnginePacket::decode(text) {
        Ok(packet) => packet,
        Err(e) => {
            warn!(session_id = request.session_id, "dropping frame: {}", e);
            return FrameOutcome::Continue;
        }
    };

    match packet {
        EnginePacket::Open(handshake) => {
            debug!(
                session_id = request.session_id,
                sid = %handshake.sid,
                ping_interval = handshake.ping_interval,
                ping_timeout = handshake.ping_timeout,
                "engine.io handshake"
            );
            if handshake.ping_interval > 0 {
                link.heartbeat = Some(Duration::from_millis(
                    handshake.ping_interval + handshake.ping_timeout,
                ));
            }
            let connect = SocketPacket::connect(&request.namespace).to_frame();
            match sink.send(Message::text(connect)).await {
                Ok(()) => FrameOutcome::Continue,
                Err(e) => FrameOutcome::Stop(TransportEventKind::Error(e.to_string())),
            }
        }
        EnginePacket::Ping(data) => match sink.send(Message::text(EnginePacket::Pong(data).encode())).await {
            Ok(()) => FrameOutcome::Continue,
            Err(e) => FrameOutcome::Stop(TransportEventKind::Error(e.to_string())),
        },
        EnginePacket::Close => {
            FrameOutcome::Stop(TransportEventKind::Disconnected("engine.io close".to_string()))
        }
        EnginePacket::Message(body) => handle_socket_packet(&body, request, link),
        EnginePacket::Pong(_) | EnginePacket::Upgrade | EnginePacket::Noop => FrameOutcome::Continue,
    }
}

fn handle_socket_packet(body: &str, request: &ConnectRequest, link: &mut Link) -> FrameOutcome {
    let packet = match SocketPacket::decode(body) {
        Ok(packet) => packet,
        Err(e) => {
            warn!(session_id = request.session_id, "dropping packet: {}", e);
            return FrameOutcome::Continue;
        }
    };

    if packet.namespace() != request.namespace {
        trace!(namespace = packet.namespace(), "packet for another namespace");
        return FrameOutcome::Continue;
    }

    match packet {
        SocketPacket::Connect { .. } => {
            link.connected = true;
            FrameOutcome::Report(TransportEventKind::Connected)
        }
        SocketPacket::Event { name, payload, .. } => FrameOutcome::Report(TransportEventKind::Message {
            event: name,
            payload,
        }),
        SocketPacket::Disconnect { .. } => {
            link.connected = false;
            FrameOutcome::Stop(TransportEventKind::Disconnected(
                "namespace disconnected by server".to_string(),
            ))
        }
        SocketPacket::ConnectError { message, .. } => {
            FrameOutcome::Stop(TransportEventKind::Error(message))
        }
        SocketPacket::Ack { .. } => FrameOutcome::Continue,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::net::TcpListener;

    const HANDSHAKE: &str =
        r#"0{"sid":"s1","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;

    async fn next_text(ws: &mut WebSocketStream<TcpStream>) -> String {
        loop {
            let msg = ws.next().await.unwrap().unwrap();
            if msg.is_text() {
                return msg.to_text().unwrap().to_string();
            }
        }
    }

    /// Accept one client and complete the engine.io and namespace handshakes
    async fn accept_client(listener: TcpListener, handshake: &str) -> WebSocketStream<TcpStream> {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(Message::text(handshake)).await.unwrap();
        assert_eq!(next_text(&mut ws).await, "40");
        ws.send(Message::text(r#"40{"sid":"n1"}"#)).await.unwrap();
        ws
    }

    fn request(session_id: u64, url: String) -> ConnectRequest {
        ConnectRequest {
            session_id,
            url,
            namespace: "/".to_string(),
            connect_timeout: Some(Duration::from_secs(5)),
        }
    }

    fn url(addr: std::net::SocketAddr) -> String {
        format!("ws://{}/socket.io/?EIO=4&transport=websocket", addr)
    }

    async fn next_event(events: &mut mpsc::UnboundedReceiver<TransportEvent>) -> TransportEvent {
        tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_socketio_session_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let mut ws = accept_client(listener, HANDSHAKE).await;

            ws.send(Message::text("2")).await.unwrap();
            assert_eq!(next_text(&mut ws).await, "3");

            ws.send(Message::text(r#"42["log",{"line":"A"}]"#)).await.unwrap();

            assert_eq!(next_text(&mut ws).await, r#"42["stop_tail_f",{}]"#);
            assert_eq!(next_text(&mut ws).await, "41");
        });

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let mut transport = WebSocketConnector::new().open(request(7, url(addr)), events_tx);

        let connected = next_event(&mut events_rx).await;
        assert_eq!(connected, TransportEvent::new(7, TransportEventKind::Connected));

        let message = next_event(&mut events_rx).await;
        assert_eq!(
            message.kind,
            TransportEventKind::Message {
                event: "log".to_string(),
                payload: json!({"line": "A"}),
            }
        );

        transport.emit("stop_tail_f", json!({})).unwrap();
        tokio::time::timeout(Duration::from_secs(5), transport.close())
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_close_flushes_before_runtime_exits() {
        let server_rt = tokio::runtime::Runtime::new().unwrap();
        let listener = server_rt
            .block_on(TcpListener::bind("127.0.0.1:0"))
            .unwrap();
        let addr = listener.local_addr().unwrap();

        let server = server_rt.spawn(async move {
            let mut ws = accept_client(listener, HANDSHAKE).await;
            let mut frames = Vec::new();
            while let Some(Ok(msg)) = ws.next().await {
                if msg.is_text() {
                    frames.push(msg.to_text().unwrap().to_string());
                }
            }
            frames
        });

        let client_rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        client_rt.block_on(async {
            let (events_tx, mut events_rx) = mpsc::unbounded_channel();
            let mut transport = WebSocketConnector::new().open(request(1, url(addr)), events_tx);
            assert_eq!(next_event(&mut events_rx).await.kind, TransportEventKind::Connected);

            transport.emit("stop_tail_f", json!({})).unwrap();
            tokio::time::timeout(Duration::from_secs(5), transport.close())
                .await
                .unwrap();
        });
        drop(client_rt);

        let frames = server_rt
            .block_on(async { tokio::time::timeout(Duration::from_secs(5), server).await })
            .unwrap()
            .unwrap();
        assert_eq!(frames, vec![r#"42["stop_tail_f",{}]"#.to_string(), "41".to_string()]);
    }

    #[tokio::test]
    async fn test_emit_before_namespace_connect_is_delivered_after_it() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let mut ws = accept_client(listener, HANDSHAKE).await;
            next_text(&mut ws).await
        });

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let transport = WebSocketConnector::new().open(request(2, url(addr)), events_tx);
        transport.emit("tail_f", json!({"name": "genesis"})).unwrap();

        assert_eq!(next_event(&mut events_rx).await.kind, TransportEventKind::Connected);
        let first = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first, r#"42["tail_f",{"name":"genesis"}]"#);
    }

    #[tokio::test]
    async fn test_silent_server_is_reported_as_disconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let mut ws = accept_client(
                listener,
                r#"0{"sid":"s1","upgrades":[],"pingInterval":50,"pingTimeout":50,"maxPayload":1000000}"#,
            )
            .await;
            // Never ping; wait for the client to give up
            while let Some(Ok(_)) = ws.next().await {}
        });

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let _transport = WebSocketConnector::new().open(request(4, url(addr)), events_tx);

        assert_eq!(next_event(&mut events_rx).await.kind, TransportEventKind::Connected);
        assert_eq!(
            next_event(&mut events_rx).await.kind,
            TransportEventKind::Disconnected("ping timeout".to_string())
        );

        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_connect_refused_reports_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let _transport = WebSocketConnector::new().open(request(3, url(addr)), events_tx);

        let event = next_event(&mut events_rx).await;
        assert_eq!(event.session_id, 3);
        assert!(matches!(event.kind, TransportEventKind::Error(_)));
    }

    #[tokio::test]
    async fn test_wss_urls_attempt_tls() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Plain TCP peer: the TLS handshake fails, but it is attempted
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let url = format!("wss://{}/socket.io/?EIO=4&transport=websocket", addr);
        let _transport = WebSocketConnector::new().open(request(5, url), events_tx);

        match next_event(&mut events_rx).await.kind {
            TransportEventKind::Error(message) => {
                assert!(!message.contains("TLS support not compiled in"), "{}", message);
            }
            other => panic!("expected a connect error, got {:?}", other),
        }
    }
}
