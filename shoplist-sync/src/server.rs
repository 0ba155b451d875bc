//! WebSocket server for live list updates.
//!
//! Architecture:
//! ```text
//! Browser A ──┐                              ┌── RoomRegistry
//!              ├── ConnectionGateway ─────────┤
//! Browser B ──┘   (accept / join / close)     └── Connections (outbound queues)
//!                                                      ▲
//! mutation API ── EventBroadcaster::publish ───────────┘
//! ```
//!
//! Each socket gets one task. It authenticates from the upgrade request,
//! then multiplexes two sources: frames from the client (`join`, `ping`)
//! and frames queued for it by the broadcaster.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::broadcast::EventBroadcaster;
use crate::connection::{ConnectionId, Connections, Frame};
use crate::gateway::{ConnectionGateway, GatewayError};
use crate::protocol::{ClientFrame, ControlFrame, ProtocolError};
use crate::registry::RoomRegistry;
use crate::session::{session_token, SessionVerifier};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: String,
    /// Frames buffered per connection before publishes start dropping
    pub outbound_capacity: usize,
    /// Cookie carrying the session token
    pub session_cookie: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:9090".to_string(),
            outbound_capacity: 256,
            session_cookie: "shoplist.session".to_string(),
        }
    }
}

/// Server statistics.
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    pub total_connections: u64,
    pub active_connections: u64,
    pub frames_received: u64,
    pub rejected_joins: u64,
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),
}

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// The live-update server.
pub struct SyncServer {
    config: ServerConfig,
    gateway: ConnectionGateway,
    broadcaster: EventBroadcaster,
    sessions: Arc<dyn SessionVerifier>,
    stats: Arc<RwLock<ServerStats>>,
}

impl SyncServer {
    pub fn new(config: ServerConfig, sessions: Arc<dyn SessionVerifier>) -> Self {
        let registry = Arc::new(RoomRegistry::new());
        let connections = Arc::new(Connections::new());
        let gateway = ConnectionGateway::new(
            registry.clone(),
            connections.clone(),
            config.outbound_capacity,
        );
        let broadcaster = EventBroadcaster::new(registry, connections);

        Self {
            config,
            gateway,
            broadcaster,
            sessions,
            stats: Arc::new(RwLock::new(ServerStats::default())),
        }
    }

    /// Create with default configuration.
    pub fn with_defaults(sessions: Arc<dyn SessionVerifier>) -> Self {
        Self::new(ServerConfig::default(), sessions)
    }

    /// Bind the configured address and serve forever.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: self.config.bind_addr.clone(),
                source,
            })?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        if let Ok(addr) = listener.local_addr() {
            log::info!("Sync server listening on {addr}");
        }

        loop {
            let (stream, addr) = listener.accept().await.map_err(ServerError::Accept)?;
            log::debug!("New TCP connection from {addr}");

            let gateway = self.gateway.clone();
            let sessions = self.sessions.clone();
            let stats = self.stats.clone();
            let cookie = self.config.session_cookie.clone();

            tokio::spawn(async move {
                if let Err(e) =
                    Self::handle_connection(stream, addr, gateway, sessions, stats, cookie).await
                {
                    log::error!("Connection error from {addr}: {e}");
                }
            });
        }
    }

    /// Handle a single WebSocket connection from handshake to teardown.
    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        gateway: ConnectionGateway,
        sessions: Arc<dyn SessionVerifier>,
        stats: Arc<RwLock<ServerStats>>,
        cookie: String,
    ) -> Result<(), ProtocolError> {
        let mut token = None;
        let ws_stream = tokio_tungstenite::accept_hdr_async(
            stream,
            |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                token = session_token(req.headers(), &cookie);
                Ok(resp)
            },
        )
        .await?;

        let identity = token.and_then(|t| sessions.verify(&t));
        if identity.is_none() {
            log::debug!("No valid session on connection from {addr}");
        }

        let (conn, outbound) = gateway.accept(identity).await;
        {
            let mut s = stats.write().await;
            s.total_connections += 1;
            s.active_connections += 1;
        }

        let result = Self::pump(ws_stream, conn, outbound, &gateway, &stats).await;

        // Runs on every exit path, including transport errors.
        gateway.on_disconnect(conn).await;
        {
            let mut s = stats.write().await;
            s.active_connections = s.active_connections.saturating_sub(1);
        }
        log::info!("Connection closed from {addr} ({conn})");
        result
    }

    async fn pump(
        ws_stream: WebSocketStream<TcpStream>,
        conn: ConnectionId,
        mut outbound: mpsc::Receiver<Frame>,
        gateway: &ConnectionGateway,
        stats: &RwLock<ServerStats>,
    ) -> Result<(), ProtocolError> {
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        loop {
            tokio::select! {
                msg = ws_receiver.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            stats.write().await.frames_received += 1;
                            match ClientFrame::decode(text.as_str()) {
                                Ok(ClientFrame::Join { list_slug }) => {
                                    match gateway.on_join_request(conn, list_slug.clone()).await {
                                        // Written straight to the socket; the outbound
                                        // queue may be full of events.
                                        Ok(_) => {
                                            send_control(&mut ws_sender, &ControlFrame::Joined { list_slug }).await?;
                                        }
                                        Err(e @ GatewayError::JoinWithoutIdentity(_)) => {
                                            stats.write().await.rejected_joins += 1;
                                            send_control(&mut ws_sender, &ControlFrame::error(e.to_string())).await?;
                                            ws_sender.send(Message::Close(None)).await?;
                                            return Ok(());
                                        }
                                        Err(e) => {
                                            log::error!("Join failed for {conn}: {e}");
                                            send_control(&mut ws_sender, &ControlFrame::error(e.to_string())).await?;
                                        }
                                    }
                                }
                                Ok(ClientFrame::Ping) => {
                                    send_control(&mut ws_sender, &ControlFrame::Pong).await?;
                                }
                                Err(e) => {
                                    log::warn!("Bad frame from {conn}: {e}");
                                    send_control(&mut ws_sender, &ControlFrame::error(e.to_string())).await?;
                                }
                            }
                        }

                        Some(Ok(Message::Ping(data))) => {
                            ws_sender.send(Message::Pong(data)).await?;
                        }

                        Some(Ok(Message::Close(_))) | None => return Ok(()),

                        Some(Err(e)) => {
                            log::error!("WebSocket error on {conn}: {e}");
                            return Ok(());
                        }

                        _ => {}
                    }
                }

                frame = outbound.recv() => {
                    match frame {
                        Some(frame) => {
                            ws_sender.send(Message::text(frame.as_ref().to_owned())).await?;
                        }
                        // Gateway dropped this connection.
                        None => {
                            let _ = ws_sender.send(Message::Close(None)).await;
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    /// Handle for the mutation API to publish events with.
    pub fn broadcaster(&self) -> EventBroadcaster {
        self.broadcaster.clone()
    }

    pub fn gateway(&self) -> &ConnectionGateway {
        &self.gateway
    }

    pub async fn stats(&self) -> ServerStats {
        self.stats.read().await.clone()
    }

    pub fn bind_addr(&self) -> &str {
        &self.config.bind_addr
    }
}

async fn send_control(sink: &mut WsSink, frame: &ControlFrame) -> Result<(), ProtocolError> {
    sink.send(Message::text(frame.encode()?)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::StaticSessions;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1:9090");
        assert_eq!(config.outbound_capacity, 256);
        assert_eq!(config.session_cookie, "shoplist.session");
    }

    #[tokio::test]
    async fn test_server_stats_initial() {
        let server = SyncServer::with_defaults(Arc::new(StaticSessions::new()));
        let stats = server.stats().await;
        assert_eq!(stats.total_connections, 0);
        assert_eq!(stats.active_connections, 0);
        assert_eq!(stats.frames_received, 0);
        assert_eq!(server.bind_addr(), "127.0.0.1:9090");
    }

    #[tokio::test]
    async fn test_bind_failure_reported() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = ServerConfig {
            bind_addr: taken.local_addr().unwrap().to_string(),
            ..ServerConfig::default()
        };
        let server = SyncServer::new(config, Arc::new(StaticSessions::new()));
        assert!(matches!(server.run().await, Err(ServerError::Bind { .. })));
    }
}
