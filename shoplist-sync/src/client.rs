//! WebSocket client for following one list's live updates.
//!
//! Provides:
//! - Connection lifecycle (connect, join, disconnect, reconnect)
//! - Session token on the upgrade request
//! - Decoded, validated events on a single ordered channel
//!
//! The client only reports itself [`ConnectionState::Connected`] once the
//! server has acknowledged the join. Nothing is replayed across a
//! reconnect; a `Joined { rejoined: true }` event tells the owner to
//! refetch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use shoplist_core::{ListEvent, ListSlug};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header, HeaderValue};
use tokio_tungstenite::tungstenite::Message;

use crate::protocol::{ClientFrame, ControlFrame, ProtocolError, ServerFrame};

/// Client connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// Socket opening or join not yet acknowledged.
    Connecting,
    /// Same as `Connecting`, after an earlier successful join.
    Reconnecting,
    Connected,
}

/// Events emitted by the sync client, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// The server acknowledged our join.
    Joined { list_slug: ListSlug, rejoined: bool },
    /// A list mutation published by the server.
    Remote(ListEvent),
    /// The server refused a request; carries its message.
    Rejected(String),
    /// Connection lost or closed.
    Disconnected,
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Buffered events before the reader task waits on the application
    pub event_capacity: usize,
    /// Cookie the server reads the session token from
    pub session_cookie: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            event_capacity: 256,
            session_cookie: "shoplist.session".to_string(),
        }
    }
}

/// The sync client.
pub struct SyncClient {
    list_slug: ListSlug,
    server_url: String,
    session_token: Option<String>,
    config: ClientConfig,

    state: Arc<RwLock<ConnectionState>>,
    has_joined: Arc<AtomicBool>,

    /// Channel to the WebSocket writer task
    outgoing_tx: Option<mpsc::Sender<Message>>,
    writer: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,

    event_rx: Option<mpsc::Receiver<SyncEvent>>,
    event_tx: mpsc::Sender<SyncEvent>,
}

impl SyncClient {
    pub fn new(list_slug: ListSlug, server_url: impl Into<String>) -> Self {
        Self::with_config(list_slug, server_url, ClientConfig::default())
    }

    pub fn with_config(
        list_slug: ListSlug,
        server_url: impl Into<String>,
        config: ClientConfig,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(config.event_capacity.max(1));
        Self {
            list_slug,
            server_url: server_url.into(),
            session_token: None,
            config,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            has_joined: Arc::new(AtomicBool::new(false)),
            outgoing_tx: None,
            writer: None,
            reader: None,
            event_rx: Some(event_rx),
            event_tx,
        }
    }

    /// Attach the session token sent with every connect.
    pub fn with_session(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<SyncEvent>> {
        self.event_rx.take()
    }

    /// Open the socket and request to join the list's room.
    ///
    /// Returns once the join frame is queued; the state becomes `Connected`
    /// when the acknowledgment arrives. Any socket still open from an
    /// earlier call is closed first, so the server never holds two
    /// memberships for this client.
    pub async fn connect(&mut self) -> Result<(), ProtocolError> {
        self.close_socket().await;
        // A stale reader must not report `Disconnected` over the new session.
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }

        let pending = if self.has_joined.load(Ordering::SeqCst) {
            ConnectionState::Reconnecting
        } else {
            ConnectionState::Connecting
        };
        *self.state.write().await = pending;

        let ws_stream = match self.open().await {
            Ok(ws) => ws,
            Err(e) => {
                *self.state.write().await = ConnectionState::Disconnected;
                return Err(e);
            }
        };
        let (mut ws_writer, mut ws_reader) = ws_stream.split();

        // Writer task: forward outgoing channel to WebSocket
        let (out_tx, mut out_rx) = mpsc::channel::<Message>(64);
        self.writer = Some(tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if ws_writer.send(msg).await.is_err() || closing {
                    break;
                }
            }
        }));

        let join = ClientFrame::join(self.list_slug.clone()).encode()?;
        out_tx
            .send(Message::text(join))
            .await
            .map_err(|_| ProtocolError::ConnectionClosed)?;
        self.outgoing_tx = Some(out_tx);

        // Reader task: decode frames, forward events in order
        let event_tx = self.event_tx.clone();
        let state = self.state.clone();
        let has_joined = self.has_joined.clone();
        let list_slug = self.list_slug.clone();
        self.reader = Some(tokio::spawn(async move {
            while let Some(msg) = ws_reader.next().await {
                let text = match msg {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) | Err(_) => break,
                    _ => continue,
                };

                let event = match ServerFrame::decode(text.as_str()) {
                    Ok(ServerFrame::Event(event)) => Some(SyncEvent::Remote(event)),
                    Ok(ServerFrame::Control(ControlFrame::Joined { list_slug: joined })) => {
                        if joined != list_slug {
                            log::warn!("Join ack for {joined}, expected {list_slug}");
                            continue;
                        }
                        *state.write().await = ConnectionState::Connected;
                        let rejoined = has_joined.swap(true, Ordering::SeqCst);
                        log::info!("Joined {joined} (rejoined: {rejoined})");
                        Some(SyncEvent::Joined {
                            list_slug: joined,
                            rejoined,
                        })
                    }
                    Ok(ServerFrame::Control(ControlFrame::Pong)) => None,
                    Ok(ServerFrame::Control(ControlFrame::Error { message })) => {
                        log::warn!("Server rejected request: {message}");
                        Some(SyncEvent::Rejected(message))
                    }
                    Err(e @ ProtocolError::MalformedEvent { .. }) => {
                        log::warn!("Dropping {e}");
                        None
                    }
                    Err(e) => {
                        log::warn!("Ignoring undecodable frame: {e}");
                        None
                    }
                };

                if let Some(evt) = event {
                    if event_tx.send(evt).await.is_err() {
                        break;
                    }
                }
            }

            // Connection lost
            *state.write().await = ConnectionState::Disconnected;
            let _ = event_tx.send(SyncEvent::Disconnected).await;
        }));

        Ok(())
    }

    async fn open(
        &self,
    ) -> Result<
        tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
        ProtocolError,
    > {
        let mut request = self.server_url.as_str().into_client_request()?;
        if let Some(token) = &self.session_token {
            let cookie = format!("{}={token}", self.config.session_cookie);
            let value = HeaderValue::from_str(&cookie)
                .map_err(|e| ProtocolError::InvalidHeader(e.to_string()))?;
            request.headers_mut().insert(header::COOKIE, value);
        }
        let (ws_stream, _) = tokio_tungstenite::connect_async(request).await?;
        Ok(ws_stream)
    }

    /// Close the socket. The reader task reports `Disconnected` once the
    /// server finishes the close handshake.
    pub async fn disconnect(&mut self) {
        self.close_socket().await;
        *self.state.write().await = ConnectionState::Disconnected;
    }

    /// Send `Close` and wait for the writer task to flush it.
    async fn close_socket(&mut self) {
        if let Some(tx) = self.outgoing_tx.take() {
            let _ = tx.send(Message::Close(None)).await;
        }
        if let Some(writer) = self.writer.take() {
            let _ = writer.await;
        }
    }

    pub async fn send_ping(&self) -> Result<(), ProtocolError> {
        let encoded = ClientFrame::Ping.encode()?;
        match &self.outgoing_tx {
            Some(tx) => tx
                .send(Message::text(encoded))
                .await
                .map_err(|_| ProtocolError::ConnectionClosed),
            None => Err(ProtocolError::ConnectionClosed),
        }
    }

    pub async fn connection_state(&self) -> ConnectionState {
        *self.state.read().await
    }

    pub fn list_slug(&self) -> &ListSlug {
        &self.list_slug
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }
}
