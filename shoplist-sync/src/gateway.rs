//! Connection gateway: per-connection lifecycle on the server.
//!
//! The transport calls in here for three things:
//!
//! 1. [`ConnectionGateway::accept`] when a socket completes its handshake,
//! 2. [`ConnectionGateway::on_join_request`] for each `join` frame,
//! 3. [`ConnectionGateway::on_disconnect`] when the socket goes away.
//!
//! A join is registered before the caller writes its `joined`
//! acknowledgment, so a client that waits for the ack cannot miss an event
//! published after it. The ack bypasses the outbound queue: a queue full of
//! events must not leave the client stuck waiting for it.

use std::sync::Arc;

use shoplist_core::{ListSlug, UserIdentity};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::connection::{ConnectionId, Connections, Frame};
use crate::registry::{JoinOutcome, RoomRegistry};

#[derive(Error, Debug)]
pub enum GatewayError {
    /// The connection has no authenticated session; it has been closed.
    #[error("join from {0} without an authenticated session")]
    JoinWithoutIdentity(ConnectionId),
    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),
}

/// Routes connection lifecycle events to the room registry.
#[derive(Debug, Clone)]
pub struct ConnectionGateway {
    registry: Arc<RoomRegistry>,
    connections: Arc<Connections>,
    outbound_capacity: usize,
}

impl ConnectionGateway {
    pub fn new(
        registry: Arc<RoomRegistry>,
        connections: Arc<Connections>,
        outbound_capacity: usize,
    ) -> Self {
        Self {
            registry,
            connections,
            outbound_capacity,
        }
    }

    /// Register a new connection.
    ///
    /// `identity` is the user the handshake's session resolved to, if any.
    /// Returns the connection id and the queue the transport must drain.
    pub async fn accept(
        &self,
        identity: Option<UserIdentity>,
    ) -> (ConnectionId, mpsc::Receiver<Frame>) {
        let who = identity
            .as_ref()
            .map(|u| u.display_name().to_owned())
            .unwrap_or_else(|| "anonymous".to_owned());
        let (id, rx) = self
            .connections
            .insert(identity, self.outbound_capacity)
            .await;
        log::info!("Connection {id} accepted for {who}");
        (id, rx)
    }

    /// Subscribe `conn` to `room`.
    ///
    /// On success the caller owes the client a `joined` acknowledgment.
    pub async fn on_join_request(
        &self,
        conn: ConnectionId,
        room: ListSlug,
    ) -> Result<JoinOutcome, GatewayError> {
        let handle = self
            .connections
            .get(&conn)
            .await
            .ok_or(GatewayError::UnknownConnection(conn))?;

        let Some(user) = handle.identity.as_ref() else {
            log::warn!("Connection {conn} tried to join {room} without a session; closing");
            self.on_disconnect(conn).await;
            return Err(GatewayError::JoinWithoutIdentity(conn));
        };

        let outcome = self.registry.join(&room, conn).await;
        match &outcome {
            JoinOutcome::Joined => log::info!("{} ({conn}) joined {room}", user.display_name()),
            JoinOutcome::Moved { from } => {
                log::info!("{} ({conn}) moved from {from} to {room}", user.display_name())
            }
            JoinOutcome::AlreadyMember => log::debug!("{conn} re-joined {room}"),
        }

        Ok(outcome)
    }

    /// Tear down `conn`. Safe to call more than once.
    ///
    /// The outbound handle is removed before room membership so a publish
    /// racing with the disconnect finds nothing to send to.
    pub async fn on_disconnect(&self, conn: ConnectionId) -> bool {
        let Some(_handle) = self.connections.remove(&conn).await else {
            return false;
        };
        let room = self.registry.leave(&conn).await;
        match room {
            Some(room) => log::info!("Connection {conn} disconnected from {room}"),
            None => log::info!("Connection {conn} disconnected"),
        }
        true
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    pub fn connections(&self) -> &Arc<Connections> {
        &self.connections
    }
}
