//! Live connection table: who is connected and how to reach them.
//!
//! Each accepted connection owns a bounded outbound queue of pre-encoded
//! text frames. The table keeps the sending half; the transport task owns
//! the receiving half and writes whatever arrives to the socket. Removing
//! an entry drops the sender, which ends the transport task's queue.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shoplist_core::UserIdentity;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Opaque per-connection identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0.simple())
    }
}

/// Pre-encoded frame shared between all recipients of a publish.
pub type Frame = Arc<str>;

/// Server-side state for one connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    /// Session owner, if the handshake carried a verifiable token.
    pub identity: Option<UserIdentity>,
    outbound: mpsc::Sender<Frame>,
}

impl ConnectionHandle {
    pub fn outbound(&self) -> &mpsc::Sender<Frame> {
        &self.outbound
    }
}

/// Concurrent map of connection id → handle.
#[derive(Debug, Default)]
pub struct Connections {
    inner: RwLock<HashMap<ConnectionId, ConnectionHandle>>,
}

impl Connections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection with an outbound queue of `capacity` frames.
    pub async fn insert(
        &self,
        identity: Option<UserIdentity>,
        capacity: usize,
    ) -> (ConnectionId, mpsc::Receiver<Frame>) {
        let (outbound, rx) = mpsc::channel(capacity.max(1));
        let id = ConnectionId::new();
        self.inner
            .write()
            .await
            .insert(id, ConnectionHandle { identity, outbound });
        (id, rx)
    }

    /// Drop a connection's handle. Returns it if it was still present.
    pub async fn remove(&self, id: &ConnectionId) -> Option<ConnectionHandle> {
        self.inner.write().await.remove(id)
    }

    pub async fn get(&self, id: &ConnectionId) -> Option<ConnectionHandle> {
        self.inner.read().await.get(id).cloned()
    }

    /// Outbound senders for the given ids that are still connected.
    ///
    /// The senders are cloned out so the caller can deliver without
    /// holding the table lock.
    pub async fn senders_for(
        &self,
        ids: &[ConnectionId],
    ) -> Vec<(ConnectionId, mpsc::Sender<Frame>)> {
        let table = self.inner.read().await;
        ids.iter()
            .filter_map(|id| table.get(id).map(|h| (*id, h.outbound.clone())))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_remove() {
        let table = Connections::new();
        let (id, _rx) = table.insert(None, 4).await;
        assert_eq!(table.len().await, 1);
        assert!(table.get(&id).await.is_some());

        assert!(table.remove(&id).await.is_some());
        assert!(table.remove(&id).await.is_none());
        assert!(table.is_empty().await);
    }

    #[tokio::test]
    async fn test_removal_closes_queue() {
        let table = Connections::new();
        let (id, mut rx) = table.insert(None, 4).await;
        table.remove(&id).await;
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_senders_for_skips_unknown() {
        let table = Connections::new();
        let (a, mut rx_a) = table.insert(None, 4).await;
        let gone = ConnectionId::new();

        let senders = table.senders_for(&[a, gone]).await;
        assert_eq!(senders.len(), 1);
        assert_eq!(senders[0].0, a);

        senders[0].1.try_send(Arc::from("hello")).unwrap();
        assert_eq!(&*rx_a.recv().await.unwrap(), "hello");
    }

    #[test]
    fn test_connection_ids_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
        assert!(ConnectionId::new().to_string().starts_with("conn-"));
    }
}
