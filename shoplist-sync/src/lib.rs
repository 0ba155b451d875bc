//! # shoplist-sync: Live updates for shared shopping lists
//!
//! Room-based event distribution over WebSocket, plus the client that
//! follows a list and keeps a cached copy in display order.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     WebSocket      ┌──────────────────┐
//! │ SyncClient  │ ◄─────────────────► │ SyncServer       │
//! │ (per tab)   │     JSON frames     │ (central)        │
//! └──────┬──────┘                     └────────┬─────────┘
//!        │ SyncEvent                           │
//!        ▼                            ┌────────┴──────────┐
//! ┌─────────────┐                     │ ConnectionGateway │
//! │ LiveList    │                     └────────┬──────────┘
//! │ (snapshot)  │                              ▼
//! └─────────────┘                     ┌───────────────────┐
//!                   mutation API ───► │ EventBroadcaster  │
//!                                     │  └ RoomRegistry   │
//!                                     └───────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: JSON wire frames (`join`, `joined`, events, `error`)
//! - [`connection`]: connection ids and outbound queues
//! - [`registry`]: list slug → member connections
//! - [`gateway`]: accept / join / disconnect lifecycle
//! - [`broadcast`]: fan-out of list events to a room
//! - [`session`]: session token lookup at handshake
//! - [`server`]: WebSocket sync server
//! - [`client`]: WebSocket sync client
//! - [`view`]: client-side live list

pub mod protocol;
pub mod connection;
pub mod registry;
pub mod gateway;
pub mod broadcast;
pub mod session;
pub mod server;
pub mod client;
pub mod view;

// Re-exports for convenience
pub use protocol::{ClientFrame, ControlFrame, ProtocolError, ServerFrame};
pub use connection::{ConnectionId, Connections};
pub use registry::{JoinOutcome, RoomRegistry};
pub use gateway::{ConnectionGateway, GatewayError};
pub use broadcast::{BroadcastStats, EventBroadcaster};
pub use session::{SessionVerifier, StaticSessions};
pub use server::{ServerConfig, ServerError, ServerStats, SyncServer};
pub use client::{ClientConfig, ConnectionState, SyncClient, SyncEvent};
pub use view::LiveList;
