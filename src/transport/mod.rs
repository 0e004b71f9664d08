//! Reliable RPC transport.
//!
//! The transport keeps exactly one logical connection per client, paces
//! and multiplexes calls over it, enforces the authentication gate, and
//! reconnects with capped exponential backoff when the link drops.

pub mod client;
pub mod connection;
pub mod events;
pub mod pacer;

pub use client::{
    ClientFrame, ConnectFuture, Connector, CurrentUser, ErrorReply, RpcClient, RpcConfig,
    ServerFrame, Subscription, TransportStats, WireConnection,
};
pub use connection::{
    reconnect_delay, reconnect_delay_with, Connection, ConnectionPhase, ReconnectState,
    TransportState,
};
pub use events::{
    is_known_event, EventRegistry, Listener, APPLICATION_EVENTS, EVENT_AUTHENTICATED,
    TRANSPORT_EVENTS,
};
pub use pacer::Pacer;
