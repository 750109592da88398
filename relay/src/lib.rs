//! Connection registry and routing core for the real-time relay.
//!
//! Producers push messages over request/response ingress; the relay fans them
//! out to long-lived client connections, either to everyone, to one logical
//! client, or to the connections watching a domain entity.
//!
//! # Architecture
//!
//! - **Three-index registry**: connections are indexed by connection id, by
//!   logical client id and by `(entity type, entity id)`, so every addressing
//!   mode resolves its destinations without scanning.
//! - **Single event stream**: the Router owns the registry and processes
//!   lifecycle events, inbound messages and fan-out requests one at a time on a
//!   dedicated task. Index updates are therefore never observed half-applied.
//! - **Non-blocking delivery**: each send is a handoff onto the connection's own
//!   unbounded channel, drained by the transport, so a slow client never
//!   stalls fan-out to the others.
//! - **Best effort**: no acknowledgement, no retry. A fan-out with no matching
//!   connections is logged as a delivery miss and otherwise ignored.
//! - **Last-value cache**: the most recent targeted message per entity is kept
//!   for clients that reconnect after it was pushed.
//!
//! # Message Flow
//!
//! 1. The transport accepts a session and sends `Connected`; the Router greets it
//! 2. The client sends `REGISTER` with its client id and entities; the Router
//!    indexes the connection and confirms
//! 3. A producer submits a message; the Ingress Bridge stores targeted messages
//!    in the cache and hands the send to the Router
//! 4. The Router resolves the routing key through the registry and pushes an
//!    `update` frame to each matching connection
//! 5. On disconnect the Router removes the connection from every index
//!
//! # Modules
//!
//! - `connection`: ConnectionRegistry and the identifiers it indexes
//! - `router`: Router state machine, fan-out and the RouterHandle
//! - `cache`: LastValueCache
//! - `ingress`: IngressBridge for producer submissions and latest-message lookups
//! - `message`: Wire frames exchanged with clients
//! - `error`: Error type shared by the above

pub mod cache;
pub mod connection;
pub mod error;
pub mod ingress;
pub mod message;
pub mod router;

pub use cache::LastValueCache;
pub use ingress::IngressBridge;
pub use router::{Router, RouterHandle};
