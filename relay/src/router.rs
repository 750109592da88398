//! Connection protocol state machine and fan-out.
//!
//! The Router owns the live-connection table and the [`ConnectionRegistry`]. It
//! runs as a single task that consumes [`RouterEvent`]s one at a time, so every
//! registry mutation and every fan-out completes before the next event is looked
//! at. Transports and the Ingress Bridge talk to it through a [`RouterHandle`].

use crate::connection::{ClientId, ConnectionId, ConnectionRegistry, EntityRef};
use crate::error::{Error, Result};
use crate::message::{Registration, ServerFrame, Update};
use events::{Envelope, HandlerRegistry};
use log::*;
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Per-connection outbound channel. Sends never block; the transport drains it.
pub type FrameSender = UnboundedSender<ServerFrame>;

/// Lifecycle state of a live connection. A closed connection has no state:
/// it is removed from the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Registered { client_id: ClientId },
}

#[derive(Debug)]
struct Session {
    sender: FrameSender,
    state: ConnectionState,
}

/// Everything the Router reacts to.
#[derive(Debug)]
pub enum RouterEvent {
    Connected {
        connection_id: ConnectionId,
        sender: FrameSender,
    },
    Register {
        connection_id: ConnectionId,
        registration: Registration,
    },
    Inbound {
        connection_id: ConnectionId,
        raw: String,
    },
    Disconnected {
        connection_id: ConnectionId,
    },
    Broadcast {
        payload: String,
        client_id: Option<ClientId>,
    },
    SendToEntity {
        entity: EntityRef,
        message: String,
        message_kind: String,
    },
    Stats {
        reply: oneshot::Sender<RouterStats>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RouterStats {
    /// Live connections, registered or not.
    pub connections: usize,
    pub registered: usize,
    pub clients: usize,
    pub entities: usize,
}

pub struct Router {
    registry: ConnectionRegistry,
    sessions: HashMap<ConnectionId, Session>,
    handlers: HandlerRegistry,
}

impl Router {
    pub fn new(handlers: HandlerRegistry) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            sessions: HashMap::new(),
            handlers,
        }
    }

    /// Move the Router onto its own task and return the handle used to reach it.
    pub fn spawn(self) -> (RouterHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(rx));
        (RouterHandle { tx }, task)
    }

    pub async fn run(mut self, mut events: UnboundedReceiver<RouterEvent>) {
        info!("Router started");
        while let Some(event) = events.recv().await {
            self.handle(event).await;
        }
        info!("Router stopped, dropping {} live connection(s)", self.sessions.len());
    }

    pub async fn handle(&mut self, event: RouterEvent) {
        match event {
            RouterEvent::Connected {
                connection_id,
                sender,
            } => self.connect(connection_id, sender),
            RouterEvent::Register {
                connection_id,
                registration,
            } => self.register(&connection_id, registration),
            RouterEvent::Inbound { connection_id, raw } => {
                self.receive(&connection_id, &raw).await;
            }
            RouterEvent::Disconnected { connection_id } => self.disconnect(&connection_id),
            RouterEvent::Broadcast { payload, client_id } => {
                self.broadcast(&payload, client_id.as_deref());
            }
            RouterEvent::SendToEntity {
                entity,
                message,
                message_kind,
            } => {
                self.send_to_entity(&entity.entity_type, &entity.entity_id, &message, &message_kind);
            }
            RouterEvent::Stats { reply } => {
                // The requester may have given up waiting.
                let _ = reply.send(self.stats());
            }
        }
    }

    /// Accept a new transport session and greet it.
    pub fn connect(&mut self, connection_id: ConnectionId, sender: FrameSender) {
        info!("New client connected: {connection_id}");
        let session = Session {
            sender,
            state: ConnectionState::Connected,
        };
        Self::send_update(&connection_id, &session.sender, &Update::welcome());
        if let Some(previous) = self.sessions.insert(connection_id.clone(), session) {
            warn!("Connection {connection_id} connected twice, replacing {previous:?}");
            self.registry.unregister(&connection_id);
        }
    }

    /// Bind a live connection to a client id and entities, replacing any
    /// earlier registration of the same connection.
    pub fn register(&mut self, connection_id: &ConnectionId, registration: Registration) {
        let Some(session) = self.sessions.get_mut(connection_id) else {
            debug!("Ignoring registration for closed connection {connection_id}");
            return;
        };
        let Some(client_id) = registration.client_id.filter(|id| !id.is_empty()) else {
            warn!("Ignoring registration without a client id on connection {connection_id}");
            return;
        };

        let entities = registration.entities.unwrap_or_default();
        let connection = self
            .registry
            .register(connection_id.clone(), client_id.clone(), &entities);

        let entity_details = connection
            .entities
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        if entity_details.is_empty() {
            info!("Client registered with ID: {client_id}");
        } else {
            info!("Client registered with ID: {client_id}, Entities: {entity_details}");
        }

        Self::send_update(
            connection_id,
            &session.sender,
            &Update::register_confirmation(&client_id),
        );
        session.state = ConnectionState::Registered { client_id };
    }

    /// Run an inbound application message through its handler and broadcast
    /// the result, scoped to `data.clientId` when present.
    pub async fn receive(&mut self, connection_id: &ConnectionId, raw: &str) {
        if !self.sessions.contains_key(connection_id) {
            debug!("Ignoring message for closed connection {connection_id}");
            return;
        }

        let envelope = match Envelope::parse(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Error processing message from connection {connection_id}: {e}");
                return;
            }
        };

        let result = self.handlers.dispatch(&envelope).await;
        let payload = match Update::handled(envelope.kind.as_str(), result).encode() {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to serialize handler result for {}: {e}", envelope.kind);
                return;
            }
        };

        self.broadcast(&payload, envelope.client_id());
    }

    /// Close a connection. Valid from any live state; unknown ids are a no-op.
    pub fn disconnect(&mut self, connection_id: &ConnectionId) {
        if self.sessions.remove(connection_id).is_none() {
            debug!("Connection {connection_id} already closed");
            return;
        }
        self.registry.unregister(connection_id);
        info!("Client disconnected: {connection_id}");
    }

    /// Deliver an encoded update to one client's connections, or to every live
    /// connection when no client is given. Returns the number of handoffs.
    pub fn broadcast(&self, payload: &str, client_id: Option<&str>) -> usize {
        let frame = ServerFrame::update(payload.to_string());

        match client_id {
            Some(client_id) => {
                let connections = self.registry.connections_for_client(client_id);
                if connections.is_empty() {
                    info!("No clients found for client ID {client_id}, message not delivered");
                    return 0;
                }
                debug!("Sending message to client {client_id}");
                self.deliver(connections.into_iter().map(|c| &c.id), &frame)
            }
            None => {
                debug!("Broadcasting message to all {} connection(s)", self.sessions.len());
                self.deliver(self.sessions.keys(), &frame)
            }
        }
    }

    /// Deliver a producer message to the connections bound to one entity.
    pub fn send_to_entity(
        &self,
        entity_type: &str,
        entity_id: &str,
        message: &str,
        message_kind: &str,
    ) -> usize {
        let connections = self.registry.connections_for_entity(entity_type, entity_id);
        if connections.is_empty() {
            info!("No clients found for {entity_type} {entity_id}, message not delivered");
            return 0;
        }

        let payload = match Update::targeted(message_kind, entity_type, entity_id, message).encode()
        {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to serialize message for {entity_type} {entity_id}: {e}");
                return 0;
            }
        };

        let delivered = self.deliver(
            connections.into_iter().map(|c| &c.id),
            &ServerFrame::update(payload),
        );
        info!("Sent message to {entity_type} {entity_id}: {message}");
        delivered
    }

    fn deliver<'a>(
        &self,
        connection_ids: impl Iterator<Item = &'a ConnectionId>,
        frame: &ServerFrame,
    ) -> usize {
        let mut delivered = 0;
        for connection_id in connection_ids {
            let Some(session) = self.sessions.get(connection_id) else {
                continue;
            };
            match session.sender.send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    "Failed to send update to connection {connection_id}: {e}. Connection will be cleaned up."
                ),
            }
        }
        delivered
    }

    fn send_update(connection_id: &ConnectionId, sender: &FrameSender, update: &Update) {
        match update.encode() {
            Ok(payload) => {
                if let Err(e) = sender.send(ServerFrame::update(payload)) {
                    warn!("Failed to send {} to connection {connection_id}: {e}", update.kind);
                }
            }
            Err(e) => error!("Failed to serialize {}: {e}", update.kind),
        }
    }

    pub fn state(&self, connection_id: &ConnectionId) -> Option<&ConnectionState> {
        self.sessions.get(connection_id).map(|session| &session.state)
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn stats(&self) -> RouterStats {
        RouterStats {
            connections: self.sessions.len(),
            registered: self.registry.len(),
            clients: self.registry.client_count(),
            entities: self.registry.entity_count(),
        }
    }
}

/// Cloneable handle to a running Router. Every call is a non-blocking handoff
/// onto the Router's event stream; it fails only once the Router has stopped.
#[derive(Debug, Clone)]
pub struct RouterHandle {
    tx: UnboundedSender<RouterEvent>,
}

impl RouterHandle {
    fn dispatch(&self, event: RouterEvent) -> Result<()> {
        self.tx.send(event).map_err(|_| Error::unavailable())
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn connect(&self, connection_id: ConnectionId, sender: FrameSender) -> Result<()> {
        self.dispatch(RouterEvent::Connected {
            connection_id,
            sender,
        })
    }

    pub fn register(&self, connection_id: ConnectionId, registration: Registration) -> Result<()> {
        self.dispatch(RouterEvent::Register {
            connection_id,
            registration,
        })
    }

    pub fn inbound(&self, connection_id: ConnectionId, raw: String) -> Result<()> {
        self.dispatch(RouterEvent::Inbound { connection_id, raw })
    }

    pub fn disconnect(&self, connection_id: ConnectionId) -> Result<()> {
        self.dispatch(RouterEvent::Disconnected { connection_id })
    }

    /// `payload` is the encoded `{type, data}` update to deliver.
    pub fn broadcast(&self, payload: String, client_id: Option<ClientId>) -> Result<()> {
        self.dispatch(RouterEvent::Broadcast { payload, client_id })
    }

    pub fn send_to_entity(
        &self,
        entity: EntityRef,
        message: String,
        message_kind: String,
    ) -> Result<()> {
        self.dispatch(RouterEvent::SendToEntity {
            entity,
            message,
            message_kind,
        })
    }

    pub async fn stats(&self) -> Result<RouterStats> {
        let (reply, response) = oneshot::channel();
        self.dispatch(RouterEvent::Stats { reply })?;
        response.await.map_err(|_| Error::unavailable())
    }
}
