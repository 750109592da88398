use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

// Logical client ids, entity types and entity ids are opaque strings chosen by clients.
pub type ClientId = String;
pub type EntityType = String;
pub type EntityId = String;

/// Entity bindings as sent on registration: entity type -> entity id.
/// Pairs with an absent or empty id are ignored when registering.
pub type EntityBindings = BTreeMap<EntityType, Option<EntityId>>;

/// Unique identifier for a connection (assigned by the transport)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A (type, id) pair a connection receives targeted delivery for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityRef {
    pub entity_type: EntityType,
    pub entity_id: EntityId,
}

impl EntityRef {
    pub fn new(entity_type: impl Into<EntityType>, entity_id: impl Into<EntityId>) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.entity_type, self.entity_id)
    }
}

/// A registered connection and everything it is indexed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub id: ConnectionId,
    pub client_id: ClientId,
    pub entities: Vec<EntityRef>,
}

/// Connection registry with three indices for O(1) routing lookups.
///
/// Every connection id in `client_index` or `entity_index` is also in
/// `connections`, and no index keeps an empty set or an empty entity-type map.
/// All mutation goes through `register` and `unregister`, which take `&mut self`,
/// so the three structures are always updated together.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    /// Primary storage: lookup by connection id for registration/cleanup
    connections: HashMap<ConnectionId, Connection>,

    /// Secondary index: logical client -> its live connections
    client_index: HashMap<ClientId, HashSet<ConnectionId>>,

    /// Secondary index: entity type -> entity id -> bound connections
    entity_index: HashMap<EntityType, HashMap<EntityId, HashSet<ConnectionId>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection under a client id and its entity bindings.
    ///
    /// Registering an already registered connection replaces its client id and
    /// bindings entirely.
    pub fn register(
        &mut self,
        connection_id: ConnectionId,
        client_id: ClientId,
        bindings: &EntityBindings,
    ) -> &Connection {
        self.unregister(&connection_id);

        let entities: Vec<EntityRef> = bindings
            .iter()
            .filter_map(|(entity_type, entity_id)| match entity_id {
                Some(entity_id) if !entity_id.is_empty() => {
                    Some(EntityRef::new(entity_type.as_str(), entity_id.as_str()))
                }
                _ => None,
            })
            .collect();

        self.client_index
            .entry(client_id.clone())
            .or_default()
            .insert(connection_id.clone());

        for entity in &entities {
            self.entity_index
                .entry(entity.entity_type.clone())
                .or_default()
                .entry(entity.entity_id.clone())
                .or_default()
                .insert(connection_id.clone());
        }

        self.connections
            .entry(connection_id.clone())
            .or_insert(Connection {
                id: connection_id,
                client_id,
                entities,
            })
    }

    /// Remove a connection from every index. Unknown ids are a no-op.
    pub fn unregister(&mut self, connection_id: &ConnectionId) -> Option<Connection> {
        let connection = self.connections.remove(connection_id)?;

        if let Some(ids) = self.client_index.get_mut(&connection.client_id) {
            ids.remove(connection_id);
            if ids.is_empty() {
                self.client_index.remove(&connection.client_id);
            }
        }

        for entity in &connection.entities {
            let Some(by_id) = self.entity_index.get_mut(&entity.entity_type) else {
                continue;
            };
            if let Some(ids) = by_id.get_mut(&entity.entity_id) {
                ids.remove(connection_id);
                if ids.is_empty() {
                    by_id.remove(&entity.entity_id);
                }
            }
            if by_id.is_empty() {
                self.entity_index.remove(&entity.entity_type);
            }
        }

        Some(connection)
    }

    pub fn get(&self, connection_id: &ConnectionId) -> Option<&Connection> {
        self.connections.get(connection_id)
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.connections.contains_key(connection_id)
    }

    /// Live connections of a logical client - O(1) lookup + O(k) collect
    pub fn connections_for_client(&self, client_id: &str) -> Vec<&Connection> {
        self.client_index
            .get(client_id)
            .map(|ids| self.resolve(ids))
            .unwrap_or_default()
    }

    /// Live connections bound to an entity - O(1) lookup + O(k) collect
    pub fn connections_for_entity(&self, entity_type: &str, entity_id: &str) -> Vec<&Connection> {
        self.entity_index
            .get(entity_type)
            .and_then(|by_id| by_id.get(entity_id))
            .map(|ids| self.resolve(ids))
            .unwrap_or_default()
    }

    fn resolve(&self, ids: &HashSet<ConnectionId>) -> Vec<&Connection> {
        ids.iter().filter_map(|id| self.connections.get(id)).collect()
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Number of logical clients with at least one registered connection.
    pub fn client_count(&self) -> usize {
        self.client_index.len()
    }

    /// Number of (type, id) pairs with at least one bound connection.
    pub fn entity_count(&self) -> usize {
        self.entity_index.values().map(HashMap::len).sum()
    }

    pub fn has_client(&self, client_id: &str) -> bool {
        self.client_index.contains_key(client_id)
    }

    pub fn has_entity_type(&self, entity_type: &str) -> bool {
        self.entity_index.contains_key(entity_type)
    }

    pub fn has_entity(&self, entity_type: &str, entity_id: &str) -> bool {
        self.entity_index
            .get(entity_type)
            .is_some_and(|by_id| by_id.contains_key(entity_id))
    }
}
