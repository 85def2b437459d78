use super::room_code::RoomCode;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Transport-level handle for one WebSocket, minted when it connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
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
        self.0.fmt(f)
    }
}

/// Process-unique player identity. Only handed out once a connection takes a seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerIdentity(u64);

impl fmt::Display for PlayerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player-{}", self.0)
    }
}

#[derive(Debug, Default)]
struct Connection {
    identity: Option<PlayerIdentity>,
    room: Option<RoomCode>,
    display_name: Option<String>,
}

/// Live connections, their identities and room associations.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Connection>,
    next_identity: u64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&mut self, connection: ConnectionId) {
        self.connections.entry(connection).or_default();
    }

    /// Forgets the connection along with its identity and room association.
    pub fn disconnect(&mut self, connection: ConnectionId) {
        self.connections.remove(&connection);
    }

    pub fn is_live(&self, connection: ConnectionId) -> bool {
        self.connections.contains_key(&connection)
    }

    /// Identity for a connection taking a seat. Assigned on first call, stable afterwards.
    pub fn register(&mut self, connection: ConnectionId) -> PlayerIdentity {
        let entry = self.connections.entry(connection).or_default();
        if let Some(identity) = entry.identity {
            return identity;
        }
        self.next_identity += 1;
        let identity = PlayerIdentity(self.next_identity);
        entry.identity = Some(identity);
        identity
    }

    pub fn identity(&self, connection: ConnectionId) -> Option<PlayerIdentity> {
        self.connections.get(&connection)?.identity
    }

    pub fn associate(&mut self, connection: ConnectionId, room: RoomCode) {
        if let Some(entry) = self.connections.get_mut(&connection) {
            entry.room = Some(room);
        }
    }

    pub fn disassociate(&mut self, connection: ConnectionId) {
        if let Some(entry) = self.connections.get_mut(&connection) {
            entry.room = None;
        }
    }

    pub fn lookup_room(&self, connection: ConnectionId) -> Option<&RoomCode> {
        self.connections.get(&connection)?.room.as_ref()
    }

    pub fn set_display_name(&mut self, connection: ConnectionId, name: String) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        if let Some(entry) = self.connections.get_mut(&connection) {
            entry.display_name = Some(name.to_string());
        }
    }

    /// Display name, falling back to the identity when none was given.
    pub fn display_name(&self, connection: ConnectionId) -> Option<String> {
        let entry = self.connections.get(&connection)?;
        entry
            .display_name
            .clone()
            .or_else(|| entry.identity.map(|identity| identity.to_string()))
    }
}
